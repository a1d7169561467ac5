//! DDL and query SQL for the `load_batches` journal backing
//! [`crate::batch::LoadBatch`]: the anchor row each file's ingestion run is
//! recorded against, including reload linkage.

pub fn create_load_batches_table_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS load_batches ( \
        batch_id UUID PRIMARY KEY, \
        source_file TEXT NOT NULL, \
        file_md5 TEXT NOT NULL, \
        file_size BIGINT NOT NULL, \
        status TEXT NOT NULL, \
        started_at TIMESTAMPTZ NOT NULL, \
        finished_at TIMESTAMPTZ, \
        n_variants_loaded BIGINT NOT NULL DEFAULT 0, \
        error_message TEXT, \
        is_reload BOOLEAN NOT NULL DEFAULT false, \
        previous_load_id UUID \
    );"
}

/// Index supporting [`SELECT_LATEST_LOAD_BATCH_BY_MD5_SQL`]'s lookup of the
/// most recent batch for a given file's content.
pub fn create_load_batches_md5_index_sql() -> &'static str {
    "CREATE INDEX IF NOT EXISTS idx_load_batches_file_md5 ON load_batches (file_md5, started_at DESC);"
}

pub const INSERT_LOAD_BATCH_SQL: &str = "\
    INSERT INTO load_batches \
    (batch_id, source_file, file_md5, file_size, status, started_at, n_variants_loaded, is_reload, previous_load_id) \
    VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8)";

pub const COMPLETE_LOAD_BATCH_SQL: &str = "\
    UPDATE load_batches SET status = 'completed', finished_at = $2, n_variants_loaded = $3 \
    WHERE batch_id = $1";

pub const FAIL_LOAD_BATCH_SQL: &str = "\
    UPDATE load_batches SET status = 'failed', finished_at = $2, error_message = $3 \
    WHERE batch_id = $1";

pub const ROLL_BACK_LOAD_BATCH_SQL: &str = "\
    UPDATE load_batches SET status = 'rolled_back', finished_at = $2 \
    WHERE batch_id = $1";

/// Most recent batch row for a given file's content, across any source
/// path it was ingested from.
pub const SELECT_LATEST_LOAD_BATCH_BY_MD5_SQL: &str = "\
    SELECT batch_id, source_file, file_md5, file_size, status, started_at, finished_at, \
           n_variants_loaded, error_message, is_reload, previous_load_id \
    FROM load_batches WHERE file_md5 = $1 ORDER BY started_at DESC LIMIT 1";

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn table_carries_reload_linkage_columns() {
        let sql = create_load_batches_table_sql();
        assert!(sql.contains("is_reload"));
        assert!(sql.contains("previous_load_id"));
    }

    #[test]
    fn insert_and_select_agree_on_primary_key() {
        assert!(INSERT_LOAD_BATCH_SQL.contains("batch_id"));
        assert!(SELECT_LATEST_LOAD_BATCH_BY_MD5_SQL.contains("file_md5 = $1"));
    }
}
