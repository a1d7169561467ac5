//! Database access layer (A3): connection pooling, DDL/partition
//! management, and upsert SQL for the ingestion pipeline's PostgreSQL
//! store.
//!
//! The teacher's RocksDB in-house frequency tooling (`compile`, `conf`,
//! `genes`, `mk_inhouse`, `to_bin`) is superseded by this module; see
//! `DESIGN.md` for the dependency changes that follow from it.

pub mod audit_schema;
pub mod batch_schema;
pub mod hapmap3_schema;
pub mod phi_schema;
pub mod pool;
pub mod schema;

pub use pool::connect;
pub use schema::hwe_exact_test_sql;

use crate::err::{LoaderError, LoaderResult};

/// Run [`all_migration_statements`] against `pool`, each in its own
/// statement execution (some, like the enum/trigger DDL, mix multiple SQL
/// statements in one string and cannot go through the extended-query
/// protocol `sqlx::query` uses).
pub async fn migrate(pool: &sqlx::PgPool) -> LoaderResult<()> {
    for statement in all_migration_statements() {
        sqlx::raw_sql(&statement)
            .execute(pool)
            .await
            .map_err(|e| LoaderError::StoreTransient { attempts: 1, source: e })?;
    }
    Ok(())
}

/// All DDL statements in dependency order, for a fresh database. Each
/// statement is idempotent (`IF NOT EXISTS` / `CREATE OR REPLACE`), so
/// running this against an already-migrated database is a no-op.
pub fn all_migration_statements() -> Vec<String> {
    vec![
        schema::create_variants_table_sql(),
        schema::create_genotypes_table_sql(),
        schema::hwe_exact_test_sql().to_string(),
        batch_schema::create_load_batches_table_sql().to_string(),
        batch_schema::create_load_batches_md5_index_sql().to_string(),
        hapmap3_schema::create_hapmap3_panel_table_sql().to_string(),
        audit_schema::create_audit_event_type_sql().to_string(),
        audit_schema::create_hipaa_audit_log_table_sql().to_string(),
        audit_schema::create_audit_immutability_trigger_sql().to_string(),
        phi_schema::create_phi_vault_schema_sql().to_string(),
        phi_schema::create_sample_id_mapping_table_sql().to_string(),
        phi_schema::create_reverse_lookup_audit_table_sql().to_string(),
        phi_schema::create_get_or_create_anonymous_id_fn_sql().to_string(),
        phi_schema::create_reverse_lookup_fn_sql().to_string(),
    ]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn all_migration_statements_are_non_empty_and_ordered() {
        let statements = all_migration_statements();
        assert!(statements.len() >= 10);
        assert!(statements[0].contains("CREATE TABLE IF NOT EXISTS variants"));
    }
}
