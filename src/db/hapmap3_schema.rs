//! DDL and query SQL for the `hapmap3_panel` reference table that
//! [`crate::hapmap3::match_against_panel`] is matched against during
//! ingestion, and that `vcf-pg-loader-worker hapmap3 load` populates.

/// Chromosome is stored normalized (see [`crate::common::normalize_chrom`])
/// so lookups don't need to try both `chr1` and `1` spellings.
pub fn create_hapmap3_panel_table_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS hapmap3_panel ( \
        chrom TEXT NOT NULL, \
        pos BIGINT NOT NULL, \
        ref_allele TEXT NOT NULL, \
        alt_allele TEXT NOT NULL, \
        PRIMARY KEY (chrom, pos) \
    );"
}

pub const UPSERT_HAPMAP3_PANEL_SQL: &str = "\
    INSERT INTO hapmap3_panel (chrom, pos, ref_allele, alt_allele) \
    VALUES ($1, $2, $3, $4) \
    ON CONFLICT (chrom, pos) DO UPDATE SET \
        ref_allele = EXCLUDED.ref_allele, \
        alt_allele = EXCLUDED.alt_allele";

pub const SELECT_HAPMAP3_PANEL_ENTRY_SQL: &str = "\
    SELECT chrom, pos, ref_allele, alt_allele FROM hapmap3_panel \
    WHERE chrom = $1 AND pos = $2";
