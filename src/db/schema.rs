//! DDL for the ingestion target schema: range-partitioned variant tables,
//! hash-partitioned genotype tables, and the PL/pgSQL mirror of the
//! in-process HWE exact test.

/// Chromosomes the variant table is range-partitioned by, one partition per
/// entry in [`crate::common::CHROMS`].
pub fn create_variants_table_sql() -> String {
    let mut sql = String::from(
        "CREATE TABLE IF NOT EXISTS variants (\n\
         \tvariant_id BIGSERIAL,\n\
         \tchrom TEXT NOT NULL,\n\
         \tpos BIGINT NOT NULL,\n\
         \tref_allele TEXT NOT NULL,\n\
         \talt_allele TEXT NOT NULL,\n\
         \tvariant_id_str TEXT GENERATED ALWAYS AS (chrom || ':' || pos || ':' || ref_allele || ':' || alt_allele) STORED,\n\
         \tqual DOUBLE PRECISION,\n\
         \tfilter TEXT,\n\
         \tgene TEXT,\n\
         \tconsequence TEXT,\n\
         \timpact TEXT,\n\
         \taaf DOUBLE PRECISION,\n\
         \tmaf DOUBLE PRECISION,\n\
         \tmac INTEGER,\n\
         \thwe_p_value DOUBLE PRECISION,\n\
         \thapmap3_match BOOLEAN,\n\
         \tsource_file TEXT NOT NULL,\n\
         \tload_batch_id UUID NOT NULL,\n\
         \tPRIMARY KEY (chrom, variant_id),\n\
         \tUNIQUE (chrom, pos, ref_allele, alt_allele)\n\
         ) PARTITION BY LIST (chrom);\n",
    );
    for chrom in crate::common::CHROMS {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS variants_chrom_{chrom} PARTITION OF variants FOR VALUES IN ('{chrom}');\n"
        ));
    }
    sql
}

/// Genotypes are hash-partitioned by `sample_id` across a fixed number of
/// partitions so per-sample writes spread evenly regardless of cohort size.
pub const GENOTYPE_PARTITION_COUNT: u32 = 16;

pub fn create_genotypes_table_sql() -> String {
    let mut sql = String::from(
        "CREATE TABLE IF NOT EXISTS genotypes (\n\
         \tvariant_id BIGINT NOT NULL,\n\
         \tsample_id UUID NOT NULL,\n\
         \tgt TEXT,\n\
         \tgq INTEGER,\n\
         \tdp INTEGER,\n\
         \tallele_balance DOUBLE PRECISION,\n\
         \tdosage DOUBLE PRECISION,\n\
         \tadj_pass BOOLEAN NOT NULL DEFAULT false,\n\
         \tPRIMARY KEY (sample_id, variant_id)\n\
         ) PARTITION BY HASH (sample_id);\n",
    );
    for i in 0..GENOTYPE_PARTITION_COUNT {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS genotypes_part_{i} PARTITION OF genotypes \
             FOR VALUES WITH (MODULUS {GENOTYPE_PARTITION_COUNT}, REMAINDER {i});\n"
        ));
    }
    sql
}

/// Upsert SQL for one variant row: re-loading the same `(chrom, pos, ref,
/// alt)` from a later batch updates frequency/QC columns in place rather
/// than duplicating the row. Returns `variant_id` so the caller can attach
/// genotype rows to the upserted (not just inserted) variant.
pub const UPSERT_VARIANT_SQL: &str = "\
    INSERT INTO variants \
    (chrom, pos, ref_allele, alt_allele, qual, filter, gene, consequence, impact, \
     aaf, maf, mac, hwe_p_value, hapmap3_match, source_file, load_batch_id) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
    ON CONFLICT (chrom, pos, ref_allele, alt_allele) DO UPDATE SET \
        qual = EXCLUDED.qual, \
        filter = EXCLUDED.filter, \
        gene = EXCLUDED.gene, \
        consequence = EXCLUDED.consequence, \
        impact = EXCLUDED.impact, \
        aaf = EXCLUDED.aaf, \
        maf = EXCLUDED.maf, \
        mac = EXCLUDED.mac, \
        hwe_p_value = EXCLUDED.hwe_p_value, \
        hapmap3_match = EXCLUDED.hapmap3_match, \
        source_file = EXCLUDED.source_file, \
        load_batch_id = EXCLUDED.load_batch_id \
    RETURNING variant_id";

/// Upsert SQL for one genotype row.
pub const UPSERT_GENOTYPE_SQL: &str = "\
    INSERT INTO genotypes (variant_id, sample_id, gt, gq, dp, allele_balance, dosage, adj_pass) \
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
    ON CONFLICT (sample_id, variant_id) DO UPDATE SET \
        gt = EXCLUDED.gt, \
        gq = EXCLUDED.gq, \
        dp = EXCLUDED.dp, \
        allele_balance = EXCLUDED.allele_balance, \
        dosage = EXCLUDED.dosage, \
        adj_pass = EXCLUDED.adj_pass";

/// PL/pgSQL mirror of [`crate::qc::hwe_exact_test`] (Wigginton, Cutler &
/// Abecasis, 2005), so the same exact p-value can be recomputed directly in
/// the database for ad hoc QC queries without round-tripping through the
/// worker.
pub fn hwe_exact_test_sql() -> &'static str {
    r#"
CREATE OR REPLACE FUNCTION hwe_exact_test(n_aa INT, n_ab INT, n_bb INT)
RETURNS FLOAT AS $$
DECLARE
    n INT;
    n_a INT;
    n_b INT;
    min_het INT;
    max_het INT;
    mid INT;
    het_probs FLOAT[];
    total FLOAT;
    curr_het INT;
    prev_het INT;
    next_het INT;
    p_obs FLOAT;
    p_value FLOAT;
    i INT;
    tmp_n_aa INT;
    tmp_n_bb INT;
BEGIN
    n := n_aa + n_ab + n_bb;

    IF n = 0 THEN
        RETURN NULL;
    END IF;

    n_a := 2 * n_aa + n_ab;
    n_b := 2 * n_bb + n_ab;

    IF n_a = 0 OR n_b = 0 THEN
        RETURN 1.0;
    END IF;

    IF n_ab > LEAST(n_a, n_b) THEN
        RETURN NULL;
    END IF;

    min_het := ABS(n_a - n_b) % 2;
    max_het := LEAST(n_a, n_b);

    IF max_het < min_het THEN
        RETURN 1.0;
    END IF;

    het_probs := ARRAY_FILL(0.0::FLOAT, ARRAY[max_het + 1]);

    mid := (min_het + max_het) / 2;
    IF mid % 2 != min_het % 2 THEN
        IF mid < max_het THEN
            mid := mid + 1;
        ELSE
            mid := mid - 1;
        END IF;
    END IF;

    IF mid > max_het OR mid < min_het THEN
        mid := min_het;
    END IF;

    het_probs[mid + 1] := 1.0;
    total := 1.0;

    curr_het := mid;
    WHILE curr_het > min_het LOOP
        prev_het := curr_het - 2;
        IF prev_het < 0 THEN
            EXIT;
        END IF;

        tmp_n_aa := (n_a - curr_het) / 2;
        tmp_n_bb := (n_b - curr_het) / 2;

        IF tmp_n_aa <= 0 OR tmp_n_bb <= 0 THEN
            EXIT;
        END IF;

        het_probs[prev_het + 1] := het_probs[curr_het + 1] *
            curr_het * (curr_het - 1) / (4.0 * tmp_n_aa * tmp_n_bb);
        total := total + het_probs[prev_het + 1];
        curr_het := prev_het;
    END LOOP;

    curr_het := mid;
    WHILE curr_het < max_het LOOP
        next_het := curr_het + 2;
        IF next_het > max_het THEN
            EXIT;
        END IF;

        tmp_n_aa := (n_a - curr_het) / 2;
        tmp_n_bb := (n_b - curr_het) / 2;

        IF tmp_n_aa < 0 OR tmp_n_bb < 0 THEN
            EXIT;
        END IF;

        het_probs[next_het + 1] := het_probs[curr_het + 1] *
            4.0 * tmp_n_aa * tmp_n_bb / (next_het * (next_het - 1));
        total := total + het_probs[next_het + 1];
        curr_het := next_het;
    END LOOP;

    IF total > 0 THEN
        FOR i IN 1..ARRAY_LENGTH(het_probs, 1) LOOP
            het_probs[i] := het_probs[i] / total;
        END LOOP;
    END IF;

    IF n_ab + 1 > ARRAY_LENGTH(het_probs, 1) THEN
        RETURN 1.0;
    END IF;

    p_obs := het_probs[n_ab + 1];

    p_value := 0.0;
    FOR i IN 1..ARRAY_LENGTH(het_probs, 1) LOOP
        IF het_probs[i] <= p_obs + 1e-10 THEN
            p_value := p_value + het_probs[i];
        END IF;
    END LOOP;

    RETURN LEAST(1.0, p_value);
END;
$$ LANGUAGE plpgsql IMMUTABLE STRICT;
"#
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn variants_table_has_one_partition_per_chromosome() {
        let sql = create_variants_table_sql();
        for chrom in crate::common::CHROMS {
            assert!(sql.contains(&format!("variants_chrom_{chrom}")));
        }
    }

    #[test]
    fn genotypes_table_has_configured_partition_count() {
        let sql = create_genotypes_table_sql();
        for i in 0..GENOTYPE_PARTITION_COUNT {
            assert!(sql.contains(&format!("genotypes_part_{i}")));
        }
    }

    #[test]
    fn upsert_sql_uses_on_conflict_do_update() {
        assert!(UPSERT_VARIANT_SQL.contains("ON CONFLICT"));
        assert!(UPSERT_VARIANT_SQL.contains("DO UPDATE SET"));
        assert!(UPSERT_VARIANT_SQL.contains("RETURNING variant_id"));
        assert!(UPSERT_GENOTYPE_SQL.contains("ON CONFLICT"));
    }

    #[test]
    fn variants_table_has_a_content_unique_constraint() {
        assert!(create_variants_table_sql().contains("UNIQUE (chrom, pos, ref_allele, alt_allele)"));
    }

    #[test]
    fn hwe_sql_defines_the_documented_function_name() {
        assert!(hwe_exact_test_sql().contains("FUNCTION hwe_exact_test"));
        assert!(hwe_exact_test_sql().contains("LANGUAGE plpgsql"));
    }
}
