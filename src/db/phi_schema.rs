//! DDL for the `phi_vault` schema backing [`crate::phi::SampleAnonymizer`]:
//! the encrypted original-id mapping table plus the
//! `get_or_create_anonymous_id`/`reverse_lookup` SQL functions the
//! anonymizer calls into.
//!
//! Grounded on `original_source/src/vcf_pg_loader/phi/anonymizer.py`, which
//! calls these same two function names against a `phi_vault` schema.

pub fn create_phi_vault_schema_sql() -> &'static str {
    "CREATE SCHEMA IF NOT EXISTS phi_vault;"
}

pub fn create_sample_id_mapping_table_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS phi_vault.sample_id_mapping ( \
        anonymous_id UUID PRIMARY KEY DEFAULT gen_random_uuid(), \
        original_id TEXT NOT NULL, \
        source_file TEXT NOT NULL, \
        original_id_encrypted BYTEA NOT NULL, \
        encryption_iv BYTEA NOT NULL, \
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
        UNIQUE (original_id, source_file) \
    );"
}

/// Every reverse lookup is recorded here independently of
/// [`crate::audit::AuditLogger`]'s own `PHI_ACCESS` event, so the vault's
/// access trail survives even if the general audit log's fallback path is
/// the only thing that wrote the corresponding event.
pub fn create_reverse_lookup_audit_table_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS phi_vault.reverse_lookup_audit ( \
        audit_id BIGSERIAL PRIMARY KEY, \
        anonymous_id UUID NOT NULL, \
        requested_by TEXT, \
        success BOOLEAN NOT NULL, \
        requested_at TIMESTAMPTZ NOT NULL DEFAULT now() \
    );"
}

/// Idempotent `(original_id, source_file) -> anonymous_id` allocation: the
/// `UNIQUE` constraint on `sample_id_mapping` makes the upsert safe under
/// concurrent callers anonymizing the same sample from two batches at once.
pub fn create_get_or_create_anonymous_id_fn_sql() -> &'static str {
    "CREATE OR REPLACE FUNCTION phi_vault.get_or_create_anonymous_id( \
        p_original_id TEXT, p_source_file TEXT \
    ) RETURNS UUID AS $$ \
     DECLARE \
        v_id UUID; \
     BEGIN \
        SELECT anonymous_id INTO v_id FROM phi_vault.sample_id_mapping \
            WHERE original_id = p_original_id AND source_file = p_source_file; \
        IF v_id IS NOT NULL THEN \
            RETURN v_id; \
        END IF; \
        INSERT INTO phi_vault.sample_id_mapping \
            (original_id, source_file, original_id_encrypted, encryption_iv) \
        VALUES (p_original_id, p_source_file, p_original_id::bytea, ''::bytea) \
        ON CONFLICT (original_id, source_file) DO UPDATE SET original_id = EXCLUDED.original_id \
        RETURNING anonymous_id INTO v_id; \
        RETURN v_id; \
     END; \
     $$ LANGUAGE plpgsql;"
}

pub fn create_reverse_lookup_fn_sql() -> &'static str {
    "CREATE OR REPLACE FUNCTION phi_vault.reverse_lookup(p_anonymous_id UUID) \
     RETURNS TEXT AS $$ \
     DECLARE \
        v_original TEXT; \
     BEGIN \
        SELECT original_id INTO v_original FROM phi_vault.sample_id_mapping \
            WHERE anonymous_id = p_anonymous_id; \
        INSERT INTO phi_vault.reverse_lookup_audit (anonymous_id, success) \
            VALUES (p_anonymous_id, v_original IS NOT NULL); \
        IF v_original IS NULL THEN \
            RAISE EXCEPTION 'no sample mapping for anonymous_id %', p_anonymous_id; \
        END IF; \
        RETURN v_original; \
     END; \
     $$ LANGUAGE plpgsql;"
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn functions_are_named_as_the_anonymizer_expects() {
        assert!(create_get_or_create_anonymous_id_fn_sql().contains("phi_vault.get_or_create_anonymous_id"));
        assert!(create_reverse_lookup_fn_sql().contains("phi_vault.reverse_lookup"));
    }

    #[test]
    fn mapping_table_has_a_unique_constraint_for_idempotent_allocation() {
        assert!(create_sample_id_mapping_table_sql().contains("UNIQUE (original_id, source_file)"));
    }

    #[test]
    fn reverse_lookup_is_always_audited() {
        assert!(create_reverse_lookup_fn_sql().contains("reverse_lookup_audit"));
    }
}
