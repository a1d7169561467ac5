//! DDL for the `hipaa_audit_log` table: an enum type for
//! [`crate::audit::AuditEventType`], the table itself, and a trigger that
//! enforces append-only semantics at the database layer (not just in
//! application code).

/// Creates the `audit_event_type` enum matching
/// [`crate::audit::AuditEventType`]'s twelve variants exactly.
pub fn create_audit_event_type_sql() -> &'static str {
    "DO $$ BEGIN \
     CREATE TYPE audit_event_type AS ENUM ( \
        'AUTH_LOGIN', 'AUTH_LOGOUT', 'AUTH_FAILED', \
        'DATA_READ', 'DATA_WRITE', 'DATA_DELETE', 'DATA_EXPORT', \
        'SCHEMA_CHANGE', 'CONFIG_CHANGE', 'PERMISSION_CHANGE', \
        'PHI_ACCESS', 'EMERGENCY_ACCESS' \
     ); \
     EXCEPTION WHEN duplicate_object THEN NULL; END $$;"
}

pub fn create_hipaa_audit_log_table_sql() -> &'static str {
    "CREATE TABLE IF NOT EXISTS hipaa_audit_log ( \
        entry_id BIGSERIAL PRIMARY KEY, \
        event_type audit_event_type NOT NULL, \
        user_id BIGINT, \
        user_name TEXT NOT NULL DEFAULT 'system', \
        session_id UUID, \
        resource_type TEXT, \
        resource_id TEXT, \
        action TEXT NOT NULL, \
        success BOOLEAN NOT NULL, \
        details JSONB NOT NULL DEFAULT '{}'::jsonb, \
        error_message TEXT, \
        event_time TIMESTAMPTZ NOT NULL DEFAULT now(), \
        previous_hash TEXT NOT NULL, \
        entry_hash TEXT NOT NULL \
    );"
}

/// Raises the exact error text asserted by
/// `original_source/tests/integration/test_audit_immutability.py`: any
/// `UPDATE` or `DELETE` against `hipaa_audit_log` is rejected outright,
/// regardless of role, so the append-only guarantee holds even against a
/// compromised application layer.
pub fn create_audit_immutability_trigger_sql() -> &'static str {
    "CREATE OR REPLACE FUNCTION reject_audit_log_mutation() RETURNS TRIGGER AS $$ \
     BEGIN \
         RAISE EXCEPTION 'Audit log records cannot be modified (HIPAA 45 CFR 164.312(b) requires an immutable audit trail)'; \
     END; \
     $$ LANGUAGE plpgsql; \
     \
     DROP TRIGGER IF EXISTS hipaa_audit_log_no_update ON hipaa_audit_log; \
     CREATE TRIGGER hipaa_audit_log_no_update \
        BEFORE UPDATE ON hipaa_audit_log \
        FOR EACH ROW EXECUTE FUNCTION reject_audit_log_mutation(); \
     \
     DROP TRIGGER IF EXISTS hipaa_audit_log_no_delete ON hipaa_audit_log; \
     CREATE TRIGGER hipaa_audit_log_no_delete \
        BEFORE DELETE ON hipaa_audit_log \
        FOR EACH ROW EXECUTE FUNCTION reject_audit_log_mutation();"
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn trigger_sql_raises_the_documented_error_text() {
        let sql = create_audit_immutability_trigger_sql();
        assert!(sql.contains("Audit log records cannot be modified"));
        assert!(sql.contains("HIPAA"));
        assert!(sql.contains("BEFORE UPDATE"));
        assert!(sql.contains("BEFORE DELETE"));
    }

    #[test]
    fn enum_type_sql_lists_all_twelve_event_types() {
        let sql = create_audit_event_type_sql();
        for variant in [
            "AUTH_LOGIN",
            "AUTH_LOGOUT",
            "AUTH_FAILED",
            "DATA_READ",
            "DATA_WRITE",
            "DATA_DELETE",
            "DATA_EXPORT",
            "SCHEMA_CHANGE",
            "CONFIG_CHANGE",
            "PERMISSION_CHANGE",
            "PHI_ACCESS",
            "EMERGENCY_ACCESS",
        ] {
            assert!(sql.contains(variant), "missing {variant}");
        }
    }

    #[test]
    fn table_sql_carries_the_hash_chain_columns() {
        let sql = create_hipaa_audit_log_table_sql();
        assert!(sql.contains("previous_hash"));
        assert!(sql.contains("entry_hash"));
    }
}
