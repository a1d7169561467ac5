//! Audit event types and the PHI-redacting details sanitizer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// Category of an audited action, persisted as a Postgres enum
/// (`audit_event_type`) and matched exactly against that type's labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize)]
pub enum AuditEventType {
    #[strum(serialize = "AUTH_LOGIN")]
    AuthLogin,
    #[strum(serialize = "AUTH_LOGOUT")]
    AuthLogout,
    #[strum(serialize = "AUTH_FAILED")]
    AuthFailed,
    #[strum(serialize = "DATA_READ")]
    DataRead,
    #[strum(serialize = "DATA_WRITE")]
    DataWrite,
    #[strum(serialize = "DATA_DELETE")]
    DataDelete,
    #[strum(serialize = "DATA_EXPORT")]
    DataExport,
    #[strum(serialize = "SCHEMA_CHANGE")]
    SchemaChange,
    #[strum(serialize = "CONFIG_CHANGE")]
    ConfigChange,
    #[strum(serialize = "PERMISSION_CHANGE")]
    PermissionChange,
    #[strum(serialize = "PHI_ACCESS")]
    PhiAccess,
    #[strum(serialize = "EMERGENCY_ACCESS")]
    EmergencyAccess,
}

/// Substrings matched case-insensitively against `details` keys; any match
/// redacts that key's value entirely. Mirrors the PHI field-name heuristics
/// used to scrub audit records before they are persisted or displayed.
pub const PHI_PATTERNS: &[&str] = &[
    "patient", "ssn", "dob", "mrn", "name", "address", "phone", "email", "birth", "subject",
];

const REDACTED: &str = "[REDACTED]";

/// One audited action.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub action: String,
    pub success: bool,
    pub user_id: Option<i64>,
    pub user_name: String,
    pub session_id: Option<Uuid>,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub client_ip: Option<String>,
    pub client_hostname: Option<String>,
    pub application_name: Option<String>,
    pub details: HashMap<String, Value>,
    pub error_message: Option<String>,
    pub event_time: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, action: impl Into<String>, success: bool) -> AuditEvent {
        AuditEvent {
            event_type,
            action: action.into(),
            success,
            user_id: None,
            user_name: "system".to_string(),
            session_id: None,
            resource_type: None,
            resource_id: None,
            client_ip: None,
            client_hostname: None,
            application_name: None,
            details: HashMap::new(),
            error_message: None,
            event_time: Utc::now(),
        }
    }

    fn key_is_phi(key: &str) -> bool {
        let lower = key.to_ascii_lowercase();
        PHI_PATTERNS.iter().any(|pattern| lower.contains(pattern))
    }

    /// Redact any `details` entry whose key matches a [`PHI_PATTERNS`]
    /// substring, recursing into nested objects.
    pub fn sanitize_details(&self) -> HashMap<String, Value> {
        self.details
            .iter()
            .map(|(k, v)| (k.clone(), Self::sanitize_value(k, v)))
            .collect()
    }

    fn sanitize_value(key: &str, value: &Value) -> Value {
        if Self::key_is_phi(key) {
            return Value::String(REDACTED.to_string());
        }
        if let Value::Object(map) = value {
            let sanitized: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), Self::sanitize_value(k, v)))
                .collect();
            return Value::Object(sanitized);
        }
        value.clone()
    }

    /// The row payload this event would be persisted as, with `details`
    /// already sanitized.
    pub fn to_db_row(&self) -> HashMap<String, Value> {
        let mut row = HashMap::new();
        row.insert("event_type".to_string(), Value::String(self.event_type.to_string()));
        row.insert("action".to_string(), Value::String(self.action.clone()));
        row.insert("success".to_string(), Value::Bool(self.success));
        if let Some(uid) = self.user_id {
            row.insert("user_id".to_string(), Value::from(uid));
        }
        row.insert("user_name".to_string(), Value::String(self.user_name.clone()));
        if let Some(sid) = self.session_id {
            row.insert("session_id".to_string(), Value::String(sid.to_string()));
        }
        if let Some(rt) = &self.resource_type {
            row.insert("resource_type".to_string(), Value::String(rt.clone()));
        }
        if let Some(rid) = &self.resource_id {
            row.insert("resource_id".to_string(), Value::String(rid.clone()));
        }
        row.insert(
            "details".to_string(),
            Value::Object(self.sanitize_details().into_iter().collect()),
        );
        if let Some(err) = &self.error_message {
            row.insert("error_message".to_string(), Value::String(err.clone()));
        }
        row
    }
}
