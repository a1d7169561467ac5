//! Append-only, hash-chained audit logging (C8).
//!
//! Events are buffered in memory and flushed in batches either to the
//! `hipaa_audit_log` table or, when the database is unreachable, to a local
//! JSONL fallback file so no audit event is silently dropped.

pub mod models;

use std::io::Write as _;
use std::path::PathBuf;
use std::time::Instant;

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

pub use models::{AuditEvent, AuditEventType, PHI_PATTERNS};

/// Who is performing audited actions in the current operation. Passed
/// explicitly rather than carried in a thread/task-local, since the
/// pipeline's async call graph already threads a handful of long-lived
/// context objects this way.
#[derive(Debug, Clone)]
pub struct AuditContext {
    pub user_id: Option<i64>,
    pub user_name: String,
    pub session_id: Option<Uuid>,
}

impl Default for AuditContext {
    fn default() -> Self {
        AuditContext {
            user_id: None,
            user_name: "system".to_string(),
            session_id: None,
        }
    }
}

impl AuditContext {
    pub fn new(user_id: Option<i64>, user_name: impl Into<String>) -> AuditContext {
        AuditContext {
            user_id,
            user_name: user_name.into(),
            session_id: Some(Uuid::new_v4()),
        }
    }

    fn apply_to(&self, event: &mut AuditEvent) {
        event.user_id = self.user_id;
        event.user_name = self.user_name.clone();
        event.session_id = self.session_id;
    }
}

/// Computes and verifies the SHA-256 hash chain linking audit entries.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditIntegrity;

impl AuditIntegrity {
    /// Compute one entry's hash from its content plus the previous entry's
    /// hash, so any modification to an entry (or re-ordering of the chain)
    /// is detectable.
    pub fn compute_entry_hash(
        &self,
        event_time: chrono::DateTime<chrono::Utc>,
        event_type: &str,
        user_name: &str,
        action: &str,
        success: bool,
        details: &serde_json::Value,
        previous_hash: &str,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(event_time.to_rfc3339().as_bytes());
        hasher.update(b"|");
        hasher.update(event_type.as_bytes());
        hasher.update(b"|");
        hasher.update(user_name.as_bytes());
        hasher.update(b"|");
        hasher.update(action.as_bytes());
        hasher.update(b"|");
        hasher.update([success as u8]);
        hasher.update(b"|");
        hasher.update(details.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(previous_hash.as_bytes());
        base16ct::lower::encode_string(&hasher.finalize())
    }

    /// Verify a chain of `(previous_hash, entry_hash)` pairs is unbroken:
    /// each entry's `previous_hash` must equal its predecessor's
    /// `entry_hash`.
    pub fn verify_chain(&self, entries: &[(String, String)]) -> Result<(), crate::err::AuditIntegrityError> {
        for window in entries.windows(2) {
            let (_, prev_entry_hash) = &window[0];
            let (next_previous_hash, _) = &window[1];
            if prev_entry_hash != next_previous_hash {
                return Err(crate::err::AuditIntegrityError(format!(
                    "hash chain broken: expected previous_hash={prev_entry_hash}, found {next_previous_hash}"
                )));
            }
        }
        Ok(())
    }
}

struct LoggerState {
    buffer: Vec<AuditEvent>,
    last_hash: String,
}

/// Buffers audit events and flushes them in batches, writing to the
/// database when available and to a local fallback file otherwise (or on
/// write failure).
pub struct AuditLogger {
    pool: Option<PgPool>,
    fallback_path: PathBuf,
    batch_size: usize,
    state: Mutex<LoggerState>,
}

impl AuditLogger {
    pub fn new(pool: Option<PgPool>, fallback_path: PathBuf, batch_size: usize) -> AuditLogger {
        AuditLogger {
            pool,
            fallback_path,
            batch_size,
            state: Mutex::new(LoggerState {
                buffer: Vec::new(),
                last_hash: "0".repeat(64),
            }),
        }
    }

    /// Buffer one event; flushes automatically once `batch_size` is
    /// reached.
    pub async fn log_event(&self, mut event: AuditEvent, context: &AuditContext) {
        context.apply_to(&mut event);
        let should_flush = {
            let mut state = self.state.lock().await;
            state.buffer.push(event);
            state.buffer.len() >= self.batch_size
        };
        if should_flush {
            self.flush().await;
        }
    }

    /// Flush the buffer: try the database first (if configured), falling
    /// back to the local JSONL file on any failure so the event is never
    /// lost.
    pub async fn flush(&self) {
        let mut state = self.state.lock().await;
        if state.buffer.is_empty() {
            return;
        }
        let events = std::mem::take(&mut state.buffer);

        let mut to_fallback = Vec::new();
        for event in events {
            let wrote_to_db = match &self.pool {
                Some(pool) => self.write_to_db(pool, &event, &mut state.last_hash).await.is_ok(),
                None => false,
            };
            if !wrote_to_db {
                to_fallback.push(event);
            }
        }

        if !to_fallback.is_empty() {
            if let Err(e) = self.write_fallback(&to_fallback) {
                tracing::error!("audit fallback write failed, events may be lost: {e}");
            }
        }
    }

    async fn write_to_db(
        &self,
        pool: &PgPool,
        event: &AuditEvent,
        last_hash: &mut String,
    ) -> Result<(), sqlx::Error> {
        let row = event.to_db_row();
        let details = serde_json::Value::Object(row.get("details").and_then(|v| v.as_object().cloned()).unwrap_or_default());
        let integrity = AuditIntegrity;
        let entry_hash = integrity.compute_entry_hash(
            event.event_time,
            &event.event_type.to_string(),
            &event.user_name,
            &event.action,
            event.success,
            &details,
            last_hash,
        );

        sqlx::query(
            "INSERT INTO hipaa_audit_log \
             (event_type, user_id, user_name, session_id, resource_type, resource_id, \
              action, success, details, error_message, previous_hash, entry_hash) \
             VALUES ($1::audit_event_type, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(event.event_type.to_string())
        .bind(event.user_id)
        .bind(&event.user_name)
        .bind(event.session_id)
        .bind(&event.resource_type)
        .bind(&event.resource_id)
        .bind(&event.action)
        .bind(event.success)
        .bind(sqlx::types::Json(&details))
        .bind(&event.error_message)
        .bind(last_hash.clone())
        .bind(&entry_hash)
        .execute(pool)
        .await?;

        *last_hash = entry_hash;
        Ok(())
    }

    fn write_fallback(&self, events: &[AuditEvent]) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.fallback_path)?;
        for event in events {
            let row = event.to_db_row();
            let line = serde_json::to_string(&row).unwrap_or_else(|_| "{}".to_string());
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Wrap an operation with matching "started"/"completed"/"failed"
    /// audit events, recording wall-clock duration and, on failure, the
    /// error's `Display` text.
    pub async fn audit_operation<F, T, E>(
        &self,
        event_type: AuditEventType,
        action: &str,
        resource_type: Option<&str>,
        resource_id: Option<&str>,
        context: &AuditContext,
        operation: F,
    ) -> Result<T, E>
    where
        F: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut started = AuditEvent::new(event_type, action, true);
        started.resource_type = resource_type.map(|s| s.to_string());
        started.resource_id = resource_id.map(|s| s.to_string());
        started
            .details
            .insert("phase".to_string(), serde_json::Value::String("started".to_string()));
        self.log_event(started, context).await;

        let start = Instant::now();
        let result = operation.await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut finished = AuditEvent::new(event_type, action, result.is_ok());
        finished.resource_type = resource_type.map(|s| s.to_string());
        finished.resource_id = resource_id.map(|s| s.to_string());
        let phase = if result.is_ok() { "completed" } else { "failed" };
        finished
            .details
            .insert("phase".to_string(), serde_json::Value::String(phase.to_string()));
        finished
            .details
            .insert("duration_ms".to_string(), serde_json::Value::from(duration_ms));
        if let Err(e) = &result {
            finished.error_message = Some(e.to_string());
        }
        self.log_event(finished, context).await;

        result
    }

    /// Record a reverse-lookup attempt (used by [`crate::phi::SampleAnonymizer::reverse_lookup`]),
    /// always under [`AuditEventType::PhiAccess`] regardless of outcome.
    pub async fn record_reverse_lookup(&self, context: AuditContext, anonymous_id: Uuid, success: bool) {
        let mut event = AuditEvent::new(AuditEventType::PhiAccess, "reverse_lookup", success);
        event.resource_type = Some("sample_id".to_string());
        event.resource_id = Some(anonymous_id.to_string());
        self.log_event(event, &context).await;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::NamedTempFile;

    fn fallback_path() -> (NamedTempFile, PathBuf) {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_path_buf();
        (file, path)
    }

    #[tokio::test]
    async fn log_event_buffers_until_batch_size() {
        let (_guard, path) = fallback_path();
        let logger = AuditLogger::new(None, path.clone(), 3);
        let context = AuditContext::default();

        logger
            .log_event(AuditEvent::new(AuditEventType::DataWrite, "test", true), &context)
            .await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn flush_writes_to_fallback_when_no_db() {
        let (_guard, path) = fallback_path();
        let logger = AuditLogger::new(None, path.clone(), 10);
        let context = AuditContext::default();

        logger
            .log_event(AuditEvent::new(AuditEventType::DataWrite, "test_fallback", true), &context)
            .await;
        logger.flush().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["action"], "test_fallback");
        assert_eq!(parsed["event_type"], "DATA_WRITE");
    }

    #[tokio::test]
    async fn batch_flush_at_threshold() {
        let (_guard, path) = fallback_path();
        let logger = AuditLogger::new(None, path.clone(), 3);
        let context = AuditContext::default();

        for i in 0..3 {
            logger
                .log_event(
                    AuditEvent::new(AuditEventType::DataRead, format!("action_{i}"), true),
                    &context,
                )
                .await;
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
    }

    #[tokio::test]
    async fn audit_operation_logs_started_and_completed() {
        let (_guard, path) = fallback_path();
        let logger = AuditLogger::new(None, path.clone(), 10);
        let context = AuditContext::default();

        let result: Result<(), anyhow::Error> = logger
            .audit_operation(
                AuditEventType::DataWrite,
                "load_file",
                Some("vcf"),
                Some("test.vcf"),
                &context,
                async { Ok(()) },
            )
            .await;
        assert!(result.is_ok());
        logger.flush().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let start: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        let end: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(start["details"]["phase"], "started");
        assert_eq!(end["details"]["phase"], "completed");
        assert!(end["details"]["duration_ms"].is_number());
    }

    #[tokio::test]
    async fn audit_operation_logs_failure_with_error_message() {
        let (_guard, path) = fallback_path();
        let logger = AuditLogger::new(None, path.clone(), 10);
        let context = AuditContext::default();

        let result: Result<(), anyhow::Error> = logger
            .audit_operation(
                AuditEventType::DataWrite,
                "failing_operation",
                None,
                None,
                &context,
                async { Err(anyhow::anyhow!("test error")) },
            )
            .await;
        assert!(result.is_err());
        logger.flush().await;

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let end: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(end["success"], false);
        assert_eq!(end["details"]["phase"], "failed");
        assert!(end["error_message"].as_str().unwrap().contains("test error"));
    }

    #[test]
    fn compute_entry_hash_is_deterministic() {
        let integrity = AuditIntegrity;
        let time = chrono::DateTime::parse_from_rfc3339("2024-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        let details = serde_json::json!({"key": "value"});

        let hash1 = integrity.compute_entry_hash(time, "DATA_READ", "test_user", "test_action", true, &details, "abc123");
        let hash2 = integrity.compute_entry_hash(time, "DATA_READ", "test_user", "test_action", true, &details, "abc123");
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn hash_changes_with_any_field() {
        let integrity = AuditIntegrity;
        let time = chrono::Utc::now();
        let details = serde_json::json!({});

        let base = integrity.compute_entry_hash(time, "DATA_READ", "test_user", "test_action", true, &details, "abc");
        let action_changed = integrity.compute_entry_hash(time, "DATA_READ", "test_user", "modified_action", true, &details, "abc");
        let previous_changed = integrity.compute_entry_hash(time, "DATA_READ", "test_user", "test_action", true, &details, "xyz");

        assert_ne!(base, action_changed);
        assert_ne!(base, previous_changed);
        assert_ne!(action_changed, previous_changed);
    }

    #[test]
    fn verify_chain_detects_break() {
        let integrity = AuditIntegrity;
        let good = vec![
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "c".to_string()),
        ];
        assert!(integrity.verify_chain(&good).is_ok());

        let broken = vec![
            ("a".to_string(), "b".to_string()),
            ("WRONG".to_string(), "c".to_string()),
        ];
        assert!(integrity.verify_chain(&broken).is_err());
    }
}
