//! Error taxonomy for the ingestion pipeline and its process exit codes.
//!
//! Mirrors the error kinds enumerated for the loader: each is fatal or
//! retried at a specific layer, and each maps to one of the stable process
//! exit codes CLI users observe.

use std::process::{ExitCode, Termination};

/// Top-level error kind for the ingestion pipeline.
///
/// This is a taxonomy, not a 1:1 mapping to Rust error *types* elsewhere in
/// the crate: lower-level errors (`sqlx::Error`, `std::io::Error`, ...) are
/// classified into one of these variants as they cross into the loader.
#[derive(thiserror::Error, Debug)]
pub enum LoaderError {
    /// VCF parse error, missing required column, non-UTF-8 bytes. Fatal for
    /// the current load.
    #[error("malformed input at line {line}: {message}")]
    InputMalformed { line: usize, message: String },

    /// Expected table, column, or index absent from the database.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Connection lost mid-batch, deadlock, lock-timeout. Retried with
    /// capped exponential backoff before being surfaced.
    #[error("transient store error after {attempts} attempts: {source}")]
    StoreTransient {
        attempts: u32,
        #[source]
        source: sqlx::Error,
    },

    /// A value violates a column or domain constraint (e.g. dosage outside
    /// `[0,2]`). Never retried.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// PHI encryption was requested (or required) but unavailable.
    #[error("PHI encryption unavailable: {0}")]
    PhiEncryption(String),

    /// Cooperative cancellation requested mid-load. Not really an "error":
    /// the batch transitions to `rolled_back`, not `failed`.
    #[error("load cancelled")]
    Cancelled,

    /// The audit flush itself failed; the event was written to the
    /// fallback journal file instead. The load is not failed because of
    /// this alone.
    #[error("audit write failed, event persisted to fallback file: {0}")]
    AuditWriteFailure(String),

    /// Caller lacks permission to perform the requested operation (RBAC,
    /// TLS enforcement). Kept thin here: actual authorization is an
    /// external collaborator.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Catch-all for errors from collaborating crates that don't cleanly
    /// classify above.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the pipeline.
pub type LoaderResult<T> = Result<T, LoaderError>;

impl LoaderError {
    /// Stable process exit code for this error, per the documented
    /// boundary: 1 operational, 2 input-file, 3 integrity, 4 permission.
    pub fn exit_code(&self) -> u8 {
        match self {
            LoaderError::InputMalformed { .. } => 2,
            LoaderError::SchemaMismatch(_) => 1,
            LoaderError::StoreTransient { .. } => 1,
            LoaderError::ConstraintViolation(_) => 1,
            LoaderError::PhiEncryption(_) => 1,
            LoaderError::Cancelled => 0,
            LoaderError::AuditWriteFailure(_) => 1,
            LoaderError::PermissionDenied(_) => 4,
            LoaderError::Other(_) => 1,
        }
    }
}

/// Raised when the audit hash chain fails to reproduce from stored rows.
#[derive(thiserror::Error, Debug)]
#[error("audit chain integrity failure: {0}")]
pub struct AuditIntegrityError(pub String);

/// Wraps a [`LoaderError`] so `main` can report the right exit code without
/// every caller having to match on the error kind itself.
#[derive(Debug)]
pub struct AppError(pub LoaderError);

impl From<LoaderError> for AppError {
    fn from(value: LoaderError) -> Self {
        AppError(value)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError(LoaderError::Other(value))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Termination for AppError {
    fn report(self) -> ExitCode {
        tracing::error!("ERROR: {}", self.0);
        ExitCode::from(self.0.exit_code())
    }
}

/// Audit integrity failures are distinguished at the process boundary
/// because they get exit code 3, not the generic 1.
pub fn audit_integrity_exit_code(_: &AuditIntegrityError) -> u8 {
    3
}

#[cfg(test)]
mod test {
    use super::LoaderError;

    #[test]
    fn exit_codes_match_documented_boundary() {
        assert_eq!(
            LoaderError::InputMalformed {
                line: 1,
                message: "x".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(LoaderError::Cancelled.exit_code(), 0);
        assert_eq!(LoaderError::PermissionDenied("x".into()).exit_code(), 4);
        assert_eq!(LoaderError::SchemaMismatch("x".into()).exit_code(), 1);
    }
}
