//! Load-batch journal (C10): the `started -> {completed|failed|rolled_back}`
//! state machine tracked per ingestion run, keyed by input file MD5 so
//! re-running the same file is detected as an idempotent no-op.

use chrono::{DateTime, Utc};
use md5::{Digest, Md5};
use uuid::Uuid;

/// Terminal and non-terminal states of one load-batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "snake_case")]
pub enum LoadBatchStatus {
    Started,
    Completed,
    Failed,
    RolledBack,
}

impl LoadBatchStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoadBatchStatus::Started)
    }
}

/// One row of the load-batch journal.
#[derive(Debug, Clone)]
pub struct LoadBatch {
    pub batch_id: Uuid,
    pub source_file: String,
    pub file_md5: String,
    pub file_size: u64,
    pub status: LoadBatchStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub n_variants_loaded: u64,
    pub error_message: Option<String>,
    /// Set when a prior `completed` batch exists for the same `file_md5`;
    /// `previous_load_id` then names that batch's row.
    pub is_reload: bool,
    pub previous_load_id: Option<Uuid>,
}

/// A state transition rejected because the source batch is already
/// terminal.
#[derive(Debug, thiserror::Error)]
#[error("load batch {batch_id} is already in terminal state {current:?}, cannot transition to {attempted:?}")]
pub struct InvalidTransition {
    pub batch_id: Uuid,
    pub current: LoadBatchStatus,
    pub attempted: LoadBatchStatus,
}

impl LoadBatch {
    /// Start a new batch row. `previous_load_id`, if given, names the prior
    /// completed batch this one reloads; `is_reload` is derived from it.
    pub fn start(
        source_file: impl Into<String>,
        file_md5: String,
        file_size: u64,
        previous_load_id: Option<Uuid>,
    ) -> LoadBatch {
        LoadBatch {
            batch_id: Uuid::new_v4(),
            source_file: source_file.into(),
            file_md5,
            file_size,
            status: LoadBatchStatus::Started,
            started_at: Utc::now(),
            finished_at: None,
            n_variants_loaded: 0,
            error_message: None,
            is_reload: previous_load_id.is_some(),
            previous_load_id,
        }
    }

    fn transition(&mut self, to: LoadBatchStatus) -> Result<(), InvalidTransition> {
        if self.status.is_terminal() {
            return Err(InvalidTransition {
                batch_id: self.batch_id,
                current: self.status,
                attempted: to,
            });
        }
        self.status = to;
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn complete(&mut self, n_variants_loaded: u64) -> Result<(), InvalidTransition> {
        self.n_variants_loaded = n_variants_loaded;
        self.transition(LoadBatchStatus::Completed)
    }

    pub fn fail(&mut self, error_message: impl Into<String>) -> Result<(), InvalidTransition> {
        self.error_message = Some(error_message.into());
        self.transition(LoadBatchStatus::Failed)
    }

    pub fn roll_back(&mut self) -> Result<(), InvalidTransition> {
        self.transition(LoadBatchStatus::RolledBack)
    }
}

/// Compute the MD5 digest of a file's bytes, used as the idempotency key
/// for reload detection: the same file content (even under a renamed path)
/// is recognized and skipped rather than reloaded.
pub fn file_md5(bytes: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    base16ct::lower::encode_string(&hasher.finalize())
}

/// Whether the most recent batch recorded for the same `file_md5` (if any)
/// makes this load a reload: true exactly when that prior batch completed
/// successfully. This does not gate whether loading proceeds — it always
/// does — it only decides whether the new row links back to the prior one
/// via `previous_load_id`. A prior `Failed`/`RolledBack`/`Started` batch (or
/// no prior batch at all) is not a reload; the file is simply being loaded
/// for the first time as far as the journal is concerned.
pub fn should_reload(previous: Option<&LoadBatch>) -> bool {
    matches!(previous, Some(batch) if batch.status == LoadBatchStatus::Completed)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn new_batch_starts_in_started_state() {
        let batch = LoadBatch::start("test.vcf", "abc".to_string(), 100, None);
        assert_eq!(batch.status, LoadBatchStatus::Started);
        assert!(batch.finished_at.is_none());
        assert!(!batch.is_reload);
        assert!(batch.previous_load_id.is_none());
    }

    #[test]
    fn start_with_previous_load_id_marks_reload() {
        let previous_id = Uuid::new_v4();
        let batch = LoadBatch::start("test.vcf", "abc".to_string(), 100, Some(previous_id));
        assert!(batch.is_reload);
        assert_eq!(batch.previous_load_id, Some(previous_id));
    }

    #[test]
    fn complete_transitions_and_records_count() {
        let mut batch = LoadBatch::start("test.vcf", "abc".to_string(), 100, None);
        batch.complete(500).unwrap();
        assert_eq!(batch.status, LoadBatchStatus::Completed);
        assert_eq!(batch.n_variants_loaded, 500);
        assert!(batch.finished_at.is_some());
    }

    #[test]
    fn terminal_batch_rejects_further_transitions() {
        let mut batch = LoadBatch::start("test.vcf", "abc".to_string(), 100, None);
        batch.complete(1).unwrap();
        assert!(batch.fail("late error").is_err());
    }

    #[test]
    fn file_md5_is_stable() {
        let a = file_md5(b"hello world");
        let b = file_md5(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
        assert_ne!(a, file_md5(b"different"));
    }

    #[test]
    fn should_reload_flags_only_a_completed_prior_batch() {
        let mut completed = LoadBatch::start("x.vcf", "abc".to_string(), 1, None);
        completed.complete(1).unwrap();
        assert!(should_reload(Some(&completed)));

        let mut failed = LoadBatch::start("x.vcf", "abc".to_string(), 1, None);
        failed.fail("boom").unwrap();
        assert!(!should_reload(Some(&failed)));

        assert!(!should_reload(None));
    }
}
