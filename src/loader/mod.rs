//! Batch loader orchestration (C9): drives VCF reading, QC computation, and
//! persistence for one input file end to end, reporting through the audit
//! log and load-batch journal as it goes.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::audit::{AuditContext, AuditEvent, AuditEventType, AuditLogger};
use crate::batch::{self, LoadBatch, LoadBatchStatus};
use crate::config::Config;
use crate::db;
use crate::err::{LoaderError, LoaderResult};
use crate::hapmap3::{self, Hapmap3Variant};
use crate::phi::SampleAnonymizer;
use crate::qc::genotype::{decode_sample, DecodedGenotype};
use crate::qc::{self, AdjThresholds};
use crate::vcf::{BatchIterator, DecomposedVariant, VcfReader};

/// Summary returned once a file has been fully ingested.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub batch: LoadBatch,
    pub n_variants: u64,
    pub n_batches: u64,
}

/// Drives one file's ingestion: open, decompose, QC, persist, journal.
pub struct BatchLoader<'a> {
    pub pool: PgPool,
    pub config: &'a Config,
    pub audit: &'a AuditLogger,
    cancel_requested: Arc<AtomicBool>,
}

impl<'a> BatchLoader<'a> {
    pub fn new(pool: PgPool, config: &'a Config, audit: &'a AuditLogger) -> BatchLoader<'a> {
        BatchLoader {
            pool,
            config,
            audit,
            cancel_requested: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle callers can use to request cooperative cancellation of an
    /// in-progress [`ingest_file`](Self::ingest_file) call. Checked between
    /// batches, not mid-batch: a requested cancellation takes effect at the
    /// next batch boundary.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel_requested.clone()
    }

    /// Ingest `path`. A prior `completed` batch for the same file content
    /// (by MD5) is recorded as a reload via `is_reload`/`previous_load_id`
    /// on the new batch row, but loading always proceeds and upserts.
    pub async fn ingest_file(&self, path: &Path, context: &AuditContext) -> LoaderResult<IngestSummary> {
        let bytes = std::fs::read(path).map_err(|e| LoaderError::InputMalformed {
            line: 0,
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let md5 = batch::file_md5(&bytes);
        let source_file = path.display().to_string();

        let previous = self.fetch_previous_batch(&md5).await?;
        let previous_load_id = if batch::should_reload(previous.as_ref()) {
            previous.map(|b| b.batch_id)
        } else {
            None
        };

        let mut load_batch = LoadBatch::start(source_file.clone(), md5, bytes.len() as u64, previous_load_id);
        self.insert_load_batch(&load_batch).await?;
        self.audit.log_event(lifecycle_event("load_started", &load_batch, None), context).await;

        match self.run_ingest(path, &source_file, load_batch.batch_id).await {
            Ok((n_variants, n_batches)) => {
                load_batch.complete(n_variants).ok();
                self.update_load_batch_completed(&load_batch).await?;
                let details = serde_json::json!({"n_variants": n_variants, "n_batches": n_batches});
                self.audit
                    .log_event(lifecycle_event("load_completed", &load_batch, Some(details)), context)
                    .await;
                Ok(IngestSummary { batch: load_batch, n_variants, n_batches })
            }
            Err(LoaderError::Cancelled) => {
                load_batch.roll_back().ok();
                self.update_load_batch_rolled_back(&load_batch).await?;
                self.audit
                    .log_event(lifecycle_event("load_cancelled", &load_batch, None), context)
                    .await;
                Err(LoaderError::Cancelled)
            }
            Err(e) => {
                load_batch.fail(e.to_string()).ok();
                self.update_load_batch_failed(&load_batch).await?;
                let details = serde_json::json!({"error_kind": classify_error(&e)});
                self.audit
                    .log_event(lifecycle_event("load_failed", &load_batch, Some(details)), context)
                    .await;
                Err(e)
            }
        }
    }

    async fn fetch_previous_batch(&self, file_md5: &str) -> LoaderResult<Option<LoadBatch>> {
        let row = sqlx::query(db::batch_schema::SELECT_LATEST_LOAD_BATCH_BY_MD5_SQL)
            .bind(file_md5)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Ok(None) };

        let status: String = row.try_get("status").map_err(db_err)?;
        let status: LoadBatchStatus = status
            .parse()
            .map_err(|e: strum::ParseError| LoaderError::SchemaMismatch(format!("unknown load_batches.status: {e}")))?;

        Ok(Some(LoadBatch {
            batch_id: row.try_get("batch_id").map_err(db_err)?,
            source_file: row.try_get("source_file").map_err(db_err)?,
            file_md5: row.try_get("file_md5").map_err(db_err)?,
            file_size: row.try_get::<i64, _>("file_size").map_err(db_err)? as u64,
            status,
            started_at: row.try_get("started_at").map_err(db_err)?,
            finished_at: row.try_get("finished_at").map_err(db_err)?,
            n_variants_loaded: row.try_get::<i64, _>("n_variants_loaded").map_err(db_err)? as u64,
            error_message: row.try_get("error_message").map_err(db_err)?,
            is_reload: row.try_get("is_reload").map_err(db_err)?,
            previous_load_id: row.try_get("previous_load_id").map_err(db_err)?,
        }))
    }

    async fn insert_load_batch(&self, load_batch: &LoadBatch) -> LoaderResult<()> {
        sqlx::query(db::batch_schema::INSERT_LOAD_BATCH_SQL)
            .bind(load_batch.batch_id)
            .bind(&load_batch.source_file)
            .bind(&load_batch.file_md5)
            .bind(load_batch.file_size as i64)
            .bind(load_batch.status.to_string())
            .bind(load_batch.started_at)
            .bind(load_batch.is_reload)
            .bind(load_batch.previous_load_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_load_batch_completed(&self, load_batch: &LoadBatch) -> LoaderResult<()> {
        sqlx::query(db::batch_schema::COMPLETE_LOAD_BATCH_SQL)
            .bind(load_batch.batch_id)
            .bind(load_batch.finished_at)
            .bind(load_batch.n_variants_loaded as i64)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_load_batch_failed(&self, load_batch: &LoadBatch) -> LoaderResult<()> {
        sqlx::query(db::batch_schema::FAIL_LOAD_BATCH_SQL)
            .bind(load_batch.batch_id)
            .bind(load_batch.finished_at)
            .bind(&load_batch.error_message)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn update_load_batch_rolled_back(&self, load_batch: &LoadBatch) -> LoaderResult<()> {
        sqlx::query(db::batch_schema::ROLL_BACK_LOAD_BATCH_SQL)
            .bind(load_batch.batch_id)
            .bind(load_batch.finished_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn run_ingest(&self, path: &Path, source_file: &str, batch_id: Uuid) -> LoaderResult<(u64, u64)> {
        let reader = VcfReader::new(crate::vcf::open_vcf_reader(path)?)?;
        let sample_names = reader.header.samples.clone();

        let mut anonymizer = SampleAnonymizer::new(self.pool.clone());
        let anonymized_samples = anonymizer.bulk_anonymize(&sample_names, source_file).await?;

        let thresholds = AdjThresholds {
            min_gq: self.config.adj_min_gq,
            min_dp: self.config.adj_min_dp,
            min_het_ab: self.config.adj_min_het_ab,
        };

        let mut batches = BatchIterator::new(reader, self.config.batch_size);
        let mut n_variants = 0u64;
        let mut n_batches = 0u64;

        while let Some(variants) = batches.next_batch()? {
            if self.cancel_requested.load(Ordering::Relaxed) {
                return Err(LoaderError::Cancelled);
            }
            self.persist_batch(&variants, &anonymized_samples, source_file, batch_id, &thresholds)
                .await?;
            n_variants += variants.len() as u64;
            n_batches += 1;
        }

        Ok((n_variants, n_batches))
    }

    /// Run the HapMap3 match, per-variant QC, and sample anonymization C9
    /// step 5 requires, then upsert the variant and its genotype rows.
    async fn persist_batch(
        &self,
        variants: &[DecomposedVariant],
        anonymized_samples: &[Uuid],
        source_file: &str,
        batch_id: Uuid,
        thresholds: &AdjThresholds,
    ) -> LoaderResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for variant in variants {
            let alt_index = (variant.alt_index + 1) as u32;
            let decoded: Vec<Option<DecodedGenotype>> = variant
                .samples
                .iter()
                .map(|raw| {
                    variant
                        .format
                        .as_deref()
                        .and_then(|format| decode_sample(format, raw, alt_index, thresholds))
                })
                .collect();

            let variant_qc = qc::compute_variant_qc(decoded.iter().filter_map(|d| d.as_ref().map(|d| d.call)));
            let hapmap3_match = self
                .lookup_hapmap3_match(&variant.chrom, variant.normalized.pos, &variant.normalized.r#ref, &variant.normalized.alt)
                .await?;

            let variant_id: i64 = sqlx::query_scalar(db::schema::UPSERT_VARIANT_SQL)
                .bind(&variant.chrom)
                .bind(variant.normalized.pos as i64)
                .bind(&variant.normalized.r#ref)
                .bind(&variant.normalized.alt)
                .bind(variant.qual)
                .bind(&variant.filter)
                .bind(variant.annotation.as_ref().and_then(|a| a.gene.clone()))
                .bind(variant.annotation.as_ref().and_then(|a| a.consequence.clone()))
                .bind(variant.annotation.as_ref().and_then(|a| a.impact.clone()))
                .bind(variant_qc.frequency.map(|f| f.aaf))
                .bind(variant_qc.frequency.map(|f| f.maf))
                .bind(variant_qc.frequency.map(|f| f.mac as i32))
                .bind(variant_qc.hwe_p_value)
                .bind(hapmap3_match)
                .bind(source_file)
                .bind(batch_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;

            for (sample_idx, maybe_decoded) in decoded.iter().enumerate() {
                let Some(decoded) = maybe_decoded else { continue };
                let Some(&sample_id) = anonymized_samples.get(sample_idx) else { continue };
                sqlx::query(db::schema::UPSERT_GENOTYPE_SQL)
                    .bind(variant_id)
                    .bind(sample_id)
                    .bind(&decoded.gt)
                    .bind(decoded.gq)
                    .bind(decoded.dp)
                    .bind(decoded.allele_balance)
                    .bind(decoded.dosage)
                    .bind(decoded.adj_pass)
                    .execute(&mut *tx)
                    .await
                    .map_err(db_err)?;
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn lookup_hapmap3_match(
        &self,
        chrom: &str,
        pos: u64,
        ref_allele: &str,
        alt_allele: &str,
    ) -> LoaderResult<Option<bool>> {
        let normalized_chrom = crate::common::normalize_chrom(chrom);
        let row = sqlx::query(db::hapmap3_schema::SELECT_HAPMAP3_PANEL_ENTRY_SQL)
            .bind(&normalized_chrom)
            .bind(pos as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        let Some(row) = row else { return Ok(None) };

        let entry = Hapmap3Variant {
            chrom: row.try_get("chrom").map_err(db_err)?,
            pos: row.try_get::<i64, _>("pos").map_err(db_err)? as u64,
            ref_allele: row.try_get("ref_allele").map_err(db_err)?,
            alt_allele: row.try_get("alt_allele").map_err(db_err)?,
        };
        Ok(Some(hapmap3::match_against_panel(chrom, pos, ref_allele, alt_allele, &entry).is_some()))
    }
}

fn db_err(e: sqlx::Error) -> LoaderError {
    LoaderError::StoreTransient { attempts: 1, source: e }
}

/// Build one of the load lifecycle audit events (`load_started`,
/// `load_completed`, `load_failed`, `load_cancelled`), carrying the batch's
/// id and reload linkage plus whatever phase-specific `extra` details.
fn lifecycle_event(action: &str, load_batch: &LoadBatch, extra: Option<serde_json::Value>) -> AuditEvent {
    let success = !matches!(load_batch.status, LoadBatchStatus::Failed);
    let mut event = AuditEvent::new(AuditEventType::DataWrite, action, success);
    event.resource_type = Some("vcf_file".to_string());
    event.resource_id = Some(load_batch.source_file.clone());
    event
        .details
        .insert("batch_id".to_string(), serde_json::Value::String(load_batch.batch_id.to_string()));
    event
        .details
        .insert("is_reload".to_string(), serde_json::Value::Bool(load_batch.is_reload));
    if let Some(previous_id) = load_batch.previous_load_id {
        event
            .details
            .insert("previous_load_id".to_string(), serde_json::Value::String(previous_id.to_string()));
    }
    if let Some(serde_json::Value::Object(fields)) = extra {
        event.details.extend(fields);
    }
    if load_batch.status == LoadBatchStatus::Failed {
        event.error_message = load_batch.error_message.clone();
    }
    event
}

/// Coarse error classification recorded on `load_failed` events, so audit
/// queries can group failures by kind without parsing `error_message`.
fn classify_error(e: &LoaderError) -> &'static str {
    match e {
        LoaderError::InputMalformed { .. } => "input_malformed",
        LoaderError::SchemaMismatch(_) => "schema_mismatch",
        LoaderError::StoreTransient { .. } => "store_transient",
        LoaderError::ConstraintViolation(_) => "constraint_violation",
        LoaderError::PhiEncryption(_) => "phi_encryption",
        LoaderError::Cancelled => "cancelled",
        LoaderError::AuditWriteFailure(_) => "audit_write_failure",
        LoaderError::PermissionDenied(_) => "permission_denied",
        LoaderError::Other(_) => "other",
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ingest_summary_is_constructible() {
        let batch = LoadBatch::start("x.vcf", "md5".to_string(), 10, None);
        let summary = IngestSummary { batch, n_variants: 5, n_batches: 1 };
        assert_eq!(summary.n_variants, 5);
    }

    #[rstest::rstest]
    #[case(LoaderError::InputMalformed { line: 1, message: "x".into() }, "input_malformed")]
    #[case(LoaderError::Cancelled, "cancelled")]
    #[case(LoaderError::PermissionDenied("x".into()), "permission_denied")]
    fn classify_error_cases(#[case] error: LoaderError, #[case] expected: &str) {
        assert_eq!(classify_error(&error), expected);
    }

    #[test]
    fn lifecycle_event_carries_reload_linkage() {
        let previous_id = Uuid::new_v4();
        let batch = LoadBatch::start("x.vcf", "md5".to_string(), 10, Some(previous_id));
        let event = lifecycle_event("load_started", &batch, None);
        assert_eq!(event.action, "load_started");
        assert_eq!(event.details["is_reload"], serde_json::Value::Bool(true));
        assert_eq!(
            event.details["previous_load_id"],
            serde_json::Value::String(previous_id.to_string())
        );
    }

    #[test]
    fn lifecycle_event_load_completed_carries_counts() {
        let mut batch = LoadBatch::start("x.vcf", "md5".to_string(), 10, None);
        batch.complete(42).unwrap();
        let details = serde_json::json!({"n_variants": 42, "n_batches": 3});
        let event = lifecycle_event("load_completed", &batch, Some(details));
        assert_eq!(event.details["n_variants"], serde_json::json!(42));
        assert!(event.success);
    }

    #[test]
    fn lifecycle_event_load_failed_carries_error_message() {
        let mut batch = LoadBatch::start("x.vcf", "md5".to_string(), 10, None);
        batch.fail("boom").unwrap();
        let event = lifecycle_event("load_failed", &batch, Some(serde_json::json!({"error_kind": "other"})));
        assert!(!event.success);
        assert_eq!(event.error_message.as_deref(), Some("boom"));
        assert_eq!(event.details["error_kind"], serde_json::json!("other"));
    }
}
