//! Protected Health Information handling (C7): deterministic anonymous-ID
//! mapping and audited reverse lookup, backed by the `phi_vault` schema.

pub mod encryption;

use std::collections::HashMap;

use sqlx::PgPool;
use uuid::Uuid;

pub use encryption::PhiEncryptor;

use crate::audit::{AuditContext, AuditLogger};
use crate::err::{LoaderError, LoaderResult};

/// Deterministically maps `(original_id, source_file)` pairs to anonymous
/// UUIDs, backed by the database so the mapping is stable across runs and
/// reverse lookups are centrally audited.
pub struct SampleAnonymizer {
    pool: PgPool,
    cache: HashMap<(String, String), Uuid>,
}

impl SampleAnonymizer {
    pub fn new(pool: PgPool) -> SampleAnonymizer {
        SampleAnonymizer {
            pool,
            cache: HashMap::new(),
        }
    }

    /// Drop the in-process cache; subsequent lookups re-query the database.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Get (creating if necessary) the anonymous UUID for one sample
    /// identifier, scoped to the VCF file it came from.
    pub async fn anonymize_sample_id(
        &mut self,
        original_id: &str,
        source_file: &str,
    ) -> LoaderResult<Uuid> {
        let key = (original_id.to_string(), source_file.to_string());
        if let Some(id) = self.cache.get(&key) {
            return Ok(*id);
        }

        let row: (Uuid,) = sqlx::query_as("SELECT phi_vault.get_or_create_anonymous_id($1, $2)")
            .bind(original_id)
            .bind(source_file)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| LoaderError::StoreTransient {
                attempts: 1,
                source: e,
            })?;

        self.cache.insert(key, row.0);
        Ok(row.0)
    }

    /// Anonymize every sample in `original_ids`, preserving order.
    pub async fn bulk_anonymize(
        &mut self,
        original_ids: &[String],
        source_file: &str,
    ) -> LoaderResult<Vec<Uuid>> {
        let mut out = Vec::with_capacity(original_ids.len());
        for id in original_ids {
            out.push(self.anonymize_sample_id(id, source_file).await?);
        }
        Ok(out)
    }

    /// Already-computed anonymous ID, if cached; does not touch the
    /// database.
    pub fn get_anonymous_id(&self, original_id: &str, source_file: &str) -> Option<Uuid> {
        self.cache
            .get(&(original_id.to_string(), source_file.to_string()))
            .copied()
    }

    /// Reverse an anonymous UUID back to its original sample identifier.
    /// This is an audited, privileged operation: every call is logged via
    /// `audit` regardless of success or failure.
    pub async fn reverse_lookup(
        &self,
        anonymous_id: Uuid,
        audit: &AuditLogger,
        context: AuditContext,
    ) -> LoaderResult<String> {
        let result: LoaderResult<String> = async {
            let row: (String,) = sqlx::query_as("SELECT phi_vault.reverse_lookup($1)")
                .bind(anonymous_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| LoaderError::StoreTransient {
                    attempts: 1,
                    source: e,
                })?;
            Ok(row.0)
        }
        .await;

        audit
            .record_reverse_lookup(context, anonymous_id, result.is_ok())
            .await;

        result
    }
}
