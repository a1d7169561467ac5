//! Layered configuration: built-in defaults, overridden by an optional TOML
//! file, overridden again by `VCF_PG_LOADER_*` environment variables (A2).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::GenomeRelease;
use crate::err::{LoaderError, LoaderResult};

/// Fully resolved runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_url: String,
    pub require_tls: bool,
    pub batch_size: usize,
    pub genome_release: GenomeRelease,
    pub min_sample_call_rate: f64,
    pub adj_min_gq: i64,
    pub adj_min_dp: i64,
    pub adj_min_het_ab: f64,
    pub audit_batch_size: usize,
    pub audit_fallback_path: String,
    pub phi_key_env_var: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "postgresql://localhost/vcf_pg_loader".to_string(),
            require_tls: true,
            batch_size: crate::vcf::DEFAULT_BATCH_SIZE,
            genome_release: GenomeRelease::Grch38,
            min_sample_call_rate: 0.95,
            adj_min_gq: 20,
            adj_min_dp: 10,
            adj_min_het_ab: 0.2,
            audit_batch_size: 100,
            audit_fallback_path: "./audit_fallback.jsonl".to_string(),
            phi_key_env_var: crate::phi::encryption::KEY_ENV_VAR.to_string(),
        }
    }
}

/// Prefix recognized for environment-variable overrides, e.g.
/// `VCF_PG_LOADER_DATABASE_URL`, `VCF_PG_LOADER_BATCH_SIZE`.
pub const ENV_PREFIX: &str = "VCF_PG_LOADER_";

impl Config {
    /// Build configuration by layering: defaults, then an optional TOML
    /// file at `path` (if it exists), then environment variables.
    pub fn load(path: Option<&Path>) -> LoaderResult<Config> {
        let mut config = Config::default();

        if let Some(path) = path {
            if path.exists() {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    LoaderError::SchemaMismatch(format!("cannot read config file {}: {e}", path.display()))
                })?;
                let file_config: Config = toml::from_str(&raw)
                    .map_err(|e| LoaderError::SchemaMismatch(format!("invalid config file: {e}")))?;
                config = file_config;
            }
        }

        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}DATABASE_URL")) {
            self.database_url = v;
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}REQUIRE_TLS")) {
            if let Ok(b) = v.parse() {
                self.require_tls = b;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}BATCH_SIZE")) {
            if let Ok(n) = v.parse() {
                self.batch_size = n;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}GENOME_RELEASE")) {
            if let Ok(release) = v.parse::<GenomeRelease>() {
                self.genome_release = release;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}MIN_SAMPLE_CALL_RATE")) {
            if let Ok(f) = v.parse() {
                self.min_sample_call_rate = f;
            }
        }
        if let Ok(v) = std::env::var(format!("{ENV_PREFIX}AUDIT_FALLBACK_PATH")) {
            self.audit_fallback_path = v;
        }
    }

    /// `require_tls` combined with a `sslmode=` check on the connection
    /// string: a bare `postgresql://` URL without `sslmode=require` (or
    /// stronger) is rejected when TLS is required.
    pub fn validate_tls(&self) -> LoaderResult<()> {
        if !self.require_tls {
            return Ok(());
        }
        let has_sslmode = self.database_url.contains("sslmode=require")
            || self.database_url.contains("sslmode=verify-ca")
            || self.database_url.contains("sslmode=verify-full");
        if !has_sslmode {
            return Err(LoaderError::PermissionDenied(
                "database_url must set sslmode=require (or stronger) when require_tls is set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.batch_size, crate::vcf::DEFAULT_BATCH_SIZE);
        assert!(config.require_tls);
    }

    #[test]
    fn missing_file_path_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/path.toml"))).unwrap();
        assert_eq!(config.database_url, Config::default().database_url);
    }

    #[test]
    fn env_override_wins_over_default() {
        std::env::set_var(format!("{ENV_PREFIX}BATCH_SIZE"), "42");
        let config = Config::load(None).unwrap();
        std::env::remove_var(format!("{ENV_PREFIX}BATCH_SIZE"));
        assert_eq!(config.batch_size, 42);
    }

    #[test]
    fn tls_validation_rejects_bare_url() {
        let mut config = Config::default();
        config.database_url = "postgresql://localhost/db".to_string();
        assert!(config.validate_tls().is_err());
    }

    #[test]
    fn tls_validation_accepts_sslmode_require() {
        let mut config = Config::default();
        config.database_url = "postgresql://localhost/db?sslmode=require".to_string();
        assert!(config.validate_tls().is_ok());
    }

    #[test]
    fn tls_validation_skipped_when_require_tls_false() {
        let mut config = Config::default();
        config.require_tls = false;
        config.database_url = "postgresql://localhost/db".to_string();
        assert!(config.validate_tls().is_ok());
    }
}
