//! vcf-pg-loader-worker main executable

pub mod annotation;
pub mod audit;
pub mod batch;
pub mod common;
pub mod config;
pub mod db;
pub mod err;
pub mod hapmap3;
pub mod imputation;
pub mod info;
pub mod loader;
pub mod normalize;
pub mod phi;
pub mod population_freq;
pub mod qc;
pub mod vcf;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

use audit::{AuditContext, AuditLogger};
use err::{AppError, LoaderError};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "VCF ingestion worker for PRS/QC-oriented storage",
    long_about = "Ingests VCF files into a PostgreSQL store, computing QC metrics, \
                  HapMap3 reference matches, and PHI-safe sample identifiers along the way."
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// Path to a TOML configuration file (defaults layered under `VCF_PG_LOADER_*` env vars)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingest one or more VCF files.
    Ingest(Ingest),
    /// HapMap3 reference panel commands.
    Hapmap3(Hapmap3),
    /// Reverse-lookup a PHI-anonymized sample id (always audited).
    ReverseLookup(ReverseLookup),
    /// Audit log maintenance commands.
    Audit(Audit),
    /// Apply the database schema (idempotent).
    Migrate,
}

#[derive(Debug, Args)]
struct Ingest {
    /// VCF file(s) to ingest (plain or gzip/bgzip-compressed).
    #[clap(required = true)]
    paths: Vec<PathBuf>,

    /// User name recorded against the audit trail for this run.
    #[clap(long, default_value = "system")]
    user_name: String,
}

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Hapmap3 {
    #[command(subcommand)]
    command: Hapmap3Commands,
}

#[derive(Debug, Subcommand)]
enum Hapmap3Commands {
    /// Load a HapMap3 reference panel file.
    Load(Hapmap3Load),
}

#[derive(Debug, Args)]
struct Hapmap3Load {
    /// Path to the HapMap3 reference panel file.
    path: PathBuf,
}

#[derive(Debug, Args)]
struct ReverseLookup {
    /// Anonymized UUID to resolve back to its original sample id.
    anonymous_id: uuid::Uuid,

    /// User name recorded against the audit trail for this lookup.
    #[clap(long, default_value = "system")]
    user_name: String,
}

#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Audit {
    #[command(subcommand)]
    command: AuditCommands,
}

#[derive(Debug, Subcommand)]
enum AuditCommands {
    /// Verify the hash chain of the locally buffered fallback audit log.
    Verify(AuditVerify),
}

#[derive(Debug, Args)]
struct AuditVerify {
    /// Path to the fallback JSONL audit log to verify.
    path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .compact()
        .finish();

    tracing::subscriber::set_global_default(collector)
        .map_err(|e| LoaderError::Other(e.into()))?;

    let term = Term::stderr();
    let config = config::Config::load(cli.config.as_deref())?;

    match &cli.command {
        Commands::Ingest(args) => run_ingest(&config, args).await?,
        Commands::Hapmap3(hapmap3) => match &hapmap3.command {
            Hapmap3Commands::Load(args) => run_hapmap3_load(&config, args).await?,
        },
        Commands::ReverseLookup(args) => run_reverse_lookup(&config, args).await?,
        Commands::Audit(audit) => match &audit.command {
            AuditCommands::Verify(args) => run_audit_verify(args)?,
        },
        Commands::Migrate => run_migrate(&config).await?,
    }

    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" \u{1f603}", "")))
        .map_err(|e| LoaderError::Other(e.into()))?;

    Ok(())
}

async fn run_migrate(config: &config::Config) -> Result<(), LoaderError> {
    let pool = db::connect(config).await?;
    db::migrate(&pool).await?;
    tracing::info!("schema migration applied");
    Ok(())
}

async fn run_ingest(config: &config::Config, args: &Ingest) -> Result<(), LoaderError> {
    let pool = db::connect(config).await?;
    let logger = AuditLogger::new(
        Some(pool.clone()),
        PathBuf::from(&config.audit_fallback_path),
        config.audit_batch_size,
    );
    let context = AuditContext::new(None, args.user_name.clone());

    let batch_loader = loader::BatchLoader::new(pool, config, &logger);
    for path in &args.paths {
        let summary = batch_loader.ingest_file(path, &context).await?;
        tracing::info!(
            "ingested {} variants from {} across {} batches (load_batch_id={})",
            summary.n_variants,
            path.display(),
            summary.n_batches,
            summary.batch.batch_id
        );
    }
    logger.flush().await;
    Ok(())
}

async fn run_hapmap3_load(config: &config::Config, args: &Hapmap3Load) -> Result<(), LoaderError> {
    let pool = db::connect(config).await?;
    let n_loaded = hapmap3::load_panel(&pool, &args.path).await?;
    tracing::info!("loaded {n_loaded} HapMap3 panel entries from {}", args.path.display());
    Ok(())
}

async fn run_reverse_lookup(config: &config::Config, args: &ReverseLookup) -> Result<(), LoaderError> {
    let pool = db::connect(config).await?;
    let logger = AuditLogger::new(
        Some(pool.clone()),
        PathBuf::from(&config.audit_fallback_path),
        config.audit_batch_size,
    );
    let context = AuditContext::new(None, args.user_name.clone());

    let anonymizer = phi::SampleAnonymizer::new(pool);
    let original_id = anonymizer
        .reverse_lookup(args.anonymous_id, &logger, context)
        .await?;
    logger.flush().await;
    println!("{original_id}");
    Ok(())
}

fn run_audit_verify(args: &AuditVerify) -> Result<(), LoaderError> {
    let contents = std::fs::read_to_string(&args.path).map_err(|e| LoaderError::InputMalformed {
        line: 0,
        message: format!("cannot read {}: {e}", args.path.display()),
    })?;

    let mut entries = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let row: serde_json::Value = serde_json::from_str(line).map_err(|e| LoaderError::InputMalformed {
            line: line_no,
            message: format!("invalid audit log JSON: {e}"),
        })?;
        let previous_hash = row["previous_hash"].as_str().unwrap_or_default().to_string();
        let entry_hash = row["entry_hash"].as_str().unwrap_or_default().to_string();
        entries.push((previous_hash, entry_hash));
    }

    let integrity = audit::AuditIntegrity;
    integrity
        .verify_chain(&entries)
        .map_err(|e| LoaderError::Other(e.into()))?;

    tracing::info!("audit chain of {} entries verified OK", entries.len());
    Ok(())
}
