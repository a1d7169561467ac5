//! Pooled PostgreSQL connections, with TLS enforcement applied before the
//! first connection is ever opened.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::err::{LoaderError, LoaderResult};

/// Open a connection pool for `config`, refusing to connect at all if TLS
/// is required but not requested in the connection string.
pub async fn connect(config: &Config) -> LoaderResult<PgPool> {
    config.validate_tls()?;

    PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .map_err(|e| LoaderError::StoreTransient { attempts: 1, source: e })
}
