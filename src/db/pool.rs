//! Connection pool construction.
//!
//! Builds the shared `PgPool` every [`Connection`](crate::db::Connection) and
//! [`Listener`](crate::db::Listener) is created from.

use crate::config::PoolOptions;
use crate::error::{DalError, DalResult};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connect to `url` with the given pool options.
pub async fn connect(url: &str, pool_opts: &PoolOptions) -> DalResult<PgPool> {
    pool_opts.validate().map_err(DalError::bad_parameter)?;
    let options = PgConnectOptions::from_str(url)?;

    info!(
        host = %options.get_host(),
        port = options.get_port(),
        database = ?options.get_database(),
        max_connections = pool_opts.max_connections_or_default(),
        "Connecting to database"
    );

    let pool = PgPoolOptions::new()
        .min_connections(pool_opts.min_connections_or_default())
        .max_connections(pool_opts.max_connections_or_default())
        .acquire_timeout(Duration::from_secs(pool_opts.acquire_timeout_or_default()))
        .idle_timeout(Some(Duration::from_secs(
            pool_opts.idle_timeout_or_default(),
        )))
        .test_before_acquire(pool_opts.test_before_acquire_or_default())
        .connect_with(options)
        .await?;

    match server_version(&pool).await {
        Some(version) => info!(server_version = %version, "Connected successfully"),
        None => info!("Connected successfully"),
    }
    Ok(pool)
}

/// Get the server version from the connected database.
async fn server_version(pool: &PgPool) -> Option<String> {
    match sqlx::query_scalar::<_, String>("SELECT version()")
        .fetch_one(pool)
        .await
    {
        Ok(version) => {
            debug!(version = %version, "Got server version");
            Some(version)
        }
        Err(e) => {
            warn!(error = %e, "Failed to get server version");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_pool_options_rejected() {
        let opts = PoolOptions {
            max_connections: Some(0),
            ..PoolOptions::default()
        };
        let err = connect("postgres://localhost/db", &opts).await.unwrap_err();
        assert!(matches!(err, DalError::BadParameter { .. }));
    }

    #[tokio::test]
    async fn test_malformed_url_passes_through() {
        let err = connect("not a url", &PoolOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DalError::Database(_)));
    }
}
