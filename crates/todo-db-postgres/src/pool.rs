//! Connection pool management for the PostgreSQL storage backend.

use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgConnectOptions, PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::Result;

/// Pool settings shared by the eager and lazy constructors. Connections
/// are never opened ahead of demand: a suspended endpoint wakes on first use.
fn pool_options(config: &PostgresConfig) -> PoolOptions<Postgres> {
    let mut options = PoolOptions::<Postgres>::new()
        .max_connections(config.pool_size)
        .min_connections(0)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms))
        .test_before_acquire(false);

    if let Some(idle_timeout) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle_timeout));
    }
    if let Some(lifetime) = config.max_lifetime_secs {
        options = options.max_lifetime(Duration::from_secs(lifetime));
    }
    options
}

/// Creates a pool and opens a first connection to verify the settings.
#[instrument(skip_all, fields(url = %config.redacted_url()))]
pub async fn create_pool(config: &PostgresConfig, connect: PgConnectOptions) -> Result<PgPool> {
    info!(
        pool_size = config.pool_size,
        connect_timeout_ms = config.connect_timeout_ms,
        max_lifetime_secs = ?config.max_lifetime_secs,
        "creating_postgres_pool"
    );

    let pool = pool_options(config).connect_with(connect).await?;

    debug!(size = pool.size(), "postgres_pool_ready");

    Ok(pool)
}

/// Creates a pool that connects on first use.
///
/// Lets the server start while the endpoint is suspended or unreachable;
/// failures then surface per request and through the health check.
pub fn create_lazy_pool(config: &PostgresConfig, connect: PgConnectOptions) -> PgPool {
    info!(
        url = %config.redacted_url(),
        pool_size = config.pool_size,
        "creating_lazy_postgres_pool"
    );
    pool_options(config).connect_lazy_with(connect)
}
