//! Creation of the application database inside a provisioned endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::client::{ControlPlane, Identity};
use crate::error::ProvisionError;
use crate::names::validate_database_name;
use crate::resources::Endpoint;

/// Maintenance database every endpoint has.
pub const CONTROL_DATABASE: &str = "postgres";

/// Default Postgres port of an endpoint.
pub const DEFAULT_PORT: u16 = 5432;

/// Errors reported by a [`DatabaseAdmin`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdminError {
    /// The connection could not be established. Worth retrying.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The database is already there.
    #[error("database already exists")]
    DuplicateDatabase,

    /// Any other SQL failure.
    #[error("SQL error: {0}")]
    Sql(String),
}

/// Where and as whom to connect for administrative statements.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminConnectOptions {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub require_tls: bool,
}

impl AdminConnectOptions {
    /// Autocommit connection to the control database over TLS.
    pub fn control(host: impl Into<String>, user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: password.into(),
            database: CONTROL_DATABASE.to_string(),
            require_tls: true,
        }
    }
}

impl std::fmt::Debug for AdminConnectOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConnectOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"****")
            .field("database", &self.database)
            .field("require_tls", &self.require_tls)
            .finish()
    }
}

/// Issues `CREATE DATABASE` over a direct autocommit connection.
#[async_trait]
pub trait DatabaseAdmin: Send + Sync {
    /// Opens a connection with `options`, creates `database`, and closes the
    /// connection. `database` has already been validated as an identifier.
    async fn create_database(
        &self,
        options: &AdminConnectOptions,
        database: &str,
    ) -> Result<(), AdminError>;
}

/// Bounded fixed-delay retry for connection failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Creates the application database once an endpoint is up.
///
/// Freshly provisioned or resuming endpoints may refuse connections for a
/// while, so connection failures are retried under [`RetryPolicy`] with a
/// new credential for every attempt. Nothing else is retried.
pub struct DatabaseBootstrap {
    control_plane: Arc<dyn ControlPlane>,
    identity: Arc<dyn Identity>,
    admin: Arc<dyn DatabaseAdmin>,
    retry: RetryPolicy,
}

impl DatabaseBootstrap {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        identity: Arc<dyn Identity>,
        admin: Arc<dyn DatabaseAdmin>,
    ) -> Self {
        Self {
            control_plane,
            identity,
            admin,
            retry: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Creates `database` on `endpoint` unless it already exists.
    pub async fn ensure_database(
        &self,
        endpoint: &Endpoint,
        endpoint_name: &str,
        database: &str,
    ) -> Result<(), ProvisionError> {
        validate_database_name(database)?;
        let host = endpoint
            .host()
            .ok_or_else(|| ProvisionError::EndpointNotReady {
                endpoint: endpoint_name.to_string(),
            })?;
        let user = self.identity.current_user().await?.user_name;

        let attempts = self.retry.max_attempts.max(1);
        let mut last_error = AdminError::Connection("no connection attempt was made".into());
        for attempt in 1..=attempts {
            if attempt > 1 {
                info!(
                    attempt,
                    wait_secs = self.retry.delay.as_secs_f64(),
                    "retrying_database_connection"
                );
                tokio::time::sleep(self.retry.delay).await;
            }

            let credential = self
                .control_plane
                .generate_database_credential(endpoint_name)
                .await?;
            info!(
                host,
                user = %user,
                endpoint = endpoint_name,
                database,
                attempt,
                token_length = credential.token.len(),
                "connecting_to_create_database"
            );

            let options = AdminConnectOptions::control(host, user.as_str(), credential.token);
            match self.admin.create_database(&options, database).await {
                Ok(()) => {
                    info!(database, "database_created");
                    return Ok(());
                }
                Err(AdminError::DuplicateDatabase) => {
                    info!(database, "database_exists");
                    return Ok(());
                }
                Err(AdminError::Connection(message)) => {
                    warn!(attempt, error = %message, "database_connection_failed");
                    last_error = AdminError::Connection(message);
                }
                Err(other) => return Err(other.into()),
            }
        }

        Err(last_error.into())
    }
}
