//! Configuration types for the PostgreSQL storage backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx_postgres::{PgConnectOptions, PgSslMode};

/// Configuration for the PostgreSQL storage backend.
///
/// Lakebase endpoints authenticate with short-lived tokens, so the password
/// is usually absent here and supplied per connection instead.
#[derive(Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Endpoint host.
    pub host: String,

    /// Endpoint port.
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Postgres role to connect as.
    pub user: String,

    /// Static password. Takes precedence over rotating tokens.
    pub password: Option<String>,

    /// Connection pool size (maximum number of connections).
    pub pool_size: u32,

    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Idle timeout in milliseconds.
    /// Connections idle longer than this will be closed.
    pub idle_timeout_ms: Option<u64>,

    /// Maximum connection lifetime in seconds. Kept below the token lifetime
    /// so no pooled connection outlives its credential by much.
    pub max_lifetime_secs: Option<u64>,

    /// Require TLS on every connection.
    pub require_tls: bool,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            database: "todoapp".into(),
            user: String::new(),
            password: None,
            pool_size: 10,
            connect_timeout_ms: 5000,
            idle_timeout_ms: Some(300_000), // 5 minutes
            max_lifetime_secs: Some(1800),
            require_tls: true,
        }
    }
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("url", &self.redacted_url())
            .field("pool_size", &self.pool_size)
            .field("connect_timeout_ms", &self.connect_timeout_ms)
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .field("max_lifetime_secs", &self.max_lifetime_secs)
            .field("require_tls", &self.require_tls)
            .finish()
    }
}

impl PostgresConfig {
    /// Creates a new configuration for `database` on `host`.
    #[must_use]
    pub fn new(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Sets the user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Sets a static password. Empty strings count as no password.
    #[must_use]
    pub fn with_password(mut self, password: Option<String>) -> Self {
        self.password = password.filter(|p| !p.is_empty());
        self
    }

    /// Sets the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the pool size.
    #[must_use]
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, timeout: u64) -> Self {
        self.connect_timeout_ms = timeout;
        self
    }

    /// Sets the idle timeout.
    #[must_use]
    pub fn with_idle_timeout_ms(mut self, timeout: Option<u64>) -> Self {
        self.idle_timeout_ms = timeout;
        self
    }

    /// Sets whether TLS is required.
    #[must_use]
    pub fn with_require_tls(mut self, require: bool) -> Self {
        self.require_tls = require;
        self
    }

    /// Connection options without a password.
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .ssl_mode(if self.require_tls {
                PgSslMode::Require
            } else {
                PgSslMode::Prefer
            });
        if self.user.is_empty() {
            options
        } else {
            options.username(&self.user)
        }
    }

    /// Connection URL for logs, with any password masked.
    pub fn redacted_url(&self) -> String {
        let password = if self.password.is_some() { ":****" } else { "" };
        format!(
            "postgres://{}{password}@{}:{}/{}",
            self.user, self.host, self.port, self.database
        )
    }
}
