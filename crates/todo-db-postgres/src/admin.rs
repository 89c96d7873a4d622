//! Direct-connection administration of an endpoint.

use async_trait::async_trait;
use lakebase_control::{AdminConnectOptions, AdminError, DatabaseAdmin};
use sqlx_core::connection::Connection;
use sqlx_core::executor::Executor;
use sqlx_postgres::{PgConnectOptions, PgConnection, PgSslMode};
use tracing::debug;

use crate::error::{is_connection_failure, is_duplicate_database};

/// Quotes `name` as a Postgres identifier.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn connect_options(options: &AdminConnectOptions) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&options.host)
        .port(options.port)
        .username(&options.user)
        .password(&options.password)
        .database(&options.database)
        .ssl_mode(if options.require_tls {
            PgSslMode::Require
        } else {
            PgSslMode::Prefer
        })
}

/// [`DatabaseAdmin`] over a single sqlx connection.
///
/// `CREATE DATABASE` cannot run inside a transaction, so the statement is
/// sent unprepared on a plain connection, which runs it in autocommit.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgDatabaseAdmin;

impl PgDatabaseAdmin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseAdmin for PgDatabaseAdmin {
    async fn create_database(
        &self,
        options: &AdminConnectOptions,
        database: &str,
    ) -> Result<(), AdminError> {
        let mut conn = PgConnection::connect_with(&connect_options(options))
            .await
            .map_err(|e| AdminError::Connection(e.to_string()))?;

        let statement = format!("CREATE DATABASE {}", quote_identifier(database));
        debug!(%statement, "executing_admin_statement");
        let result = conn.execute(statement.as_str()).await;
        let _ = conn.close().await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_duplicate_database(&e) => Err(AdminError::DuplicateDatabase),
            Err(e) if is_connection_failure(&e) => Err(AdminError::Connection(e.to_string())),
            Err(e) => Err(AdminError::Sql(e.to_string())),
        }
    }
}
