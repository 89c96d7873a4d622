//! Database migration management for the todo schema.
//!
//! Migrations are embedded in the binary and tracked by sqlx in the
//! `_sqlx_migrations` table.

use std::borrow::Cow;
use std::collections::HashSet;

use sqlx_core::migrate::{Migration, MigrationType, Migrator};
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::PgPool;
use tracing::{info, instrument};

use crate::error::{PostgresError, Result, is_undefined_table};

/// Embedded migrations as (version, description, sql), in order.
///
/// To add a migration, create the SQL file in `migrations/` and append an
/// entry here.
macro_rules! embedded_migrations {
    () => {
        &[(
            20260219000001i64,
            "initial_schema",
            include_str!("../../migrations/20260219000001_initial_schema.sql"),
        )]
    };
}

/// Builds a vector of Migration structs from embedded migration data.
fn build_migrations() -> Vec<Migration> {
    embedded_migrations!()
        .iter()
        .map(|(version, description, sql)| Migration {
            version: *version,
            description: Cow::Borrowed(description),
            migration_type: MigrationType::Simple,
            sql: Cow::Borrowed(sql),
            checksum: Cow::Borrowed(&[]), // Empty checksum for embedded migrations
            no_tx: false,
        })
        .collect()
}

/// Versions of all embedded migrations, ascending.
pub fn embedded_versions() -> Vec<i64> {
    build_migrations().iter().map(|m| m.version).collect()
}

/// How far the database schema is behind the embedded migrations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationStatus {
    /// The migrations table does not exist yet.
    NotInitialized,
    /// These embedded versions have not been applied.
    Pending(Vec<i64>),
    /// Every embedded migration has been applied.
    UpToDate,
}

/// Runs all pending migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to execute.
#[instrument(skip(pool))]
pub async fn run(pool: &PgPool) -> Result<()> {
    let migrations = build_migrations();
    info!(count = migrations.len(), "running_migrations");

    let migrator = Migrator {
        migrations: Cow::Owned(migrations),
        ignore_missing: false,
        locking: true,
        no_tx: false,
    };

    migrator
        .run(pool)
        .await
        .map_err(|e| PostgresError::Migration(format!("Migration failed: {e}")))?;

    info!("migrations_applied");

    Ok(())
}

/// Compares applied migrations with the embedded ones.
pub async fn migration_status(pool: &PgPool) -> Result<MigrationStatus> {
    let applied: Vec<i64> =
        match query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(pool)
            .await
        {
            Ok(versions) => versions,
            Err(e) if is_undefined_table(&e) => return Ok(MigrationStatus::NotInitialized),
            Err(e) => return Err(e.into()),
        };

    Ok(status_from(&applied))
}

fn status_from(applied: &[i64]) -> MigrationStatus {
    let applied: HashSet<i64> = applied.iter().copied().collect();
    let pending: Vec<i64> = embedded_versions()
        .into_iter()
        .filter(|v| !applied.contains(v))
        .collect();
    if pending.is_empty() {
        MigrationStatus::UpToDate
    } else {
        MigrationStatus::Pending(pending)
    }
}
