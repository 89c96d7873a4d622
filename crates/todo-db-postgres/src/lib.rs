//! Lakebase PostgreSQL storage backend for the todo API.
//!
//! This crate provides a PostgreSQL implementation of the `TodoStorage` trait
//! from `todo-storage`, using sqlx. Connections authenticate either with a
//! static password or with short-lived tokens from a
//! [`lakebase_control::CredentialProvider`].
//!
//! # Example
//!
//! ```ignore
//! use todo_db_postgres::{PostgresConfig, PostgresTodoStorage, migrations};
//! use todo_storage::{NewTodo, TodoStorage};
//!
//! let config = PostgresConfig::new("ep-1.db.example.com", "todoapp")
//!     .with_user("alice@example.com")
//!     .with_password(Some("secret".into()));
//!
//! let storage = PostgresTodoStorage::new(&config, None).await;
//! migrations::run(storage.pool()).await?;
//! let todo = storage.create(NewTodo::new("Buy milk")).await?;
//! ```
//!
//! # Architecture
//!
//! - [`config`]: connection settings
//! - [`pool`]: connection pool management
//! - [`storage`]: the `TodoStorage` implementation and credential rotation
//! - [`queries`]: SQL query implementations
//! - [`migrations`]: embedded schema migrations
//! - [`admin`]: `CREATE DATABASE` for endpoint bootstrap

mod admin;
mod config;
mod error;
mod pool;
mod storage;

/// Database migrations module.
pub mod migrations;

/// SQL query implementations.
pub mod queries;

pub use admin::{PgDatabaseAdmin, quote_identifier};
pub use config::PostgresConfig;
pub use error::{
    PG_DUPLICATE_DATABASE, PG_UNDEFINED_TABLE, PostgresError, Result, has_pg_error_code,
    is_duplicate_database, is_undefined_table,
};
pub use migrations::MigrationStatus;
pub use pool::{create_lazy_pool, create_pool};
pub use storage::{PostgresTodoStorage, RotatingPassword};

pub use sqlx_postgres::PgPool;
pub use todo_storage::{StorageError, TodoStorage};

/// Type alias for a shareable PostgresTodoStorage instance.
pub type DynPostgresStorage = std::sync::Arc<PostgresTodoStorage>;

/// Creates a shared storage over a lazily connecting pool.
pub async fn create_storage(
    config: &PostgresConfig,
    rotation: Option<RotatingPassword>,
) -> DynPostgresStorage {
    std::sync::Arc::new(PostgresTodoStorage::new(config, rotation).await)
}
