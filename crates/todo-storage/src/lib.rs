//! # todo-storage
//!
//! Domain types and the storage abstraction for todo items.
//!
//! This crate defines the [`TodoStorage`] trait and the types that flow
//! through it. Implementations live in separate crates: `todo-db-postgres`
//! for Lakebase and `todo-db-memory` for tests and local runs.

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::TodoStorage;
pub use types::{
    DEFAULT_LIST_LIMIT, ListParams, MAX_DESCRIPTION_LEN, MAX_TITLE_LEN, NewTodo, Priority, Todo,
    TodoPatch, TodoStats,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStorage = std::sync::Arc<dyn TodoStorage>;
