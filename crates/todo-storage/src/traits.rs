//! The storage trait every todo backend implements.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageError;
use crate::types::{ListParams, NewTodo, Todo, TodoPatch, TodoStats};

/// Persistence of todo items.
///
/// Implementations must be thread-safe (`Send + Sync`). Missing todos are
/// reported as `None` / `false`, never as errors.
///
/// # Example
///
/// ```ignore
/// use todo_storage::{StorageError, TodoStorage};
///
/// async fn title_of(storage: &dyn TodoStorage, id: Uuid) -> Result<String, StorageError> {
///     storage
///         .get(id)
///         .await?
///         .map(|todo| todo.title)
///         .ok_or_else(|| StorageError::not_found(id))
/// }
/// ```
#[async_trait]
pub trait TodoStorage: Send + Sync {
    // ==================== CRUD Operations ====================

    /// Creates a todo with a generated id and both timestamps set to now.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidInput` if the todo fails validation.
    async fn create(&self, todo: NewTodo) -> Result<Todo, StorageError>;

    /// Reads a todo by id.
    async fn get(&self, id: Uuid) -> Result<Option<Todo>, StorageError>;

    /// Lists todos matching `params`, ordered incomplete first, then by
    /// priority (high to low), then newest first.
    async fn list(&self, params: &ListParams) -> Result<Vec<Todo>, StorageError>;

    /// Applies `patch` and bumps `updated_at`.
    ///
    /// An empty patch returns the current todo unchanged. Returns `None` if
    /// the todo does not exist.
    async fn update(&self, id: Uuid, patch: TodoPatch) -> Result<Option<Todo>, StorageError>;

    /// Deletes a todo. Returns `false` if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool, StorageError>;

    // ==================== Aggregates ====================

    /// Counts todos, restricted to `user_email` when given.
    async fn stats(&self, user_email: Option<&str>) -> Result<TodoStats, StorageError>;

    // ==================== Health ====================

    /// Returns `true` if the backend can serve requests.
    async fn health_check(&self) -> bool;

    /// Flips the completion flag. Returns `None` if the todo does not exist.
    async fn toggle(&self, id: Uuid) -> Result<Option<Todo>, StorageError> {
        let Some(current) = self.get(id).await? else {
            return Ok(None);
        };
        self.update(id, TodoPatch::completed(!current.completed)).await
    }
}
