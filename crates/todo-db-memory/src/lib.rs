//! In-memory todo storage.
//!
//! Backs the server when `storage.backend = "memory"` and in tests. Data is
//! lost when the process exits.
//!
//! # Example
//!
//! ```ignore
//! use todo_db_memory::InMemoryStorage;
//! use todo_storage::{NewTodo, TodoStorage};
//!
//! let storage = InMemoryStorage::new();
//! let todo = storage.create(NewTodo::new("Buy milk")).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use todo_storage::{
    DynStorage, ListParams, NewTodo, StorageError, Todo, TodoPatch, TodoStats, TodoStorage,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Todo storage held in a `HashMap` behind an async `RwLock`.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    todos: RwLock<HashMap<Uuid, Todo>>,
}

impl InMemoryStorage {
    /// Creates an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored todos.
    pub async fn len(&self) -> usize {
        self.todos.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.todos.read().await.is_empty()
    }
}

/// Creates a new shared in-memory storage.
pub fn create_storage() -> DynStorage {
    Arc::new(InMemoryStorage::new())
}

#[async_trait]
impl TodoStorage for InMemoryStorage {
    async fn create(&self, todo: NewTodo) -> Result<Todo, StorageError> {
        todo.validate()?;
        let now = OffsetDateTime::now_utc();
        let stored = Todo {
            id: Uuid::new_v4(),
            title: todo.title,
            description: todo.description,
            completed: false,
            priority: todo.priority,
            user_email: todo.user_email,
            created_at: now,
            updated_at: now,
        };
        self.todos.write().await.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, StorageError> {
        Ok(self.todos.read().await.get(&id).cloned())
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<Todo>, StorageError> {
        let todos = self.todos.read().await;
        let mut matching: Vec<Todo> = todos
            .values()
            .filter(|t| {
                params
                    .user_email
                    .as_ref()
                    .is_none_or(|email| t.user_email.as_ref() == Some(email))
            })
            .filter(|t| params.completed.is_none_or(|c| t.completed == c))
            .cloned()
            .collect();
        matching.sort_by(Todo::list_order);
        matching.truncate(usize::try_from(params.limit.max(0)).unwrap_or(usize::MAX));
        Ok(matching)
    }

    async fn update(&self, id: Uuid, patch: TodoPatch) -> Result<Option<Todo>, StorageError> {
        patch.validate()?;
        let mut todos = self.todos.write().await;
        let Some(todo) = todos.get_mut(&id) else {
            return Ok(None);
        };
        if !patch.is_empty() {
            patch.apply_to(todo);
            todo.updated_at = OffsetDateTime::now_utc();
        }
        Ok(Some(todo.clone()))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        Ok(self.todos.write().await.remove(&id).is_some())
    }

    async fn stats(&self, user_email: Option<&str>) -> Result<TodoStats, StorageError> {
        let todos = self.todos.read().await;
        Ok(TodoStats::from_todos(todos.values().filter(|t| {
            user_email.is_none_or(|email| t.user_email.as_deref() == Some(email))
        })))
    }

    async fn health_check(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use todo_storage::Priority;

    fn owned(title: &str, email: &str) -> NewTodo {
        NewTodo::new(title).with_user_email(Some(email.to_string()))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let storage = InMemoryStorage::new();
        let created = storage
            .create(NewTodo::new("Buy milk").with_priority(Priority::High))
            .await
            .unwrap();

        assert!(!created.completed);
        assert_eq!(created.created_at, created.updated_at);
        let fetched = storage.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(storage.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_title() {
        let storage = InMemoryStorage::new();
        let err = storage.create(NewTodo::new("")).await.unwrap_err();
        assert!(err.is_invalid_input());
        assert!(storage.is_empty().await);
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let storage = InMemoryStorage::new();
        storage.create(owned("low", "a@x.com").with_priority(Priority::Low)).await.unwrap();
        let high = storage
            .create(owned("high", "a@x.com").with_priority(Priority::High))
            .await
            .unwrap();
        storage.create(owned("other user", "b@x.com")).await.unwrap();
        storage.toggle(high.id).await.unwrap();

        let params = ListParams::new().with_user_email(Some("a@x.com".into()));
        let titles: Vec<_> = storage
            .list(&params)
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.title)
            .collect();
        assert_eq!(titles, ["low", "high"]);

        let pending = storage
            .list(&params.clone().with_completed(Some(false)))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let limited = storage.list(&ListParams::new().with_limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_update_empty_patch_keeps_timestamp() {
        let storage = InMemoryStorage::new();
        let created = storage.create(NewTodo::new("a")).await.unwrap();

        let same = storage
            .update(created.id, TodoPatch::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(same, created);

        let updated = storage
            .update(
                created.id,
                TodoPatch {
                    title: Some("b".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "b");
        assert!(updated.updated_at >= created.updated_at);
        assert!(storage.update(Uuid::new_v4(), TodoPatch::completed(true)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_toggle_delete_and_stats() {
        let storage = InMemoryStorage::new();
        let a = storage
            .create(owned("a", "a@x.com").with_priority(Priority::High))
            .await
            .unwrap();
        storage.create(owned("b", "a@x.com").with_priority(Priority::High)).await.unwrap();
        storage.create(owned("c", "b@x.com")).await.unwrap();

        let toggled = storage.toggle(a.id).await.unwrap().unwrap();
        assert!(toggled.completed);

        let stats = storage.stats(Some("a@x.com")).await.unwrap();
        assert_eq!(
            stats,
            TodoStats { total: 2, completed: 1, pending: 1, high_priority: 1 }
        );
        assert_eq!(storage.stats(None).await.unwrap().total, 3);

        assert!(storage.delete(a.id).await.unwrap());
        assert!(!storage.delete(a.id).await.unwrap());
        assert!(storage.toggle(a.id).await.unwrap().is_none());
    }
}
