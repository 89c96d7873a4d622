//! Todo domain types.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StorageError;

/// Maximum title length, in characters.
pub const MAX_TITLE_LEN: usize = 500;

/// Maximum description length, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Number of todos returned by a listing without an explicit limit.
pub const DEFAULT_LIST_LIMIT: i64 = 100;

/// Priority level of a todo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Position in listings: high first, low last.
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(StorageError::invalid_input(format!(
                "unknown priority '{other}'"
            ))),
        }
    }
}

/// A stored todo item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: Priority,
    pub user_email: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Todo {
    /// Listing order: incomplete first, then by priority, then newest first.
    pub fn list_order(a: &Todo, b: &Todo) -> Ordering {
        a.completed
            .cmp(&b.completed)
            .then_with(|| a.priority.rank().cmp(&b.priority.rank()))
            .then_with(|| b.created_at.cmp(&a.created_at))
    }
}

/// Input for creating a todo.
///
/// The owner is never taken from the request body; callers set it from the
/// authenticated user.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewTodo {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(skip)]
    pub user_email: Option<String>,
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_user_email(mut self, user_email: Option<String>) -> Self {
        self.user_email = user_email;
        self
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        validate_title(&self.title)?;
        validate_description(self.description.as_deref())
    }
}

/// Partial update of a todo. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TodoPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<Priority>,
}

impl TodoPatch {
    /// Patch that only sets the completion flag.
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.completed.is_none()
            && self.priority.is_none()
    }

    pub fn validate(&self) -> Result<(), StorageError> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        validate_description(self.description.as_deref())
    }

    /// Applies the set fields to `todo`. Does not touch timestamps.
    pub fn apply_to(&self, todo: &mut Todo) {
        if let Some(title) = &self.title {
            todo.title = title.clone();
        }
        if let Some(description) = &self.description {
            todo.description = Some(description.clone());
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(priority) = self.priority {
            todo.priority = priority;
        }
    }
}

fn validate_title(title: &str) -> Result<(), StorageError> {
    let len = title.chars().count();
    if len == 0 {
        return Err(StorageError::invalid_input("title must not be empty"));
    }
    if len > MAX_TITLE_LEN {
        return Err(StorageError::invalid_input(format!(
            "title must be at most {MAX_TITLE_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: Option<&str>) -> Result<(), StorageError> {
    match description {
        Some(d) if d.chars().count() > MAX_DESCRIPTION_LEN => Err(StorageError::invalid_input(
            format!("description must be at most {MAX_DESCRIPTION_LEN} characters"),
        )),
        _ => Ok(()),
    }
}

/// Filters for listing todos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListParams {
    pub user_email: Option<String>,
    pub completed: Option<bool>,
    pub limit: i64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            user_email: None,
            completed: None,
            limit: DEFAULT_LIST_LIMIT,
        }
    }
}

impl ListParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user_email(mut self, user_email: Option<String>) -> Self {
        self.user_email = user_email;
        self
    }

    #[must_use]
    pub fn with_completed(mut self, completed: Option<bool>) -> Self {
        self.completed = completed;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Aggregate counts over a user's todos.
///
/// `high_priority` only counts pending items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoStats {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub high_priority: i64,
}

impl TodoStats {
    /// Computes stats over already-filtered todos.
    pub fn from_todos<'a>(todos: impl IntoIterator<Item = &'a Todo>) -> Self {
        todos.into_iter().fold(Self::default(), |mut stats, todo| {
            stats.total += 1;
            if todo.completed {
                stats.completed += 1;
            } else {
                stats.pending += 1;
                if todo.priority == Priority::High {
                    stats.high_priority += 1;
                }
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn todo(title: &str, completed: bool, priority: Priority, age_secs: i64) -> Todo {
        let now = OffsetDateTime::now_utc() - Duration::seconds(age_secs);
        Todo {
            id: Uuid::new_v4(),
            title: title.into(),
            description: None,
            completed,
            priority,
            user_email: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_priority_parsing() {
        assert_eq!("high".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(serde_json::to_value(Priority::Low).unwrap(), "low");
    }

    #[test]
    fn test_list_order() {
        let mut todos = vec![
            todo("done-high", true, Priority::High, 0),
            todo("low", false, Priority::Low, 0),
            todo("high-old", false, Priority::High, 60),
            todo("high-new", false, Priority::High, 0),
            todo("medium", false, Priority::Medium, 0),
        ];
        todos.sort_by(Todo::list_order);
        let titles: Vec<_> = todos.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["high-new", "high-old", "medium", "low", "done-high"]);
    }

    #[test]
    fn test_new_todo_validation() {
        assert!(NewTodo::new("Buy milk").validate().is_ok());
        assert!(NewTodo::new("").validate().is_err());
        assert!(NewTodo::new("x".repeat(501)).validate().is_err());
        assert!(NewTodo::new("ok").with_description("d".repeat(2001)).validate().is_err());
        // limits count characters, not bytes
        assert!(NewTodo::new("é".repeat(500)).validate().is_ok());
    }

    #[test]
    fn test_new_todo_ignores_owner_in_body() {
        let parsed: NewTodo = serde_json::from_value(serde_json::json!({
            "title": "t",
            "user_email": "mallory@example.com"
        }))
        .unwrap();
        assert_eq!(parsed.user_email, None);
        assert_eq!(parsed.priority, Priority::Medium);
    }

    #[test]
    fn test_patch() {
        assert!(TodoPatch::default().is_empty());
        assert!(TodoPatch { title: Some(String::new()), ..Default::default() }.validate().is_err());

        let mut t = todo("a", false, Priority::Low, 0);
        TodoPatch {
            title: Some("b".into()),
            priority: Some(Priority::High),
            ..Default::default()
        }
        .apply_to(&mut t);
        assert_eq!(t.title, "b");
        assert_eq!(t.priority, Priority::High);
        assert!(!t.completed);
    }

    #[test]
    fn test_stats_count_pending_high_priority_only() {
        let todos = [
            todo("a", true, Priority::High, 0),
            todo("b", false, Priority::High, 0),
            todo("c", false, Priority::Low, 0),
        ];
        let stats = TodoStats::from_todos(&todos);
        assert_eq!(
            stats,
            TodoStats { total: 3, completed: 1, pending: 2, high_priority: 1 }
        );
    }
}
