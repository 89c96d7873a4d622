//! Todo CRUD queries.

use chrono::{DateTime, Utc};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, Postgres};
use time::OffsetDateTime;
use todo_storage::{ListParams, NewTodo, StorageError, Todo, TodoPatch, TodoStats};
use uuid::Uuid;

use crate::error::storage_error;

const TODO_COLUMNS: &str =
    "id, title, description, completed, priority, user_email, created_at, updated_at";

/// Listing order: incomplete first, then high to low priority, newest first.
const LIST_ORDER: &str = "completed ASC, \
     CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 WHEN 'low' THEN 3 END, \
     created_at DESC";

type TodoRow = (
    Uuid,
    String,
    Option<String>,
    bool,
    String,
    Option<String>,
    DateTime<Utc>,
    DateTime<Utc>,
);

/// Converts chrono DateTime to time OffsetDateTime.
fn chrono_to_time(dt: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(dt.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
        + time::Duration::nanoseconds(i64::from(dt.timestamp_subsec_nanos()))
}

fn row_to_todo(row: TodoRow) -> Result<Todo, StorageError> {
    let (id, title, description, completed, priority, user_email, created_at, updated_at) = row;
    Ok(Todo {
        id,
        title,
        description,
        completed,
        priority: priority
            .parse()
            .map_err(|_| StorageError::internal(format!("todo {id} has invalid priority '{priority}'")))?,
        user_email,
        created_at: chrono_to_time(created_at),
        updated_at: chrono_to_time(updated_at),
    })
}

pub async fn create(pool: &PgPool, todo: &NewTodo) -> Result<Todo, StorageError> {
    let sql = format!(
        "INSERT INTO todos (title, description, priority, user_email) \
         VALUES ($1, $2, $3, $4) RETURNING {TODO_COLUMNS}"
    );
    let row: TodoRow = query_as(&sql)
        .bind(&todo.title)
        .bind(&todo.description)
        .bind(todo.priority.as_str())
        .bind(&todo.user_email)
        .fetch_one(pool)
        .await
        .map_err(|e| storage_error(e, "Failed to create todo"))?;
    row_to_todo(row)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Option<Todo>, StorageError> {
    let sql = format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = $1");
    let row: Option<TodoRow> = query_as(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| storage_error(e, "Failed to read todo"))?;
    row.map(row_to_todo).transpose()
}

/// SQL for a listing; placeholders are numbered in the order
/// user_email, completed, limit, skipping absent filters.
fn list_sql(params: &ListParams) -> String {
    let mut conditions = Vec::new();
    let mut n = 1;
    if params.user_email.is_some() {
        conditions.push(format!("user_email = ${n}"));
        n += 1;
    }
    if params.completed.is_some() {
        conditions.push(format!("completed = ${n}"));
        n += 1;
    }
    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };
    format!("SELECT {TODO_COLUMNS} FROM todos{where_clause} ORDER BY {LIST_ORDER} LIMIT ${n}")
}

pub async fn list(pool: &PgPool, params: &ListParams) -> Result<Vec<Todo>, StorageError> {
    let sql = list_sql(params);
    let mut q = query_as::<Postgres, TodoRow>(&sql);
    if let Some(email) = &params.user_email {
        q = q.bind(email);
    }
    if let Some(completed) = params.completed {
        q = q.bind(completed);
    }
    let rows = q
        .bind(params.limit.max(0))
        .fetch_all(pool)
        .await
        .map_err(|e| storage_error(e, "Failed to list todos"))?;
    rows.into_iter().map(row_to_todo).collect()
}

/// SQL for a partial update; `None` for an empty patch. Placeholders follow
/// the order title, description, completed, priority, then the id.
fn update_sql(patch: &TodoPatch) -> Option<String> {
    let fields = [
        ("title", patch.title.is_some()),
        ("description", patch.description.is_some()),
        ("completed", patch.completed.is_some()),
        ("priority", patch.priority.is_some()),
    ];
    let mut sets: Vec<String> = fields
        .iter()
        .filter(|(_, set)| *set)
        .enumerate()
        .map(|(i, (column, _))| format!("{column} = ${}", i + 1))
        .collect();
    if sets.is_empty() {
        return None;
    }
    let id_param = sets.len() + 1;
    sets.push("updated_at = NOW()".to_string());
    Some(format!(
        "UPDATE todos SET {} WHERE id = ${id_param} RETURNING {TODO_COLUMNS}",
        sets.join(", ")
    ))
}

pub async fn update(pool: &PgPool, id: Uuid, patch: &TodoPatch) -> Result<Option<Todo>, StorageError> {
    let Some(sql) = update_sql(patch) else {
        return get(pool, id).await;
    };
    let mut q = query_as::<Postgres, TodoRow>(&sql);
    if let Some(title) = &patch.title {
        q = q.bind(title);
    }
    if let Some(description) = &patch.description {
        q = q.bind(description);
    }
    if let Some(completed) = patch.completed {
        q = q.bind(completed);
    }
    if let Some(priority) = patch.priority {
        q = q.bind(priority.as_str());
    }
    let row = q
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(|e| storage_error(e, "Failed to update todo"))?;
    row.map(row_to_todo).transpose()
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, StorageError> {
    let result = query("DELETE FROM todos WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(|e| storage_error(e, "Failed to delete todo"))?;
    Ok(result.rows_affected() > 0)
}

pub async fn stats(pool: &PgPool, user_email: Option<&str>) -> Result<TodoStats, StorageError> {
    let where_clause = if user_email.is_some() {
        " WHERE user_email = $1"
    } else {
        ""
    };
    let sql = format!(
        "SELECT \
             COUNT(*), \
             COUNT(*) FILTER (WHERE completed = true), \
             COUNT(*) FILTER (WHERE completed = false), \
             COUNT(*) FILTER (WHERE priority = 'high' AND completed = false) \
         FROM todos{where_clause}"
    );
    let mut q = query_as::<Postgres, (i64, i64, i64, i64)>(&sql);
    if let Some(email) = user_email {
        q = q.bind(email);
    }
    let (total, completed, pending, high_priority) = q
        .fetch_one(pool)
        .await
        .map_err(|e| storage_error(e, "Failed to compute stats"))?;
    Ok(TodoStats {
        total,
        completed,
        pending,
        high_priority,
    })
}

pub async fn ping(pool: &PgPool) -> Result<(), StorageError> {
    query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| storage_error(e, "Health check failed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use todo_storage::Priority;

    #[test]
    fn test_list_sql_numbers_placeholders() {
        assert_eq!(
            list_sql(&ListParams::new()),
            format!("SELECT {TODO_COLUMNS} FROM todos ORDER BY {LIST_ORDER} LIMIT $1")
        );

        let sql = list_sql(
            &ListParams::new()
                .with_user_email(Some("a@x.com".into()))
                .with_completed(Some(true)),
        );
        assert!(sql.contains("WHERE user_email = $1 AND completed = $2"));
        assert!(sql.ends_with("LIMIT $3"));

        let sql = list_sql(&ListParams::new().with_completed(Some(false)));
        assert!(sql.contains("WHERE completed = $1"));
        assert!(sql.ends_with("LIMIT $2"));
    }

    #[test]
    fn test_update_sql() {
        assert_eq!(update_sql(&TodoPatch::default()), None);

        let sql = update_sql(&TodoPatch {
            title: Some("t".into()),
            priority: Some(Priority::High),
            ..Default::default()
        })
        .unwrap();
        assert!(sql.starts_with(
            "UPDATE todos SET title = $1, priority = $2, updated_at = NOW() WHERE id = $3"
        ));

        let sql = update_sql(&TodoPatch::completed(true)).unwrap();
        assert!(sql.contains("completed = $1, updated_at = NOW() WHERE id = $2"));
    }

    #[test]
    fn test_chrono_to_time() {
        let dt = DateTime::<Utc>::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let converted = chrono_to_time(dt);
        assert_eq!(converted.unix_timestamp(), 1_700_000_000);
        assert_eq!(converted.nanosecond(), 123_456_789);
    }
}
