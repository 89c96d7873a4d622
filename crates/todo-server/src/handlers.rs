use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use todo_storage::{DynStorage, ListParams, NewTodo, Todo, TodoPatch, TodoStats};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::user::RequestUser;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    database: &'static str,
}

#[derive(Serialize)]
pub struct MeResponse {
    email: Option<String>,
    name: Option<String>,
    display_name: String,
    is_authenticated: bool,
}

#[derive(Serialize)]
pub struct TodoListResponse {
    todos: Vec<Todo>,
    total: usize,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    completed: Option<bool>,
    limit: Option<i64>,
}

/// Unknown and malformed ids are both reported as a missing todo.
fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::todo_not_found())
}

pub async fn health(State(storage): State<DynStorage>) -> impl IntoResponse {
    let database = if storage.health_check().await {
        "connected"
    } else {
        "disconnected"
    };
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

pub async fn me(user: RequestUser) -> impl IntoResponse {
    Json(MeResponse {
        display_name: user.display_name(),
        is_authenticated: user.is_authenticated(),
        email: user.email,
        name: user.name,
    })
}

pub async fn create_todo(
    State(storage): State<DynStorage>,
    user: RequestUser,
    payload: Result<Json<NewTodo>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(new_todo) = payload?;
    let todo = storage.create(new_todo.with_user_email(user.email)).await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

pub async fn list_todos(
    State(storage): State<DynStorage>,
    user: RequestUser,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> ApiResult<Json<TodoListResponse>> {
    let Query(query) = query?;
    let mut params = ListParams::new()
        .with_user_email(user.email)
        .with_completed(query.completed);
    if let Some(limit) = query.limit {
        if limit < 0 {
            return Err(ApiError::Unprocessable("limit must not be negative".into()));
        }
        params = params.with_limit(limit);
    }

    let todos = storage.list(&params).await?;
    Ok(Json(TodoListResponse {
        total: todos.len(),
        todos,
    }))
}

pub async fn get_todo(
    State(storage): State<DynStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Todo>> {
    let todo = storage
        .get(parse_id(&id)?)
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    Ok(Json(todo))
}

pub async fn update_todo(
    State(storage): State<DynStorage>,
    Path(id): Path<String>,
    payload: Result<Json<TodoPatch>, JsonRejection>,
) -> ApiResult<Json<Todo>> {
    let id = parse_id(&id)?;
    let Json(patch) = payload?;
    let todo = storage
        .update(id, patch)
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    Ok(Json(todo))
}

pub async fn toggle_todo(
    State(storage): State<DynStorage>,
    Path(id): Path<String>,
) -> ApiResult<Json<Todo>> {
    let todo = storage
        .toggle(parse_id(&id)?)
        .await?
        .ok_or_else(ApiError::todo_not_found)?;
    Ok(Json(todo))
}

pub async fn delete_todo(
    State(storage): State<DynStorage>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if storage.delete(parse_id(&id)?).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::todo_not_found())
    }
}

pub async fn stats(
    State(storage): State<DynStorage>,
    user: RequestUser,
) -> ApiResult<Json<TodoStats>> {
    Ok(Json(storage.stats(user.email.as_deref()).await?))
}
