//! PostgreSQL implementation of the TodoStorage trait.

use std::sync::Arc;

use async_trait::async_trait;
use lakebase_control::CredentialProvider;
use sqlx_postgres::{PgConnectOptions, PgPool};
use todo_storage::{ListParams, NewTodo, StorageError, Todo, TodoPatch, TodoStats, TodoStorage};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::PostgresConfig;
use crate::pool;
use crate::queries::crud;

/// Short-lived tokens used as the connection password for an endpoint.
#[derive(Clone)]
pub struct RotatingPassword {
    pub provider: Arc<CredentialProvider>,
    pub endpoint_name: String,
}

impl RotatingPassword {
    pub fn new(provider: Arc<CredentialProvider>, endpoint_name: impl Into<String>) -> Self {
        Self {
            provider,
            endpoint_name: endpoint_name.into(),
        }
    }
}

/// Picks the connection password: a static password wins over a token.
fn resolve_password(static_password: Option<&str>, token: Option<String>) -> Option<String> {
    static_password.map(str::to_string).or(token)
}

/// PostgreSQL storage backend for todos.
///
/// When built with a [`RotatingPassword`] and no static password, the pool's
/// connect options are refreshed before every operation, so new connections
/// always authenticate with a current token. Existing connections keep the
/// token they were opened with until `max_lifetime` retires them.
pub struct PostgresTodoStorage {
    pool: PgPool,
    base_options: PgConnectOptions,
    rotation: Option<RotatingPassword>,
    current_password: Mutex<Option<String>>,
}

impl PostgresTodoStorage {
    /// Creates a storage over a lazily connecting pool.
    ///
    /// Never fails on an unreachable database; the first operation or the
    /// health check reports it instead.
    pub async fn new(config: &PostgresConfig, rotation: Option<RotatingPassword>) -> Self {
        let base_options = config.connect_options();
        let token = match (&config.password, &rotation) {
            (None, Some(rotation)) => {
                rotation
                    .provider
                    .get_token(&rotation.endpoint_name, false)
                    .await
            }
            _ => None,
        };
        let password = resolve_password(config.password.as_deref(), token);

        let options = match &password {
            Some(password) => base_options.clone().password(password),
            None => base_options.clone(),
        };
        let pool = pool::create_lazy_pool(config, options);

        Self {
            pool,
            base_options,
            rotation: rotation.filter(|_| config.password.is_none()),
            current_password: Mutex::new(password),
        }
    }

    /// Creates a storage from an existing pool. No credential rotation.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        let base_options = (*pool.connect_options()).clone();
        Self {
            pool,
            base_options,
            rotation: None,
            current_password: Mutex::new(None),
        }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Swaps in a newer token for connections opened from now on.
    async fn refresh_credentials(&self) {
        let Some(rotation) = &self.rotation else {
            return;
        };
        let Some(token) = rotation
            .provider
            .get_token(&rotation.endpoint_name, false)
            .await
        else {
            return;
        };

        let mut current = self.current_password.lock().await;
        if current.as_deref() != Some(token.as_str()) {
            debug!(endpoint = %rotation.endpoint_name, "rotating_database_password");
            self.pool
                .set_connect_options(self.base_options.clone().password(&token));
            *current = Some(token);
        }
    }

    /// Drops the cached token after a connection failure so the next
    /// operation mints a new one.
    fn on_error(&self, err: &StorageError) {
        if let (Some(rotation), StorageError::ConnectionError { .. }) = (&self.rotation, err) {
            warn!(endpoint = %rotation.endpoint_name, error = %err, "invalidating_database_token");
            rotation.provider.invalidate();
        }
    }

    fn track<T>(&self, result: Result<T, StorageError>) -> Result<T, StorageError> {
        if let Err(err) = &result {
            self.on_error(err);
        }
        result
    }
}

impl std::fmt::Debug for PostgresTodoStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTodoStorage")
            .field("pool_size", &self.pool.size())
            .field(
                "rotating_endpoint",
                &self.rotation.as_ref().map(|r| r.endpoint_name.as_str()),
            )
            .finish()
    }
}

#[async_trait]
impl TodoStorage for PostgresTodoStorage {
    async fn create(&self, todo: NewTodo) -> Result<Todo, StorageError> {
        todo.validate()?;
        self.refresh_credentials().await;
        self.track(crud::create(&self.pool, &todo).await)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Todo>, StorageError> {
        self.refresh_credentials().await;
        self.track(crud::get(&self.pool, id).await)
    }

    async fn list(&self, params: &ListParams) -> Result<Vec<Todo>, StorageError> {
        self.refresh_credentials().await;
        self.track(crud::list(&self.pool, params).await)
    }

    async fn update(&self, id: Uuid, patch: TodoPatch) -> Result<Option<Todo>, StorageError> {
        patch.validate()?;
        self.refresh_credentials().await;
        self.track(crud::update(&self.pool, id, &patch).await)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StorageError> {
        self.refresh_credentials().await;
        self.track(crud::delete(&self.pool, id).await)
    }

    async fn stats(&self, user_email: Option<&str>) -> Result<TodoStats, StorageError> {
        self.refresh_credentials().await;
        self.track(crud::stats(&self.pool, user_email).await)
    }

    async fn health_check(&self) -> bool {
        self.refresh_credentials().await;
        match self.track(crud::ping(&self.pool).await) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "database_health_check_failed");
                false
            }
        }
    }
}
