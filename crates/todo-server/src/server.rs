use std::net::SocketAddr;

use axum::{
    Router,
    extract::FromRef,
    routing::{get, patch},
};
use todo_db_postgres::{MigrationStatus, PgPool, migrations};
use todo_storage::DynStorage;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, StorageBackend};
use crate::handlers;
use crate::lakebase;
use crate::user::UserDefaults;

/// Shared state handed to every handler.
#[derive(Clone, FromRef)]
pub struct AppState {
    pub storage: DynStorage,
    pub user_defaults: UserDefaults,
}

impl AppState {
    pub fn new(storage: DynStorage, user_defaults: UserDefaults) -> Self {
        Self {
            storage,
            user_defaults,
        }
    }
}

pub struct TodoServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/me", get(handlers::me))
        .route(
            "/api/todos",
            get(handlers::list_todos).post(handlers::create_todo),
        )
        .route(
            "/api/todos/{id}",
            get(handlers::get_todo)
                .put(handlers::update_todo)
                .delete(handlers::delete_todo),
        )
        .route("/api/todos/{id}/toggle", patch(handlers::toggle_todo))
        .route("/api/stats", get(handlers::stats))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(
            cfg.server.body_limit_bytes,
        ))
}

/// Logs how the database schema compares to the embedded migrations.
/// Never fails startup.
pub async fn check_migrations(pool: &PgPool) {
    match migrations::migration_status(pool).await {
        Ok(MigrationStatus::NotInitialized) => tracing::warn!(
            hint = "Run 'todoctl migrate' to initialize the database",
            "migrations_not_initialized"
        ),
        Ok(MigrationStatus::Pending(versions)) => tracing::warn!(
            pending = ?versions,
            hint = "Run 'todoctl migrate' to apply pending migrations",
            "migrations_pending"
        ),
        Ok(MigrationStatus::UpToDate) => tracing::info!("migrations_up_to_date"),
        Err(e) => tracing::warn!(error = %e, "migration_check_failed"),
    }
}

/// Storage for the configured backend, plus the pool when it is Postgres.
async fn build_storage(
    cfg: &AppConfig,
) -> anyhow::Result<(DynStorage, UserDefaults, Option<PgPool>)> {
    let client = lakebase::workspace_client(cfg)?;
    let identity = client
        .as_deref()
        .map(|c| c as &dyn lakebase_control::Identity);
    let user_defaults = lakebase::resolve_user_defaults(cfg, identity).await;

    match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage");
            Ok((todo_db_memory::create_storage(), user_defaults, None))
        }
        StorageBackend::Postgres => {
            let resolved = match &client {
                Some(client) => {
                    lakebase::resolve_database(cfg, client.clone(), &**client).await?
                }
                None => lakebase::static_database(cfg),
            };
            let postgres =
                todo_db_postgres::create_storage(&resolved.config, resolved.rotation).await;
            let pool = postgres.pool().clone();
            let storage: DynStorage = postgres;
            Ok((storage, user_defaults, Some(pool)))
        }
    }
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub async fn build(self) -> anyhow::Result<TodoServer> {
        let (storage, user_defaults, pool) = build_storage(&self.config).await?;
        if let Some(pool) = &pool {
            check_migrations(pool).await;
        }

        let app = build_app(AppState::new(storage, user_defaults), &self.config);
        Ok(TodoServer {
            addr: self.addr,
            app,
        })
    }
}

impl TodoServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
