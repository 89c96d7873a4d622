//! End-to-end checks of the PostgreSQL backend against a real server.
//!
//! Needs Docker: `cargo test -p todo-db-postgres -- --ignored`

use lakebase_control::{AdminConnectOptions, AdminError, DatabaseAdmin};
use sqlx_core::query_as::query_as;
use testcontainers::ContainerAsync;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use todo_db_postgres::{
    MigrationStatus, PgDatabaseAdmin, PostgresConfig, PostgresTodoStorage, migrations,
};
use todo_storage::{ListParams, NewTodo, Priority, TodoPatch, TodoStorage};
use uuid::Uuid;

async fn start() -> (ContainerAsync<Postgres>, PostgresConfig) {
    let container = Postgres::default()
        .start()
        .await
        .expect("Failed to start PostgreSQL container");
    let port = container
        .get_host_port_ipv4(5432)
        .await
        .expect("Failed to get port");

    let config = PostgresConfig::new("127.0.0.1", "postgres")
        .with_port(port)
        .with_user("postgres")
        .with_password(Some("postgres".into()))
        .with_require_tls(false);
    (container, config)
}

async fn migrated_storage(config: &PostgresConfig) -> PostgresTodoStorage {
    let storage = PostgresTodoStorage::new(config, None).await;
    migrations::run(storage.pool())
        .await
        .expect("Migrations should succeed");
    storage
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_migrations_run_and_are_idempotent() {
    let (_container, config) = start().await;
    let storage = PostgresTodoStorage::new(&config, None).await;

    assert_eq!(
        migrations::migration_status(storage.pool()).await.unwrap(),
        MigrationStatus::NotInitialized
    );

    migrations::run(storage.pool()).await.unwrap();
    migrations::run(storage.pool()).await.unwrap();

    assert_eq!(
        migrations::migration_status(storage.pool()).await.unwrap(),
        MigrationStatus::UpToDate
    );

    let indexes: Vec<(String,)> =
        query_as("SELECT indexname FROM pg_indexes WHERE tablename = 'todos' ORDER BY indexname")
            .fetch_all(storage.pool())
            .await
            .expect("Failed to query indexes");
    let names: Vec<String> = indexes.into_iter().map(|(name,)| name).collect();
    for index in ["idx_todos_completed", "idx_todos_created_at", "idx_todos_user_email"] {
        assert!(names.contains(&index.to_string()), "missing {index}");
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_crud_round_trip() {
    let (_container, config) = start().await;
    let storage = migrated_storage(&config).await;

    let created = storage
        .create(
            NewTodo::new("Write report")
                .with_description("quarterly")
                .with_priority(Priority::High)
                .with_user_email(Some("alice@example.com".into())),
        )
        .await
        .unwrap();
    assert!(!created.completed);
    assert_eq!(created.created_at, created.updated_at);

    let fetched = storage.get(created.id).await.unwrap().unwrap();
    assert_eq!(fetched, created);

    let unchanged = storage
        .update(created.id, TodoPatch::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.updated_at, created.updated_at);

    let renamed = storage
        .update(
            created.id,
            TodoPatch {
                title: Some("Write final report".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(renamed.title, "Write final report");
    assert_eq!(renamed.description.as_deref(), Some("quarterly"));
    assert!(renamed.updated_at >= created.updated_at);

    let toggled = storage.toggle(created.id).await.unwrap().unwrap();
    assert!(toggled.completed);
    let toggled = storage.toggle(created.id).await.unwrap().unwrap();
    assert!(!toggled.completed);

    assert!(storage.delete(created.id).await.unwrap());
    assert!(!storage.delete(created.id).await.unwrap());
    assert!(storage.get(created.id).await.unwrap().is_none());
    assert!(storage.toggle(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_list_order_filters_and_stats() {
    let (_container, config) = start().await;
    let storage = migrated_storage(&config).await;
    let alice = Some("alice@example.com".to_string());

    let low = storage
        .create(NewTodo::new("low").with_priority(Priority::Low).with_user_email(alice.clone()))
        .await
        .unwrap();
    let high = storage
        .create(NewTodo::new("high").with_priority(Priority::High).with_user_email(alice.clone()))
        .await
        .unwrap();
    let done = storage
        .create(NewTodo::new("done").with_priority(Priority::High).with_user_email(alice.clone()))
        .await
        .unwrap();
    storage.toggle(done.id).await.unwrap();
    storage
        .create(NewTodo::new("bob's").with_user_email(Some("bob@example.com".into())))
        .await
        .unwrap();

    let listed = storage
        .list(&ListParams::new().with_user_email(alice.clone()))
        .await
        .unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![high.id, low.id, done.id]);

    let pending = storage
        .list(
            &ListParams::new()
                .with_user_email(alice.clone())
                .with_completed(Some(false)),
        )
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);

    let limited = storage.list(&ListParams::new().with_limit(1)).await.unwrap();
    assert_eq!(limited.len(), 1);

    let stats = storage.stats(alice.as_deref()).await.unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 2);
    assert_eq!(stats.high_priority, 1);

    assert_eq!(storage.stats(None).await.unwrap().total, 4);
    assert!(storage.health_check().await);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_database_is_idempotent() {
    let (_container, config) = start().await;
    let mut options = AdminConnectOptions::control("127.0.0.1", "postgres", "postgres");
    options.port = config.port;
    options.require_tls = false;

    let admin = PgDatabaseAdmin::new();
    admin.create_database(&options, "todoapp").await.unwrap();
    assert_eq!(
        admin.create_database(&options, "todoapp").await,
        Err(AdminError::DuplicateDatabase)
    );
}
