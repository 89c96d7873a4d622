use anyhow::{Context, Result};
use lakebase_control::{BranchPath, EndpointResolver};
use todo_db_postgres::{MigrationStatus, PostgresConfig, create_pool, migrations};

use super::Workspace;
use crate::cli::TargetArgs;
use crate::output::{print_field, print_success};

pub async fn migrate(workspace: &Workspace, args: &TargetArgs) -> Result<()> {
    let branch = BranchPath::new(
        &args.project,
        workspace.branch_id(args.branch.as_deref()).await?,
    );
    let endpoint_name = EndpointResolver::new(workspace.control_plane())
        .resolve(&branch, &args.endpoint)
        .await
        .with_context(|| format!("no endpoint serves {branch}"))?;
    run_migrations(workspace, &endpoint_name, &args.database).await
}

/// Applies the embedded migrations to `database` on the endpoint, connecting
/// as the caller with a freshly minted token.
pub async fn run_migrations(workspace: &Workspace, endpoint_name: &str, database: &str) -> Result<()> {
    let control_plane = workspace.control_plane();
    let endpoint = control_plane.get_endpoint(endpoint_name).await?;
    let host = endpoint
        .host()
        .with_context(|| format!("endpoint {endpoint_name} has no host yet"))?;
    let user = workspace.database_user().await?;
    let credential = control_plane
        .generate_database_credential(endpoint_name)
        .await
        .context("failed to generate a database credential")?;

    let config = PostgresConfig::new(host, database)
        .with_user(user)
        .with_pool_size(1);
    let pool = create_pool(&config, config.connect_options().password(&credential.token))
        .await
        .with_context(|| format!("failed to connect to {}", config.redacted_url()))?;

    let before = migrations::migration_status(&pool).await?;
    let outcome = migrations::run(&pool).await;
    pool.close().await;
    outcome?;

    print_field("Database", &config.redacted_url());
    match before {
        MigrationStatus::UpToDate => print_success("Schema already up to date"),
        MigrationStatus::NotInitialized => print_success("Schema initialized"),
        MigrationStatus::Pending(versions) => {
            print_success(&format!("Applied {} migration(s)", versions.len()))
        }
    }
    Ok(())
}
