use anyhow::{Context, Result};
use lakebase_control::provisioner::{DEFAULT_ENDPOINT_ID, DEFAULT_PROJECT_ID};
use lakebase_control::{CiOptions, ProvisionOptions, dev_branch_id};

use super::Workspace;
use super::migrate::run_migrations;
use crate::cli::{DevSetupArgs, ProvisionCiArgs};
use crate::output::{print_field, print_step, print_success, summary_table};

pub async fn dev_setup(workspace: &Workspace, args: &DevSetupArgs) -> Result<()> {
    print_step("Validating workspace authentication...");
    let user_name = workspace.user_name().await?;
    print_field("Authenticated as", &user_name);

    let default_branch = dev_branch_id(&user_name);
    let options = ProvisionOptions {
        project_id: args.project.clone(),
        branch_id: args
            .branch
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| default_branch.clone()),
        endpoint_id: args.endpoint.clone(),
        ..Default::default()
    };

    print_step(&format!(
        "Provisioning Lakebase: {}/{}/{}",
        options.project_id, options.branch_id, options.endpoint_id
    ));
    let provisioner = workspace.provisioner();
    let mut result = provisioner.provision_all(&user_name, &options).await?;

    let endpoint = workspace
        .control_plane()
        .get_endpoint(&result.endpoint_name)
        .await?;
    provisioner
        .bootstrap()
        .ensure_database(&endpoint, &result.endpoint_name, &args.database)
        .await
        .with_context(|| format!("failed to create database {}", args.database))?;
    result.database = args.database.clone();

    if args.skip_migrations {
        print_step("Skipping migrations (--skip-migrations)");
    } else {
        print_step("Running migrations...");
        run_migrations(workspace, &result.endpoint_name, &args.database).await?;
    }

    print_step("Setup complete!");
    println!("{}", summary_table(&result));

    let env = server_env(&options, &default_branch, &args.database);
    println!("\nStart the server:");
    println!("  {}cargo run -p todo-server", env_prefix(&env));
    Ok(())
}

pub async fn provision_ci(workspace: &Workspace, args: &ProvisionCiArgs) -> Result<()> {
    let options = CiOptions {
        resources: ProvisionOptions {
            project_id: args.project.clone(),
            branch_id: args.branch.clone(),
            endpoint_id: args.endpoint.clone(),
            ..Default::default()
        },
        database: args.database.clone(),
        app_name: args.app_name.clone().filter(|a| !a.is_empty()),
    };

    print_step(&format!(
        "Provisioning Lakebase for CI: {}/{}/{}",
        args.project, args.branch, args.endpoint
    ));
    let result = workspace.provisioner().provision_ci(&options).await?;

    print_success("Infrastructure converged");
    println!("{}", summary_table(&result));
    Ok(())
}

/// Server environment overrides for settings that differ from what the
/// server would derive on its own.
fn server_env(options: &ProvisionOptions, default_branch: &str, database: &str) -> Vec<(String, String)> {
    let mut env = Vec::new();
    if options.project_id != DEFAULT_PROJECT_ID {
        env.push(("TODOAPP__LAKEBASE__PROJECT_ID".to_string(), options.project_id.clone()));
    }
    if options.branch_id != default_branch {
        env.push(("TODOAPP__LAKEBASE__BRANCH_ID".to_string(), options.branch_id.clone()));
    }
    if options.endpoint_id != DEFAULT_ENDPOINT_ID {
        env.push(("TODOAPP__LAKEBASE__ENDPOINT_ID".to_string(), options.endpoint_id.clone()));
    }
    if database != lakebase_control::provisioner::DEFAULT_DATABASE {
        env.push(("TODOAPP__LAKEBASE__DATABASE".to_string(), database.to_string()));
    }
    env
}

fn env_prefix(env: &[(String, String)]) -> String {
    env.iter().map(|(k, v)| format!("{k}={v} ")).collect()
}
