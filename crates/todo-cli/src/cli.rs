use clap::{Parser, Subcommand};
use lakebase_control::provisioner::{
    DEFAULT_DATABASE, DEFAULT_ENDPOINT_ID, DEFAULT_PROJECT_ID, PRODUCTION_BRANCH_ID,
};

#[derive(Parser, Debug)]
#[command(name = "todoctl")]
#[command(about = "Provision Lakebase infrastructure for the todo app and manage its schema")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace URL
    #[arg(long, global = true, env = "DATABRICKS_HOST")]
    pub host: Option<String>,

    /// Workspace bearer token
    #[arg(long, global = true, env = "DATABRICKS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Client id when running as a service principal
    #[arg(long, global = true, env = "DATABRICKS_CLIENT_ID")]
    pub client_id: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the authenticated identity
    Whoami,
    /// Provision a personal dev branch and migrate its database
    DevSetup(DevSetupArgs),
    /// Provision the production branch, grant service principals, create the database
    ProvisionCi(ProvisionCiArgs),
    /// Apply pending schema migrations
    Migrate(TargetArgs),
    /// Print the endpoint that serves a branch
    Resolve(TargetArgs),
}

#[derive(clap::Args, Debug)]
pub struct DevSetupArgs {
    /// Branch id (default: dev-{username})
    #[arg(long)]
    pub branch: Option<String>,
    /// Lakebase project id
    #[arg(long, default_value = DEFAULT_PROJECT_ID)]
    pub project: String,
    /// Endpoint id
    #[arg(long, default_value = DEFAULT_ENDPOINT_ID)]
    pub endpoint: String,
    /// Application database
    #[arg(long, default_value = DEFAULT_DATABASE)]
    pub database: String,
    /// Skip running migrations
    #[arg(long)]
    pub skip_migrations: bool,
}

#[derive(clap::Args, Debug)]
pub struct ProvisionCiArgs {
    /// Branch id
    #[arg(long, default_value = PRODUCTION_BRANCH_ID)]
    pub branch: String,
    /// Lakebase project id
    #[arg(long, default_value = DEFAULT_PROJECT_ID)]
    pub project: String,
    /// Endpoint id
    #[arg(long, default_value = DEFAULT_ENDPOINT_ID)]
    pub endpoint: String,
    /// Application database
    #[arg(long, default_value = DEFAULT_DATABASE)]
    pub database: String,
    /// Deployed app whose service principal gets a role
    #[arg(long)]
    pub app_name: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    /// Branch id (default: production for service principals, else dev-{username})
    #[arg(long)]
    pub branch: Option<String>,
    /// Lakebase project id
    #[arg(long, default_value = DEFAULT_PROJECT_ID)]
    pub project: String,
    /// Endpoint id
    #[arg(long, default_value = DEFAULT_ENDPOINT_ID)]
    pub endpoint: String,
    /// Application database
    #[arg(long, default_value = DEFAULT_DATABASE)]
    pub database: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_setup_defaults() {
        let cli = Cli::try_parse_from(["todoctl", "dev-setup"]).unwrap();
        let Commands::DevSetup(args) = cli.command else {
            panic!("expected dev-setup");
        };
        assert_eq!(args.branch, None);
        assert_eq!(args.project, "todo-app");
        assert_eq!(args.endpoint, "default");
        assert_eq!(args.database, "todoapp");
        assert!(!args.skip_migrations);
    }

    #[test]
    fn provision_ci_flags() {
        let cli = Cli::try_parse_from([
            "todoctl",
            "provision-ci",
            "--app-name",
            "todo-web",
            "--host",
            "https://ws.example.com",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("https://ws.example.com"));
        let Commands::ProvisionCi(args) = cli.command else {
            panic!("expected provision-ci");
        };
        assert_eq!(args.branch, "production");
        assert_eq!(args.app_name.as_deref(), Some("todo-web"));
    }

    #[test]
    fn target_args() {
        let cli = Cli::try_parse_from(["todoctl", "migrate", "--branch", "dev-alice"]).unwrap();
        let Commands::Migrate(args) = cli.command else {
            panic!("expected migrate");
        };
        assert_eq!(args.branch.as_deref(), Some("dev-alice"));
        assert!(Cli::try_parse_from(["todoctl", "resolve", "--unknown"]).is_err());
    }
}
