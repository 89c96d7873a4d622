mod cli;
mod commands;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::Workspace;
use output::print_error;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let workspace = Workspace::connect(&cli)?;

    match &cli.command {
        Commands::Whoami => commands::whoami::whoami(&workspace).await?,
        Commands::DevSetup(args) => commands::provision::dev_setup(&workspace, args).await?,
        Commands::ProvisionCi(args) => commands::provision::provision_ci(&workspace, args).await?,
        Commands::Migrate(args) => commands::migrate::migrate(&workspace, args).await?,
        Commands::Resolve(args) => commands::resolve::resolve(&workspace, args).await?,
    }
    Ok(())
}
