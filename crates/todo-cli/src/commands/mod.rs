pub mod migrate;
pub mod provision;
pub mod resolve;
pub mod whoami;

use std::sync::Arc;

use anyhow::{Context, Result};
use lakebase_control::provisioner::PRODUCTION_BRANCH_ID;
use lakebase_control::{
    ControlPlane, DatabaseBootstrap, Identity, Provisioner, WorkspaceClient, WorkspaceConfig,
    dev_branch_id,
};
use todo_db_postgres::PgDatabaseAdmin;

use crate::cli::Cli;

/// The control plane reached through the global connection flags.
pub struct Workspace {
    client: Arc<WorkspaceClient>,
}

impl Workspace {
    pub fn connect(cli: &Cli) -> Result<Self> {
        let host = cli
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .context("workspace URL missing: pass --host or set DATABRICKS_HOST")?;
        tracing::debug!(host, service_principal = cli.client_id.is_some(), "workspace_connect");
        let client = WorkspaceClient::new(
            WorkspaceConfig::new(host)
                .with_token(cli.token.clone())
                .with_client_id(cli.client_id.clone()),
        )?;
        Ok(Self {
            client: Arc::new(client),
        })
    }

    pub fn control_plane(&self) -> Arc<dyn ControlPlane> {
        self.client.clone()
    }

    pub fn identity(&self) -> Arc<dyn Identity> {
        self.client.clone()
    }

    pub fn provisioner(&self) -> Provisioner {
        let bootstrap = DatabaseBootstrap::new(
            self.control_plane(),
            self.identity(),
            Arc::new(PgDatabaseAdmin::new()),
        );
        Provisioner::new(self.control_plane(), self.identity(), bootstrap)
    }

    /// Explicit branch, else `production` for service principals, else the
    /// caller's dev branch.
    pub async fn branch_id(&self, explicit: Option<&str>) -> Result<String> {
        if let Some(branch) = explicit.filter(|b| !b.is_empty()) {
            return Ok(branch.to_string());
        }
        if self.client.client_id().is_some() {
            return Ok(PRODUCTION_BRANCH_ID.to_string());
        }
        Ok(dev_branch_id(&self.user_name().await?))
    }

    /// Postgres role of the caller: the client id or the user name.
    pub async fn database_user(&self) -> Result<String> {
        match self.client.client_id() {
            Some(client_id) => Ok(client_id),
            None => self.user_name().await,
        }
    }

    pub async fn user_name(&self) -> Result<String> {
        let me = self
            .client
            .current_user()
            .await
            .context("authentication failed; check --host and --token")?;
        Ok(me.user_name)
    }
}
