//! Resolves where and as whom the server connects to Lakebase.
//!
//! Anything left empty in `[lakebase]` is derived from the workspace
//! identity: the branch, the endpoint actually serving it, its host, the
//! Postgres role, and a rotating OAuth token as the password.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use lakebase_control::provisioner::PRODUCTION_BRANCH_ID;
use lakebase_control::{
    BranchPath, ControlPlane, CredentialProvider, EndpointResolver, Identity, WorkspaceClient,
    WorkspaceConfig, dev_branch_id,
};
use todo_db_postgres::{PostgresConfig, RotatingPassword};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::user::UserDefaults;

/// Connection settings for the todo database.
pub struct ResolvedDatabase {
    pub config: PostgresConfig,
    pub rotation: Option<RotatingPassword>,
}

/// Builds the control plane client from `[workspace]`, if configured.
pub fn workspace_client(cfg: &AppConfig) -> anyhow::Result<Option<Arc<WorkspaceClient>>> {
    if !cfg.workspace.is_configured() {
        return Ok(None);
    }
    let client = WorkspaceClient::new(
        WorkspaceConfig::new(&cfg.workspace.host)
            .with_token(Some(cfg.workspace.token.clone()))
            .with_client_id(Some(cfg.workspace.client_id.clone())),
    )
    .context("invalid workspace settings")?;
    Ok(Some(Arc::new(client)))
}

/// Explicit branch, else `production` for service principals, else the
/// caller's dev branch.
pub async fn resolve_branch_id(explicit: &str, identity: &dyn Identity) -> anyhow::Result<String> {
    if !explicit.is_empty() {
        return Ok(explicit.to_string());
    }
    if identity.client_id().is_some() {
        return Ok(PRODUCTION_BRANCH_ID.to_string());
    }
    let me = identity
        .current_user()
        .await
        .context("failed to look up the current user")?;
    Ok(dev_branch_id(&me.user_name))
}

/// Explicit role, else the client id, else the caller's user name.
pub async fn resolve_db_user(explicit: &str, identity: &dyn Identity) -> anyhow::Result<String> {
    if !explicit.is_empty() {
        return Ok(explicit.to_string());
    }
    if let Some(client_id) = identity.client_id() {
        return Ok(client_id);
    }
    let me = identity
        .current_user()
        .await
        .context("failed to look up the current user")?;
    Ok(me.user_name)
}

/// Configured identity, filled in from the workspace user where empty.
pub async fn resolve_user_defaults(cfg: &AppConfig, identity: Option<&dyn Identity>) -> UserDefaults {
    let mut defaults = UserDefaults::new(&cfg.user.email, &cfg.user.name);
    if defaults.email.is_some() && defaults.name.is_some() {
        return defaults;
    }
    let Some(identity) = identity else {
        return defaults;
    };
    match identity.current_user().await {
        Ok(me) => {
            if defaults.email.is_none() && !me.user_name.is_empty() {
                defaults.email = Some(me.user_name);
            }
            if defaults.name.is_none() {
                defaults.name = me.display_name.filter(|n| !n.is_empty());
            }
        }
        Err(e) => warn!(error = %e, "current_user_lookup_failed"),
    }
    defaults
}

/// Resolves the database connection against the control plane.
pub async fn resolve_database(
    cfg: &AppConfig,
    control_plane: Arc<dyn ControlPlane>,
    identity: &dyn Identity,
) -> anyhow::Result<ResolvedDatabase> {
    let settings = &cfg.lakebase;
    let branch_id = resolve_branch_id(&settings.branch_id, identity).await?;
    let branch = BranchPath::new(&settings.project_id, branch_id);

    let endpoint_name = EndpointResolver::new(control_plane.clone())
        .resolve(&branch, &settings.endpoint_id)
        .await
        .with_context(|| format!("failed to resolve an endpoint on {branch}"))?;

    let host = if settings.host.is_empty() {
        let endpoint = control_plane
            .get_endpoint(&endpoint_name)
            .await
            .with_context(|| format!("failed to read endpoint {endpoint_name}"))?;
        endpoint
            .host()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("endpoint {endpoint_name} has no host yet"))?
    } else {
        settings.host.clone()
    };
    let user = resolve_db_user(&settings.user, identity).await?;

    let config = postgres_config(cfg, host, user);
    let rotation = config.password.is_none().then(|| {
        RotatingPassword::new(
            Arc::new(CredentialProvider::new(control_plane)),
            endpoint_name.clone(),
        )
    });

    info!(
        endpoint = %endpoint_name,
        host = %config.host,
        user = %config.user,
        database = %config.database,
        rotating_password = rotation.is_some(),
        "lakebase_connection_resolved"
    );
    Ok(ResolvedDatabase { config, rotation })
}

/// Connection settings taken from `[lakebase]` alone.
pub fn static_database(cfg: &AppConfig) -> ResolvedDatabase {
    let config = postgres_config(cfg, cfg.lakebase.host.clone(), cfg.lakebase.user.clone());
    ResolvedDatabase {
        config,
        rotation: None,
    }
}

fn postgres_config(cfg: &AppConfig, host: String, user: String) -> PostgresConfig {
    PostgresConfig::new(host, &cfg.lakebase.database)
        .with_user(user)
        .with_password(Some(cfg.lakebase.password.clone()))
        .with_pool_size(cfg.lakebase.pool_size)
}
