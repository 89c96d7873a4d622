//! Idempotent convergence of Lakebase resources.
//!
//! Every `ensure_*` follows the same sequence: fetch by deterministic name,
//! create on not-found, and re-fetch if a concurrent caller won the create.
//! Re-running any workflow is therefore safe.

use std::sync::Arc;

use tracing::{info, warn};

use crate::bootstrap::DatabaseBootstrap;
use crate::client::{ControlPlane, Identity};
use crate::error::ProvisionError;
use crate::names::{BranchPath, FieldMask, project_name, role_id_for};
use crate::resources::{
    Branch, Endpoint, EndpointSettings, Project, Role, RoleIdentityType,
};

/// Field path touched when protecting a branch.
pub const BRANCH_PROTECTION_FIELD: &str = "spec.is_protected";

pub const DEFAULT_PROJECT_ID: &str = "todo-app";
pub const DEFAULT_ENDPOINT_ID: &str = "default";
pub const DEFAULT_DATABASE: &str = "todoapp";
pub const PRODUCTION_BRANCH_ID: &str = "production";

type Result<T> = std::result::Result<T, ProvisionError>;

/// Identifiers of the resources a workflow converges.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionOptions {
    pub project_id: String,
    pub branch_id: String,
    pub endpoint_id: String,
    pub endpoint: EndpointSettings,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            branch_id: PRODUCTION_BRANCH_ID.to_string(),
            endpoint_id: DEFAULT_ENDPOINT_ID.to_string(),
            endpoint: EndpointSettings::default(),
        }
    }
}

impl ProvisionOptions {
    pub fn branch(&self) -> BranchPath {
        BranchPath::new(&self.project_id, &self.branch_id)
    }
}

/// Extra inputs of the CI workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct CiOptions {
    pub resources: ProvisionOptions,
    /// Application database to create.
    pub database: String,
    /// Deployed application whose service principal gets a role.
    pub app_name: Option<String>,
}

impl Default for CiOptions {
    fn default() -> Self {
        Self {
            resources: ProvisionOptions::default(),
            database: DEFAULT_DATABASE.to_string(),
            app_name: None,
        }
    }
}

/// What a workflow converged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionResult {
    pub project_name: String,
    pub branch_name: String,
    /// Name of the endpoint actually serving the branch.
    pub endpoint_name: String,
    /// Resolved host, empty while the endpoint has none.
    pub host: String,
    pub database: String,
}

/// Converges projects, branches, endpoints and roles on the control plane.
pub struct Provisioner {
    control_plane: Arc<dyn ControlPlane>,
    identity: Arc<dyn Identity>,
    bootstrap: DatabaseBootstrap,
}

impl Provisioner {
    pub fn new(
        control_plane: Arc<dyn ControlPlane>,
        identity: Arc<dyn Identity>,
        bootstrap: DatabaseBootstrap,
    ) -> Self {
        Self {
            control_plane,
            identity,
            bootstrap,
        }
    }

    pub fn bootstrap(&self) -> &DatabaseBootstrap {
        &self.bootstrap
    }

    pub async fn ensure_project(&self, project_id: &str) -> Result<Project> {
        let name = project_name(project_id);
        match self.control_plane.get_project(&name).await {
            Ok(project) => {
                info!(project = %name, "project_exists");
                return Ok(project);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        info!(project = %name, "creating_project");
        match self
            .control_plane
            .create_project(project_id, &Project::for_create())
            .await
        {
            Ok(project) => {
                info!(project = project.name.as_deref().unwrap_or(&name), "project_created");
                Ok(project)
            }
            Err(e) if e.is_already_exists() => Ok(self.control_plane.get_project(&name).await?),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn ensure_branch(&self, branch: &BranchPath) -> Result<Branch> {
        let name = branch.name();
        match self.control_plane.get_branch(&name).await {
            Ok(found) => {
                info!(branch = %name, "branch_exists");
                return Ok(found);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        info!(branch = %name, "creating_branch");
        match self
            .control_plane
            .create_branch(&branch.project_name(), branch.branch_id(), &Branch::for_create())
            .await
        {
            Ok(created) => {
                info!(branch = created.name.as_deref().unwrap_or(&name), "branch_created");
                Ok(created)
            }
            Err(e) if e.is_already_exists() => Ok(self.control_plane.get_branch(&name).await?),
            Err(e) => Err(e.into()),
        }
    }

    /// Marks a branch as protected.
    ///
    /// Returns `Ok(None)` when the control plane refuses (for example because
    /// the plan does not allow protected branches); that is not fatal.
    pub async fn protect_branch(&self, branch: &BranchPath) -> Result<Option<Branch>> {
        let name = branch.name();
        let current = self.control_plane.get_branch(&name).await?;
        if current.is_protected() {
            info!(branch = %name, "branch_already_protected");
            return Ok(Some(current));
        }

        info!(branch = %name, "protecting_branch");
        let mask = FieldMask::new([BRANCH_PROTECTION_FIELD]);
        match self
            .control_plane
            .update_branch(&name, &Branch::protection_patch(&name), &mask)
            .await
        {
            Ok(updated) => {
                info!(branch = %name, "branch_protected");
                Ok(Some(updated))
            }
            Err(e) if e.is_bad_request() => {
                warn!(branch = %name, error = %e, category = %e.category(), "branch_protection_failed");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn ensure_endpoint(
        &self,
        branch: &BranchPath,
        endpoint_id: &str,
        settings: &EndpointSettings,
    ) -> Result<Endpoint> {
        let parent = branch.name();
        let name = branch.endpoint_name(endpoint_id);
        match self.control_plane.get_endpoint(&name).await {
            Ok(found) => {
                info!(endpoint = %name, "endpoint_exists");
                return Ok(found);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        info!(endpoint = %name, "creating_endpoint");
        let create_err = match self
            .control_plane
            .create_endpoint(&parent, endpoint_id, &Endpoint::for_create(settings))
            .await
        {
            Ok(created) => {
                info!(endpoint = created.name.as_deref().unwrap_or(&name), "endpoint_created");
                return Ok(created);
            }
            // Some control planes report the other-id conflict as
            // already-exists; the re-fetch then misses and the listing decides.
            Err(e) if e.is_already_exists() => match self.control_plane.get_endpoint(&name).await {
                Ok(found) => return Ok(found),
                Err(refetch) if refetch.is_not_found() => e,
                Err(refetch) => return Err(refetch.into()),
            },
            Err(e) if e.is_conflicting_resource() => e,
            Err(e) => return Err(e.into()),
        };

        // A read-write endpoint already serves this branch under another id,
        // e.g. the one auto-provisioned with the production branch.
        info!(
            expected = %name,
            error = %create_err,
            category = %create_err.category(),
            "endpoint_exists_different_id"
        );
        let existing = self.control_plane.list_endpoints(&parent).await?;
        match existing.into_iter().next() {
            Some(endpoint) => {
                info!(endpoint = endpoint.name.as_deref().unwrap_or_default(), "endpoint_found");
                Ok(endpoint)
            }
            None => Err(create_err.into()),
        }
    }

    /// Lets `identity` authenticate against the branch's databases.
    ///
    /// Returns `Ok(None)` when the control plane reports the mapping already
    /// exists, whether as an already-exists error or a bad request.
    pub async fn ensure_role(
        &self,
        branch: &BranchPath,
        identity: &str,
        identity_type: RoleIdentityType,
    ) -> Result<Option<Role>> {
        let role_id = role_id_for(identity)?;
        let name = branch.role_name(&role_id);
        match self.control_plane.get_role(&name).await {
            Ok(found) => {
                info!(role = %name, "role_exists");
                return Ok(Some(found));
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        info!(role = %name, "creating_role");
        match self
            .control_plane
            .create_role(
                &branch.name(),
                &role_id,
                &Role::for_create(identity, identity_type),
            )
            .await
        {
            Ok(created) => {
                info!(role = created.name.as_deref().unwrap_or(&name), "role_created");
                Ok(Some(created))
            }
            Err(e) if e.is_already_exists() || e.is_bad_request() => {
                info!(role = %name, error = %e, category = %e.category(), "role_already_exists");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Converges project, branch, endpoint and a user role, in that order.
    pub async fn provision_all(
        &self,
        user_email: &str,
        options: &ProvisionOptions,
    ) -> Result<ProvisionResult> {
        let branch = options.branch();
        self.ensure_project(&options.project_id).await?;
        self.ensure_branch(&branch).await?;
        let endpoint = self
            .ensure_endpoint(&branch, &options.endpoint_id, &options.endpoint)
            .await?;
        self.ensure_role(&branch, user_email, RoleIdentityType::User)
            .await?;

        Ok(result_for(&branch, &options.endpoint_id, &endpoint, "postgres"))
    }

    /// CI workflow: converge resources, harden the branch, grant the CI and
    /// application service principals, and create the application database.
    pub async fn provision_ci(&self, options: &CiOptions) -> Result<ProvisionResult> {
        let resources = &options.resources;
        let branch = resources.branch();
        self.ensure_project(&resources.project_id).await?;
        self.ensure_branch(&branch).await?;
        let endpoint = self
            .ensure_endpoint(&branch, &resources.endpoint_id, &resources.endpoint)
            .await?;
        self.protect_branch(&branch).await?;

        if self.identity.client_id().is_some() {
            let me = self.identity.current_user().await?;
            self.ensure_role(&branch, &me.user_name, RoleIdentityType::ServicePrincipal)
                .await?;
        }

        if let Some(app_name) = options.app_name.as_deref() {
            let app = self.identity.get_app(app_name).await?;
            match app.service_principal_client_id.as_deref() {
                Some(client_id) if !client_id.is_empty() => {
                    self.ensure_role(&branch, client_id, RoleIdentityType::ServicePrincipal)
                        .await?;
                }
                _ => warn!(app = app_name, "app_has_no_service_principal"),
            }
        }

        let result = result_for(&branch, &resources.endpoint_id, &endpoint, &options.database);
        self.bootstrap
            .ensure_database(&endpoint, &result.endpoint_name, &options.database)
            .await?;
        Ok(result)
    }
}

fn result_for(
    branch: &BranchPath,
    endpoint_id: &str,
    endpoint: &Endpoint,
    database: &str,
) -> ProvisionResult {
    ProvisionResult {
        project_name: branch.project_name(),
        branch_name: branch.name(),
        endpoint_name: endpoint
            .name
            .clone()
            .unwrap_or_else(|| branch.endpoint_name(endpoint_id)),
        host: endpoint.host().unwrap_or_default().to_string(),
        database: database.to_string(),
    }
}
