//! Control-plane and identity traits consumed by the provisioner.
//!
//! The REST implementation lives in [`crate::rest`]. Tests substitute
//! in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::names::FieldMask;
use crate::resources::{
    App, Branch, CurrentUser, DatabaseCredential, Endpoint, Project, Role,
};

/// Resource operations of the database control plane.
///
/// Every `create_*` submits the create and waits for the long-running
/// operation to finish, returning the materialized resource. Failures of the
/// operation surface as the same [`ControlPlaneError`](crate::ControlPlaneError)
/// variants as synchronous failures.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    // ==================== Projects ====================

    async fn get_project(&self, name: &str) -> Result<Project>;

    async fn create_project(&self, project_id: &str, project: &Project) -> Result<Project>;

    // ==================== Branches ====================

    async fn get_branch(&self, name: &str) -> Result<Branch>;

    async fn create_branch(&self, parent: &str, branch_id: &str, branch: &Branch)
    -> Result<Branch>;

    /// Applies a partial update. Only fields named in `update_mask` change.
    async fn update_branch(
        &self,
        name: &str,
        branch: &Branch,
        update_mask: &FieldMask,
    ) -> Result<Branch>;

    // ==================== Endpoints ====================

    async fn get_endpoint(&self, name: &str) -> Result<Endpoint>;

    async fn create_endpoint(
        &self,
        parent: &str,
        endpoint_id: &str,
        endpoint: &Endpoint,
    ) -> Result<Endpoint>;

    async fn list_endpoints(&self, parent: &str) -> Result<Vec<Endpoint>>;

    // ==================== Roles ====================

    async fn get_role(&self, name: &str) -> Result<Role>;

    async fn create_role(&self, parent: &str, role_id: &str, role: &Role) -> Result<Role>;

    async fn list_roles(&self, parent: &str) -> Result<Vec<Role>>;

    // ==================== Credentials ====================

    /// Mints a short-lived credential usable as the database password for
    /// the named endpoint.
    async fn generate_database_credential(&self, endpoint_name: &str)
    -> Result<DatabaseCredential>;
}

/// Who is calling, and lookups of other identities.
#[async_trait]
pub trait Identity: Send + Sync {
    /// The authenticated caller.
    async fn current_user(&self) -> Result<CurrentUser>;

    /// Client id when the caller is a service principal.
    fn client_id(&self) -> Option<String>;

    /// Looks up a deployed application by name.
    async fn get_app(&self, name: &str) -> Result<App>;
}
