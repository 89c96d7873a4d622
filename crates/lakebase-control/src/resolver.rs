//! Resolution of the endpoint a branch is actually served by.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::client::ControlPlane;
use crate::error::Result;
use crate::names::BranchPath;

/// Maps a configured endpoint name to the endpoint that really exists.
///
/// Some branches come with an auto-provisioned endpoint whose id differs
/// from the configured one. Resolved names are memoized for the life of the
/// resolver.
pub struct EndpointResolver {
    control_plane: Arc<dyn ControlPlane>,
    resolved: DashMap<String, String>,
}

impl EndpointResolver {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            resolved: DashMap::new(),
        }
    }

    /// Returns the name of the endpoint serving `branch`.
    ///
    /// Uses `endpoint_id` when it exists, otherwise the first endpoint
    /// listed on the branch. If the branch has none, the original not-found
    /// error is returned.
    pub async fn resolve(&self, branch: &BranchPath, endpoint_id: &str) -> Result<String> {
        let expected = branch.endpoint_name(endpoint_id);
        if let Some(hit) = self.resolved.get(&expected) {
            return Ok(hit.value().clone());
        }

        let resolved = match self.control_plane.get_endpoint(&expected).await {
            Ok(_) => expected.clone(),
            Err(e) if e.is_not_found() => {
                let listed = self.control_plane.list_endpoints(&branch.name()).await?;
                match listed.into_iter().find_map(|ep| ep.name) {
                    Some(name) => {
                        info!(expected = %expected, resolved = %name, "endpoint_resolved_by_listing");
                        name
                    }
                    None => return Err(e),
                }
            }
            Err(e) => return Err(e),
        };

        self.resolved.insert(expected, resolved.clone());
        Ok(resolved)
    }
}
