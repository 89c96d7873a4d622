use anyhow::{Context, Result};
use lakebase_control::{BranchPath, EndpointResolver};

use super::Workspace;
use crate::cli::TargetArgs;
use crate::output::print_field;

pub async fn resolve(workspace: &Workspace, args: &TargetArgs) -> Result<()> {
    let branch = BranchPath::new(
        &args.project,
        workspace.branch_id(args.branch.as_deref()).await?,
    );
    let endpoint_name = EndpointResolver::new(workspace.control_plane())
        .resolve(&branch, &args.endpoint)
        .await
        .with_context(|| format!("no endpoint serves {branch}"))?;
    let endpoint = workspace
        .control_plane()
        .get_endpoint(&endpoint_name)
        .await?;

    print_field("Branch", &branch.name());
    print_field("Endpoint", &endpoint_name);
    print_field("Host", endpoint.host().unwrap_or("(not ready)"));
    Ok(())
}
