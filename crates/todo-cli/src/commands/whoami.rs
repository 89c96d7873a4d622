use anyhow::{Context, Result};
use lakebase_control::{Identity, dev_branch_id};

use super::Workspace;
use crate::output::print_field;

pub async fn whoami(workspace: &Workspace) -> Result<()> {
    let identity = workspace.identity();
    let me = identity
        .current_user()
        .await
        .context("authentication failed; check --host and --token")?;

    print_field("User", &me.user_name);
    if let Some(display_name) = me.display_name.as_deref() {
        print_field("Name", display_name);
    }
    match identity.client_id() {
        Some(client_id) => {
            print_field("Kind", "service principal");
            print_field("Client ID", &client_id);
        }
        None => {
            print_field("Kind", "user");
            print_field("Dev branch", &dev_branch_id(&me.user_name));
        }
    }
    Ok(())
}
