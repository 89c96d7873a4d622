//! # lakebase-control
//!
//! Client for the Lakebase database control plane and the idempotent
//! provisioner built on top of it.
//!
//! ## Overview
//!
//! - [`ControlPlane`] and [`Identity`] describe the remote operations;
//!   [`WorkspaceClient`] implements both over REST.
//! - [`Provisioner`] converges a project, branch, endpoint and roles to the
//!   desired state. Every step can be re-run safely.
//! - [`DatabaseBootstrap`] creates the application database with bounded
//!   retries once an endpoint is reachable.
//! - [`CredentialProvider`] caches the short-lived tokens used as database
//!   passwords, and [`EndpointResolver`] finds the endpoint that actually
//!   serves a branch.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lakebase_control::{
//!     DatabaseBootstrap, ProvisionOptions, Provisioner, WorkspaceClient, WorkspaceConfig,
//! };
//!
//! let client = Arc::new(WorkspaceClient::new(
//!     WorkspaceConfig::new("https://my-workspace.cloud.databricks.com")
//!         .with_token(Some(token)),
//! )?);
//! let bootstrap = DatabaseBootstrap::new(client.clone(), client.clone(), admin);
//! let provisioner = Provisioner::new(client.clone(), client, bootstrap);
//!
//! let result = provisioner
//!     .provision_all("alice@example.com", &ProvisionOptions::default())
//!     .await?;
//! println!("{}", result.host);
//! ```

pub mod bootstrap;
pub mod client;
pub mod credentials;
mod error;
pub mod names;
pub mod provisioner;
pub mod resolver;
pub mod resources;
pub mod rest;

pub use bootstrap::{
    AdminConnectOptions, AdminError, DatabaseAdmin, DatabaseBootstrap, RetryPolicy,
};
pub use client::{ControlPlane, Identity};
pub use credentials::CredentialProvider;
pub use error::{
    CONFLICTING_RESOURCE_MARKER, ControlPlaneError, ErrorCategory, ProvisionError, Result,
};
pub use names::{BranchPath, FieldMask, dev_branch_id, project_name, role_id_for};
pub use provisioner::{CiOptions, ProvisionOptions, ProvisionResult, Provisioner};
pub use resolver::EndpointResolver;
pub use resources::{
    App, Branch, CurrentUser, DatabaseCredential, Endpoint, EndpointSettings, Project, Role,
    RoleIdentityType,
};
pub use rest::{WorkspaceClient, WorkspaceConfig};
