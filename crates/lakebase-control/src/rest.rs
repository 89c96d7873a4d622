//! REST implementation of [`ControlPlane`] and [`Identity`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::time::Instant;
use tracing::debug;
use url::Url;

use crate::client::{ControlPlane, Identity};
use crate::error::{ControlPlaneError, Result};
use crate::names::FieldMask;
use crate::resources::{
    App, Branch, CurrentUser, DatabaseCredential, Endpoint, Project, Role,
};

const POSTGRES_API: &str = "api/2.0/postgres";
const SCIM_ME: &str = "api/2.0/preview/scim/v2/Me";
const APPS_API: &str = "api/2.0/apps";

/// Connection settings for the workspace control plane.
#[derive(Debug, Clone)]
pub struct WorkspaceConfig {
    /// Workspace base URL, e.g. `https://my-workspace.cloud.databricks.com`.
    pub host: String,
    /// Bearer token. Acquiring it is outside this crate.
    pub token: Option<String>,
    /// Client id when authenticating as a service principal.
    pub client_id: Option<String>,
    /// Delay between polls of a long-running operation.
    pub poll_interval: Duration,
    /// Upper bound on waiting for a long-running operation.
    pub operation_timeout: Duration,
}

impl WorkspaceConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            token: None,
            client_id: None,
            poll_interval: Duration::from_secs(2),
            operation_timeout: Duration::from_secs(20 * 60),
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    #[must_use]
    pub fn with_client_id(mut self, client_id: Option<String>) -> Self {
        self.client_id = client_id.filter(|c| !c.is_empty());
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }
}

/// HTTP client for the workspace control plane.
pub struct WorkspaceClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    client_id: Option<String>,
    poll_interval: Duration,
    operation_timeout: Duration,
}

/// Long-running operation handle as returned by create and update calls.
#[derive(Debug, Default, Deserialize)]
struct Operation {
    #[serde(default)]
    name: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<ErrorBody>,
    #[serde(default)]
    response: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl WorkspaceClient {
    pub fn new(config: WorkspaceConfig) -> Result<Self> {
        let parsed = Url::parse(&config.host).map_err(|e| {
            ControlPlaneError::config(format!("invalid workspace host '{}': {e}", config.host))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ControlPlaneError::config(format!(
                "workspace host must be http(s), got '{}'",
                config.host
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: config.host.trim_end_matches('/').to_string(),
            token: config.token,
            client_id: config.client_id,
            poll_interval: config.poll_interval,
            operation_timeout: config.operation_timeout,
        })
    }

    fn postgres_url(&self, path: &str) -> String {
        format!("{}/{POSTGRES_API}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let req = self.http.request(method, url);
        let req = match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        };
        req.header("Accept", "application/json")
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let resp = self
            .request(Method::GET, url)
            .query(query)
            .send()
            .await?;
        let body = handle_response(resp).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn get_resource<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.get_json(&self.postgres_url(name), &[]).await
    }

    /// Submits a create under `collection` and waits for the operation.
    async fn create_resource<T: DeserializeOwned>(
        &self,
        collection: &str,
        id_param: &str,
        id: &str,
        body: Value,
    ) -> Result<T> {
        let resp = self
            .request(Method::POST, &self.postgres_url(collection))
            .query(&[(id_param, id)])
            .json(&body)
            .send()
            .await?;
        let op: Operation = serde_json::from_value(handle_response(resp).await?)?;
        self.wait(op).await
    }

    async fn list_resources<T: DeserializeOwned>(&self, parent: &str, field: &str) -> Result<Vec<T>> {
        let url = self.postgres_url(&format!("{parent}/{field}"));
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut query: Vec<(&str, &str)> = Vec::new();
            if let Some(token) = page_token.as_deref() {
                query.push(("page_token", token));
            }
            let page: Value = self.get_json(&url, &query).await?;
            if let Some(entries) = page.get(field) {
                let batch: Vec<T> = serde_json::from_value(entries.clone())?;
                items.extend(batch);
            }
            page_token = page
                .get("next_page_token")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                return Ok(items);
            }
        }
    }

    /// Polls a long-running operation until it is done.
    async fn wait<T: DeserializeOwned>(&self, mut op: Operation) -> Result<T> {
        let started = Instant::now();
        loop {
            if op.done {
                if let Some(err) = op.error {
                    let code = err.error_code.unwrap_or_default();
                    let message = err.message.unwrap_or_default();
                    return Err(match ControlPlaneError::classify(None, &code, message) {
                        ControlPlaneError::OperationFailed { message, .. } => {
                            ControlPlaneError::OperationFailed {
                                name: op.name,
                                message,
                            }
                        }
                        other => other,
                    });
                }
                let response = op.response.unwrap_or(Value::Null);
                return Ok(serde_json::from_value(response)?);
            }
            if op.name.is_empty() {
                return Err(ControlPlaneError::config(
                    "control plane returned an unfinished operation without a name",
                ));
            }
            if started.elapsed() >= self.operation_timeout {
                return Err(ControlPlaneError::OperationTimeout {
                    name: op.name,
                    timeout: self.operation_timeout,
                });
            }
            debug!(operation = %op.name, "waiting_for_operation");
            tokio::time::sleep(self.poll_interval).await;
            op = self.get_resource(&op.name).await?;
        }
    }
}

#[async_trait]
impl ControlPlane for WorkspaceClient {
    async fn get_project(&self, name: &str) -> Result<Project> {
        self.get_resource(name).await
    }

    async fn create_project(&self, project_id: &str, project: &Project) -> Result<Project> {
        self.create_resource("projects", "project_id", project_id, serde_json::to_value(project)?)
            .await
    }

    async fn get_branch(&self, name: &str) -> Result<Branch> {
        self.get_resource(name).await
    }

    async fn create_branch(
        &self,
        parent: &str,
        branch_id: &str,
        branch: &Branch,
    ) -> Result<Branch> {
        self.create_resource(
            &format!("{parent}/branches"),
            "branch_id",
            branch_id,
            serde_json::to_value(branch)?,
        )
        .await
    }

    async fn update_branch(
        &self,
        name: &str,
        branch: &Branch,
        update_mask: &FieldMask,
    ) -> Result<Branch> {
        // The mask goes on the query string verbatim.
        let mask = update_mask.to_query_value();
        let resp = self
            .request(Method::PATCH, &self.postgres_url(name))
            .query(&[("update_mask", mask.as_str())])
            .json(branch)
            .send()
            .await?;
        let op: Operation = serde_json::from_value(handle_response(resp).await?)?;
        self.wait(op).await
    }

    async fn get_endpoint(&self, name: &str) -> Result<Endpoint> {
        self.get_resource(name).await
    }

    async fn create_endpoint(
        &self,
        parent: &str,
        endpoint_id: &str,
        endpoint: &Endpoint,
    ) -> Result<Endpoint> {
        self.create_resource(
            &format!("{parent}/endpoints"),
            "endpoint_id",
            endpoint_id,
            serde_json::to_value(endpoint)?,
        )
        .await
    }

    async fn list_endpoints(&self, parent: &str) -> Result<Vec<Endpoint>> {
        self.list_resources(parent, "endpoints").await
    }

    async fn get_role(&self, name: &str) -> Result<Role> {
        self.get_resource(name).await
    }

    async fn create_role(&self, parent: &str, role_id: &str, role: &Role) -> Result<Role> {
        self.create_resource(
            &format!("{parent}/roles"),
            "role_id",
            role_id,
            serde_json::to_value(role)?,
        )
        .await
    }

    async fn list_roles(&self, parent: &str) -> Result<Vec<Role>> {
        self.list_resources(parent, "roles").await
    }

    async fn generate_database_credential(
        &self,
        endpoint_name: &str,
    ) -> Result<DatabaseCredential> {
        let resp = self
            .request(Method::POST, &self.postgres_url("credentials"))
            .json(&json!({ "endpoint": endpoint_name }))
            .send()
            .await?;
        Ok(serde_json::from_value(handle_response(resp).await?)?)
    }
}

#[async_trait]
impl Identity for WorkspaceClient {
    async fn current_user(&self) -> Result<CurrentUser> {
        self.get_json(&format!("{}/{SCIM_ME}", self.base_url), &[])
            .await
    }

    fn client_id(&self) -> Option<String> {
        self.client_id.clone()
    }

    async fn get_app(&self, name: &str) -> Result<App> {
        self.get_json(&format!("{}/{APPS_API}/{name}", self.base_url), &[])
            .await
    }
}

async fn handle_response(resp: reqwest::Response) -> Result<Value> {
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        let message = parsed.message.unwrap_or(body);
        let code = parsed.error_code.unwrap_or_default();
        return Err(ControlPlaneError::classify(
            Some(status.as_u16()),
            &code,
            message,
        ));
    }

    if body.is_empty() {
        return Ok(Value::Null);
    }

    Ok(serde_json::from_str(&body)?)
}
