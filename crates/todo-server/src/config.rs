use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "todoapp.toml";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Lakebase connection settings
    #[serde(default)]
    pub lakebase: LakebaseSettings,
    /// Fallback identity when no proxy headers are present
    #[serde(default)]
    pub user: UserSettings,
    /// Workspace control plane access
    #[serde(default)]
    pub workspace: WorkspaceSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        if self.storage.backend == StorageBackend::Postgres {
            if self.workspace.host.is_empty() && self.lakebase.host.is_empty() {
                return Err(
                    "storage.backend = \"postgres\" requires workspace.host or lakebase.host".into(),
                );
            }
            if self.lakebase.database.is_empty() {
                return Err("lakebase.database must not be empty".into());
            }
            if self.lakebase.pool_size == 0 {
                return Err("lakebase.pool_size must be > 0".into());
            }
            if self.workspace.host.is_empty() && self.lakebase.user.is_empty() {
                return Err("lakebase.user is required when workspace.host is not set".into());
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_body_limit() -> usize {
    64 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// Where the todo database lives. Empty strings mean "derive it".
#[derive(Clone, Serialize, Deserialize)]
pub struct LakebaseSettings {
    #[serde(default = "default_database")]
    pub database: String,
    /// Postgres role; defaults to the client id or the current user
    #[serde(default)]
    pub user: String,
    /// Static password; defaults to a rotating OAuth token
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_project_id")]
    pub project_id: String,
    /// Defaults to `production` for service principals, else `dev-{user}`
    #[serde(default)]
    pub branch_id: String,
    #[serde(default = "default_endpoint_id")]
    pub endpoint_id: String,
    /// Explicit Postgres host, skipping endpoint discovery
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_database() -> String {
    lakebase_control::provisioner::DEFAULT_DATABASE.into()
}
fn default_project_id() -> String {
    lakebase_control::provisioner::DEFAULT_PROJECT_ID.into()
}
fn default_endpoint_id() -> String {
    lakebase_control::provisioner::DEFAULT_ENDPOINT_ID.into()
}
fn default_pool_size() -> u32 {
    10
}

impl Default for LakebaseSettings {
    fn default() -> Self {
        Self {
            database: default_database(),
            user: String::new(),
            password: String::new(),
            project_id: default_project_id(),
            branch_id: String::new(),
            endpoint_id: default_endpoint_id(),
            host: String::new(),
            pool_size: default_pool_size(),
        }
    }
}

impl std::fmt::Debug for LakebaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LakebaseSettings")
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &mask(&self.password))
            .field("project_id", &self.project_id)
            .field("branch_id", &self.branch_id)
            .field("endpoint_id", &self.endpoint_id)
            .field("host", &self.host)
            .field("pool_size", &self.pool_size)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserSettings {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct WorkspaceSettings {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub client_id: String,
}

impl WorkspaceSettings {
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}

impl std::fmt::Debug for WorkspaceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceSettings")
            .field("host", &self.host)
            .field("token", &mask(&self.token))
            .field("client_id", &self.client_id)
            .finish()
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() { "" } else { "****" }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::{AppConfig, DEFAULT_CONFIG_FILE};
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., TODOAPP__LAKEBASE__BRANCH_ID=dev-alice
        builder = builder.add_source(
            Environment::with_prefix("TODOAPP")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
