//! Control-plane resource model.
//!
//! Field names follow the control plane's JSON (snake_case). Every field is
//! optional on the wire: requests send only what they set, responses may
//! omit anything.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Postgres major version requested for new projects.
pub const DEFAULT_PG_VERSION: u32 = 17;

/// A database project, the root of the hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<ProjectSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pg_version: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl Project {
    /// Body of a create request for a project on the default Postgres version.
    pub fn for_create() -> Self {
        Self {
            name: None,
            spec: Some(ProjectSpec {
                pg_version: Some(DEFAULT_PG_VERSION),
                display_name: None,
            }),
        }
    }
}

/// An isolated copy of a project's data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<BranchSpec>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_protected: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_expiry: Option<bool>,
}

impl Branch {
    /// Body of a create request for a branch that never expires.
    pub fn for_create() -> Self {
        Self {
            name: None,
            spec: Some(BranchSpec {
                is_protected: None,
                no_expiry: Some(true),
            }),
        }
    }

    /// Partial body that only sets the protection flag.
    pub fn protection_patch(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            spec: Some(BranchSpec {
                is_protected: Some(true),
                no_expiry: None,
            }),
        }
    }

    pub fn is_protected(&self) -> bool {
        self.spec
            .as_ref()
            .and_then(|spec| spec.is_protected)
            .unwrap_or(false)
    }
}

/// Compute type of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndpointType {
    #[serde(rename = "ENDPOINT_TYPE_READ_WRITE")]
    ReadWrite,
    #[serde(rename = "ENDPOINT_TYPE_READ_ONLY")]
    ReadOnly,
}

/// A compute attachment that makes a branch reachable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<EndpointSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EndpointStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_type: Option<EndpointType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling_limit_min_cu: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling_limit_max_cu: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "proto_duration"
    )]
    pub suspend_timeout_duration: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<EndpointHosts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_state: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointHosts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Sizing of a new endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndpointSettings {
    /// Lower autoscaling bound in compute units.
    pub min_cu: f64,
    /// Upper autoscaling bound in compute units.
    pub max_cu: f64,
    /// Idle time after which the compute may be suspended.
    pub suspend_timeout: Duration,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            min_cu: 0.5,
            max_cu: 2.0,
            suspend_timeout: Duration::from_secs(300),
        }
    }
}

impl Endpoint {
    /// Body of a create request for a read-write endpoint.
    pub fn for_create(settings: &EndpointSettings) -> Self {
        Self {
            name: None,
            spec: Some(EndpointSpec {
                endpoint_type: Some(EndpointType::ReadWrite),
                autoscaling_limit_min_cu: Some(settings.min_cu),
                autoscaling_limit_max_cu: Some(settings.max_cu),
                suspend_timeout_duration: Some(settings.suspend_timeout),
            }),
            status: None,
        }
    }

    /// Resolved network host, if the endpoint is reachable yet.
    pub fn host(&self) -> Option<&str> {
        self.status
            .as_ref()?
            .hosts
            .as_ref()?
            .host
            .as_deref()
            .filter(|host| !host.is_empty())
    }
}

/// Kind of identity bound to a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleIdentityType {
    #[serde(rename = "USER")]
    User,
    #[serde(rename = "SERVICE_PRINCIPAL")]
    ServicePrincipal,
}

/// How a role authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoleAuthMethod {
    #[serde(rename = "LAKEBASE_OAUTH_V1")]
    LakebaseOauthV1,
}

/// Maps an external identity to a Postgres role on a branch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<RoleSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSpec {
    pub postgres_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<RoleIdentityType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_method: Option<RoleAuthMethod>,
}

impl Role {
    /// Body of a create request binding `identity` with OAuth authentication.
    pub fn for_create(identity: impl Into<String>, identity_type: RoleIdentityType) -> Self {
        Self {
            name: None,
            spec: Some(RoleSpec {
                postgres_role: identity.into(),
                identity_type: Some(identity_type),
                auth_method: Some(RoleAuthMethod::LakebaseOauthV1),
            }),
        }
    }
}

/// A short-lived database credential.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseCredential {
    #[serde(default)]
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expire_time: Option<String>,
}

/// The caller's identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    #[serde(rename = "userName", default)]
    pub user_name: String,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// A deployed application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_client_id: Option<String>,
}

/// Durations travel as protobuf JSON strings such as `"300s"`.
mod proto_duration {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) if d.subsec_nanos() == 0 => s.serialize_str(&format!("{}s", d.as_secs())),
            Some(d) => s.serialize_str(&format!("{}s", d.as_secs_f64())),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(d)? else {
            return Ok(None);
        };
        let secs = raw
            .strip_suffix('s')
            .ok_or_else(|| D::Error::custom(format!("duration '{raw}' must end with 's'")))?;
        let secs: f64 = secs
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid duration '{raw}'")))?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(D::Error::custom(format!("invalid duration '{raw}'")));
        }
        Ok(Some(Duration::from_secs_f64(secs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint_create_body() {
        let body = serde_json::to_value(Endpoint::for_create(&EndpointSettings::default())).unwrap();
        assert_eq!(
            body,
            json!({
                "spec": {
                    "endpoint_type": "ENDPOINT_TYPE_READ_WRITE",
                    "autoscaling_limit_min_cu": 0.5,
                    "autoscaling_limit_max_cu": 2.0,
                    "suspend_timeout_duration": "300s"
                }
            })
        );
    }

    #[test]
    fn test_endpoint_host_from_status() {
        let endpoint: Endpoint = serde_json::from_value(json!({
            "name": "projects/p/branches/b/endpoints/e",
            "spec": { "suspend_timeout_duration": "1.5s" },
            "status": { "hosts": { "host": "ep-1.db.example.com" }, "current_state": "ACTIVE" }
        }))
        .unwrap();
        assert_eq!(endpoint.host(), Some("ep-1.db.example.com"));
        assert_eq!(
            endpoint.spec.unwrap().suspend_timeout_duration,
            Some(Duration::from_millis(1500))
        );

        let pending: Endpoint = serde_json::from_value(json!({
            "name": "projects/p/branches/b/endpoints/e",
            "status": { "hosts": { "host": "" } }
        }))
        .unwrap();
        assert_eq!(pending.host(), None);
    }

    #[test]
    fn test_role_create_body() {
        let body = serde_json::to_value(Role::for_create(
            "alice@example.com",
            RoleIdentityType::User,
        ))
        .unwrap();
        assert_eq!(
            body,
            json!({
                "spec": {
                    "postgres_role": "alice@example.com",
                    "identity_type": "USER",
                    "auth_method": "LAKEBASE_OAUTH_V1"
                }
            })
        );
    }

    #[test]
    fn test_branch_protection_patch_only_sets_flag() {
        let body = serde_json::to_value(Branch::protection_patch("projects/p/branches/b")).unwrap();
        assert_eq!(
            body,
            json!({ "name": "projects/p/branches/b", "spec": { "is_protected": true } })
        );
        assert!(!Branch::for_create().is_protected());
    }
}
