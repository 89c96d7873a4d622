//! Deterministic resource names, identifier normalization and field masks.
//!
//! Every name is derived from identifiers alone, so repeating a call always
//! addresses the same resource.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ProvisionError;

/// Pattern the control plane enforces for role identifiers.
pub const ROLE_ID_PATTERN: &str = r"^[a-z]([a-z0-9-]{0,61}[a-z0-9])?$";

/// Prefix added to identities that do not start with a letter.
pub const NON_ALPHA_ROLE_PREFIX: &str = "sp-";

static ROLE_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ROLE_ID_PATTERN).expect("valid role id pattern"));

static DATABASE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid database pattern"));

/// Returns `projects/{project_id}`.
#[must_use]
pub fn project_name(project_id: &str) -> String {
    format!("projects/{project_id}")
}

/// Address of a branch, the parent of endpoints and roles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchPath {
    project_id: String,
    branch_id: String,
}

impl BranchPath {
    pub fn new(project_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            branch_id: branch_id.into(),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn branch_id(&self) -> &str {
        &self.branch_id
    }

    /// `projects/{p}`
    pub fn project_name(&self) -> String {
        project_name(&self.project_id)
    }

    /// `projects/{p}/branches/{b}`
    pub fn name(&self) -> String {
        format!("projects/{}/branches/{}", self.project_id, self.branch_id)
    }

    /// `projects/{p}/branches/{b}/endpoints/{endpoint_id}`
    pub fn endpoint_name(&self, endpoint_id: &str) -> String {
        format!("{}/endpoints/{endpoint_id}", self.name())
    }

    /// `projects/{p}/branches/{b}/roles/{role_id}`
    pub fn role_name(&self, role_id: &str) -> String {
        format!("{}/roles/{role_id}", self.name())
    }
}

impl fmt::Display for BranchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Normalizes an identity (email or client id) into a role id candidate.
///
/// Lowercases, replaces `@` and `.` with `-`, and prefixes
/// [`NON_ALPHA_ROLE_PREFIX`] when the result does not start with a letter.
#[must_use]
pub fn normalize_role_id(identity: &str) -> String {
    let role_id = identity.replace(['@', '.'], "-").to_lowercase();
    match role_id.chars().next() {
        Some(first) if !first.is_ascii_alphabetic() => format!("{NON_ALPHA_ROLE_PREFIX}{role_id}"),
        _ => role_id,
    }
}

/// Derives the role id for an identity and checks it against [`ROLE_ID_PATTERN`].
pub fn role_id_for(identity: &str) -> Result<String, ProvisionError> {
    let role_id = normalize_role_id(identity);
    if ROLE_ID_REGEX.is_match(&role_id) {
        Ok(role_id)
    } else {
        Err(ProvisionError::invalid_identifier(
            "role id",
            role_id,
            format!("must match {ROLE_ID_PATTERN} (derived from '{identity}')"),
        ))
    }
}

/// Branch id used for a developer's personal environment: `dev-{username}`.
///
/// The username is the local part of the email with `.` replaced by `-`.
#[must_use]
pub fn dev_branch_id(user_name: &str) -> String {
    let local = user_name.split('@').next().unwrap_or(user_name);
    format!("dev-{}", local.replace('.', "-").to_lowercase())
}

/// Checks that a database name is a plain SQL identifier.
pub fn validate_database_name(database: &str) -> Result<(), ProvisionError> {
    if DATABASE_NAME_REGEX.is_match(database) {
        Ok(())
    } else {
        Err(ProvisionError::invalid_identifier(
            "database name",
            database,
            "must start with a letter or underscore and contain only letters, digits and underscores",
        ))
    }
}

/// Field paths of a partial update.
///
/// Paths are sent exactly as given, in snake_case. Generic field-mask
/// encoders rewrite them to camelCase, which the control plane rejects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMask {
    paths: Vec<String>,
}

impl FieldMask {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Wire form used for the `update_mask` query parameter.
    pub fn to_query_value(&self) -> String {
        self.paths.join(",")
    }
}

impl fmt::Display for FieldMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_query_value())
    }
}
