//! In-memory fakes of the control plane, identity service and database admin.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use lakebase_control::resources::{EndpointHosts, EndpointStatus};
use lakebase_control::{
    AdminConnectOptions, AdminError, App, Branch, ControlPlane, ControlPlaneError, CurrentUser,
    DatabaseAdmin, DatabaseCredential, Endpoint, FieldMask, Identity, Project, Result, Role,
};
use parking_lot::Mutex;

/// A recorded control-plane call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get(String),
    Create(String),
    Update { name: String, mask: String },
    List(String),
    Mint(String),
}

#[derive(Default)]
struct State {
    projects: HashMap<String, Project>,
    branches: HashMap<String, Branch>,
    endpoints: HashMap<String, Endpoint>,
    roles: HashMap<String, Role>,
    calls: Vec<Call>,
    /// Bodies of endpoint create requests, in order.
    endpoint_bodies: Vec<Endpoint>,
    /// Next create of this kind fails with the given error.
    create_errors: HashMap<&'static str, ControlPlaneError>,
    /// Next create of this kind loses a race: the resource appears, but the
    /// caller gets already-exists.
    races: HashSet<&'static str>,
    update_error: Option<ControlPlaneError>,
    minted: usize,
    mint_error: Option<ControlPlaneError>,
}

/// Control plane backed by hash maps, recording every call.
///
/// Like the real service, a branch only accepts one read-write endpoint; a
/// second create on the same branch is rejected as a bad request.
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<State>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn endpoint_bodies(&self) -> Vec<Endpoint> {
        self.state.lock().endpoint_bodies.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn creates(&self) -> usize {
        self.count(|c| matches!(c, Call::Create(_)))
    }

    pub fn gets(&self) -> usize {
        self.count(|c| matches!(c, Call::Get(_)))
    }

    pub fn mints(&self) -> usize {
        self.count(|c| matches!(c, Call::Mint(_)))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn fail_next_create(&self, kind: &'static str, err: ControlPlaneError) {
        self.state.lock().create_errors.insert(kind, err);
    }

    pub fn race_next_create(&self, kind: &'static str) {
        self.state.lock().races.insert(kind);
    }

    pub fn fail_next_update(&self, err: ControlPlaneError) {
        self.state.lock().update_error = Some(err);
    }

    pub fn fail_mint(&self, err: ControlPlaneError) {
        self.state.lock().mint_error = Some(err);
    }

    pub fn insert_project(&self, name: &str) {
        self.state.lock().projects.insert(
            name.to_string(),
            Project {
                name: Some(name.to_string()),
                spec: None,
            },
        );
    }

    pub fn insert_branch(&self, name: &str, protected: bool) {
        let mut branch = Branch::protection_patch(name);
        if let Some(spec) = branch.spec.as_mut() {
            spec.is_protected = Some(protected);
        }
        self.state.lock().branches.insert(name.to_string(), branch);
    }

    pub fn insert_endpoint(&self, name: &str, host: Option<&str>) {
        self.state
            .lock()
            .endpoints
            .insert(name.to_string(), endpoint_named(name, host));
    }

    pub fn insert_role(&self, name: &str) {
        self.state.lock().roles.insert(
            name.to_string(),
            Role {
                name: Some(name.to_string()),
                spec: None,
            },
        );
    }

    pub fn branch(&self, name: &str) -> Option<Branch> {
        self.state.lock().branches.get(name).cloned()
    }

    pub fn endpoint_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().endpoints.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn role_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.state.lock().roles.keys().cloned().collect();
        names.sort();
        names
    }

    /// Applies scripted failures shared by every create.
    fn before_create(state: &mut State, kind: &'static str, name: &str) -> Option<ControlPlaneError> {
        state.calls.push(Call::Create(name.to_string()));
        state.create_errors.remove(kind)
    }
}

fn endpoint_named(name: &str, host: Option<&str>) -> Endpoint {
    Endpoint {
        name: Some(name.to_string()),
        spec: None,
        status: Some(EndpointStatus {
            hosts: Some(EndpointHosts {
                host: host.map(str::to_string),
            }),
            current_state: Some("ACTIVE".to_string()),
        }),
    }
}

fn lookup<T: Clone>(map: &HashMap<String, T>, name: &str) -> Result<T> {
    map.get(name)
        .cloned()
        .ok_or_else(|| ControlPlaneError::not_found(format!("{name} not found")))
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn get_project(&self, name: &str) -> Result<Project> {
        let mut state = self.state.lock();
        state.calls.push(Call::Get(name.to_string()));
        lookup(&state.projects, name)
    }

    async fn create_project(&self, project_id: &str, project: &Project) -> Result<Project> {
        let name = format!("projects/{project_id}");
        let mut state = self.state.lock();
        if let Some(err) = Self::before_create(&mut state, "project", &name) {
            return Err(err);
        }
        let created = Project {
            name: Some(name.clone()),
            spec: project.spec.clone(),
        };
        let raced = state.races.remove("project");
        if state.projects.contains_key(&name) || raced {
            state.projects.entry(name.clone()).or_insert(created);
            return Err(ControlPlaneError::already_exists(format!("{name} already exists")));
        }
        state.projects.insert(name, created.clone());
        Ok(created)
    }

    async fn get_branch(&self, name: &str) -> Result<Branch> {
        let mut state = self.state.lock();
        state.calls.push(Call::Get(name.to_string()));
        lookup(&state.branches, name)
    }

    async fn create_branch(&self, parent: &str, branch_id: &str, branch: &Branch) -> Result<Branch> {
        let name = format!("{parent}/branches/{branch_id}");
        let mut state = self.state.lock();
        if let Some(err) = Self::before_create(&mut state, "branch", &name) {
            return Err(err);
        }
        let created = Branch {
            name: Some(name.clone()),
            spec: branch.spec.clone(),
        };
        let raced = state.races.remove("branch");
        if state.branches.contains_key(&name) || raced {
            state.branches.entry(name.clone()).or_insert(created);
            return Err(ControlPlaneError::already_exists(format!("{name} already exists")));
        }
        state.branches.insert(name, created.clone());
        Ok(created)
    }

    async fn update_branch(&self, name: &str, branch: &Branch, update_mask: &FieldMask) -> Result<Branch> {
        let mut state = self.state.lock();
        state.calls.push(Call::Update {
            name: name.to_string(),
            mask: update_mask.to_query_value(),
        });
        if let Some(err) = state.update_error.take() {
            return Err(err);
        }
        let protect = branch.is_protected();
        let current = state
            .branches
            .get_mut(name)
            .ok_or_else(|| ControlPlaneError::not_found(format!("{name} not found")))?;
        if update_mask.paths().iter().any(|p| p == "spec.is_protected") {
            current.spec.get_or_insert_with(Default::default).is_protected = Some(protect);
        }
        Ok(current.clone())
    }

    async fn get_endpoint(&self, name: &str) -> Result<Endpoint> {
        let mut state = self.state.lock();
        state.calls.push(Call::Get(name.to_string()));
        lookup(&state.endpoints, name)
    }

    async fn create_endpoint(&self, parent: &str, endpoint_id: &str, endpoint: &Endpoint) -> Result<Endpoint> {
        let name = format!("{parent}/endpoints/{endpoint_id}");
        let mut state = self.state.lock();
        state.endpoint_bodies.push(endpoint.clone());
        if let Some(err) = Self::before_create(&mut state, "endpoint", &name) {
            return Err(err);
        }
        let host = format!("{endpoint_id}.db.example.com");
        let created = endpoint_named(&name, Some(&host));
        let raced = state.races.remove("endpoint");
        if state.endpoints.contains_key(&name) || raced {
            state.endpoints.entry(name.clone()).or_insert(created);
            return Err(ControlPlaneError::already_exists(format!("{name} already exists")));
        }
        let prefix = format!("{parent}/endpoints/");
        if state.endpoints.keys().any(|k| k.starts_with(&prefix)) {
            return Err(ControlPlaneError::bad_request(format!(
                "read_write endpoint already exists on branch {parent}"
            )));
        }
        state.endpoints.insert(name, created.clone());
        Ok(created)
    }

    async fn list_endpoints(&self, parent: &str) -> Result<Vec<Endpoint>> {
        let mut state = self.state.lock();
        state.calls.push(Call::List(parent.to_string()));
        let prefix = format!("{parent}/endpoints/");
        let mut found: Vec<Endpoint> = state
            .endpoints
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| v.clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn get_role(&self, name: &str) -> Result<Role> {
        let mut state = self.state.lock();
        state.calls.push(Call::Get(name.to_string()));
        lookup(&state.roles, name)
    }

    async fn create_role(&self, parent: &str, role_id: &str, role: &Role) -> Result<Role> {
        let name = format!("{parent}/roles/{role_id}");
        let mut state = self.state.lock();
        if let Some(err) = Self::before_create(&mut state, "role", &name) {
            return Err(err);
        }
        let created = Role {
            name: Some(name.clone()),
            spec: role.spec.clone(),
        };
        let raced = state.races.remove("role");
        if state.roles.contains_key(&name) || raced {
            state.roles.entry(name.clone()).or_insert(created);
            return Err(ControlPlaneError::already_exists(format!("{name} already exists")));
        }
        state.roles.insert(name, created.clone());
        Ok(created)
    }

    async fn list_roles(&self, parent: &str) -> Result<Vec<Role>> {
        let mut state = self.state.lock();
        state.calls.push(Call::List(parent.to_string()));
        let prefix = format!("{parent}/roles/");
        Ok(state
            .roles
            .iter()
            .filter(|(k, _)| k.starts_with(&prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }

    async fn generate_database_credential(&self, endpoint_name: &str) -> Result<DatabaseCredential> {
        let mut state = self.state.lock();
        state.calls.push(Call::Mint(endpoint_name.to_string()));
        if let Some(err) = state.mint_error.take() {
            return Err(err);
        }
        state.minted += 1;
        Ok(DatabaseCredential {
            token: format!("token-{}", state.minted),
            expire_time: None,
        })
    }
}

/// Identity service with a fixed caller.
pub struct FakeIdentity {
    pub user_name: String,
    pub client_id: Option<String>,
    pub apps: HashMap<String, App>,
}

impl FakeIdentity {
    pub fn user(user_name: &str) -> Self {
        Self {
            user_name: user_name.to_string(),
            client_id: None,
            apps: HashMap::new(),
        }
    }

    pub fn service_principal(client_id: &str) -> Self {
        Self {
            user_name: client_id.to_string(),
            client_id: Some(client_id.to_string()),
            apps: HashMap::new(),
        }
    }

    pub fn with_app(mut self, name: &str, sp_client_id: Option<&str>) -> Self {
        self.apps.insert(
            name.to_string(),
            App {
                name: name.to_string(),
                service_principal_client_id: sp_client_id.map(str::to_string),
            },
        );
        self
    }
}

#[async_trait]
impl Identity for FakeIdentity {
    async fn current_user(&self) -> Result<CurrentUser> {
        Ok(CurrentUser {
            user_name: self.user_name.clone(),
            display_name: None,
        })
    }

    fn client_id(&self) -> Option<String> {
        self.client_id.clone()
    }

    async fn get_app(&self, name: &str) -> Result<App> {
        self.apps
            .get(name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::not_found(format!("app {name} not found")))
    }
}

/// Database admin that replays scripted outcomes, then succeeds.
#[derive(Default)]
pub struct FakeDatabaseAdmin {
    outcomes: Mutex<VecDeque<std::result::Result<(), AdminError>>>,
    connections: Mutex<Vec<(AdminConnectOptions, String)>>,
}

impl FakeDatabaseAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scripted(outcomes: impl IntoIterator<Item = std::result::Result<(), AdminError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into_iter().collect()),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn connections(&self) -> Vec<(AdminConnectOptions, String)> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl DatabaseAdmin for FakeDatabaseAdmin {
    async fn create_database(
        &self,
        options: &AdminConnectOptions,
        database: &str,
    ) -> std::result::Result<(), AdminError> {
        self.connections
            .lock()
            .push((options.clone(), database.to_string()));
        self.outcomes.lock().pop_front().unwrap_or(Ok(()))
    }
}
