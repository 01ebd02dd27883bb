//! Test fakes: in-memory services and an HTTP stand-in for both remotes.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use projectlist::service::{
    ChangeGroupRequest, ChangeMetadataRequest, ContactService, CreateProjectRequest,
    ProjectService,
};
use projectlist::{
    DirectoryManager, EventBus, Group, Project, ServiceError, SessionCredentials,
};
use tokio::sync::oneshot;

pub mod server;

/// Project service backed by a vector, with per-operation failure injection
/// and optional gates that hold `list_projects` / `delete_project` responses.
#[derive(Default)]
pub struct FakeProjects {
    server: Mutex<Vec<Project>>,
    failures: Mutex<HashMap<&'static str, ServiceError>>,
    list_gates: Mutex<VecDeque<oneshot::Receiver<Vec<Project>>>>,
    delete_gates: Mutex<VecDeque<oneshot::Receiver<()>>>,
    calls: Mutex<Vec<String>>,
    tokens: Mutex<Vec<Option<String>>>,
    created: Mutex<Vec<CreateProjectRequest>>,
    group_changes: Mutex<Vec<ChangeGroupRequest>>,
    metadata_changes: Mutex<Vec<ChangeMetadataRequest>>,
}

impl FakeProjects {
    pub fn with_projects(projects: Vec<Project>) -> Arc<Self> {
        let fake = Self::default();
        *fake.server.lock().unwrap() = projects;
        Arc::new(fake)
    }

    /// Make the next call of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: ServiceError) {
        self.failures.lock().unwrap().insert(operation, error);
    }

    /// Hold the next `list_projects` until the returned sender delivers the listing.
    pub fn gate_list(&self) -> oneshot::Sender<Vec<Project>> {
        let (sender, receiver) = oneshot::channel();
        self.list_gates.lock().unwrap().push_back(receiver);
        sender
    }

    pub fn gate_delete(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.delete_gates.lock().unwrap().push_back(receiver);
        sender
    }

    pub fn set_server(&self, projects: Vec<Project>) {
        *self.server.lock().unwrap() = projects;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<CreateProjectRequest> {
        self.created.lock().unwrap().clone()
    }

    pub fn group_changes(&self) -> Vec<ChangeGroupRequest> {
        self.group_changes.lock().unwrap().clone()
    }

    pub fn metadata_changes(&self) -> Vec<ChangeMetadataRequest> {
        self.metadata_changes.lock().unwrap().clone()
    }

    fn enter(&self, operation: &'static str) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push(operation.to_string());
        match self.failures.lock().unwrap().remove(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProjectService for FakeProjects {
    async fn list_projects(&self, token: Option<&str>) -> Result<Vec<Project>, ServiceError> {
        self.tokens.lock().unwrap().push(token.map(str::to_string));
        self.enter("list")?;
        let gate = self.list_gates.lock().unwrap().pop_front();
        match gate {
            Some(gate) => gate
                .await
                .map_err(|_| ServiceError::Transport("gate dropped".into())),
            None => Ok(self.server.lock().unwrap().clone()),
        }
    }

    async fn create_project(&self, request: &CreateProjectRequest) -> Result<(), ServiceError> {
        self.enter("create")?;
        let mut server = self.server.lock().unwrap();
        if server.iter().any(|project| project.name == request.name) {
            return Err(ServiceError::Conflict(request.name.clone()));
        }
        server.push(Project::new(request.name.clone(), true).with_group(&request.linked_group));
        self.created.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn delete_project(&self, name: &str, _token: Option<&str>) -> Result<(), ServiceError> {
        self.enter("delete")?;
        let gate = self.delete_gates.lock().unwrap().pop_front();
        if let Some(gate) = gate {
            gate.await
                .map_err(|_| ServiceError::Transport("gate dropped".into()))?;
        }
        self.server.lock().unwrap().retain(|project| project.name != name);
        Ok(())
    }

    async fn change_group(&self, request: &ChangeGroupRequest) -> Result<Project, ServiceError> {
        self.enter("change_group")?;
        self.group_changes.lock().unwrap().push(request.clone());
        // the service answers without membership information
        let group = Group::new(request.new_group_id.clone(), request.new_group_name.clone());
        Ok(Project::new(request.name.clone(), false).with_group(&group))
    }

    async fn change_metadata(&self, request: &ChangeMetadataRequest) -> Result<(), ServiceError> {
        self.enter("change_metadata")?;
        self.metadata_changes.lock().unwrap().push(request.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeContacts {
    groups: Mutex<Vec<Group>>,
    members: Mutex<HashMap<String, Vec<String>>>,
    failures: Mutex<HashMap<&'static str, ServiceError>>,
    calls: Mutex<Vec<String>>,
}

impl FakeContacts {
    pub fn with_groups(groups: Vec<(Group, Vec<&str>)>) -> Arc<Self> {
        let fake = Self::default();
        for (group, members) in groups {
            fake.members.lock().unwrap().insert(
                group.name.clone(),
                members.into_iter().map(str::to_string).collect(),
            );
            fake.groups.lock().unwrap().push(group);
        }
        Arc::new(fake)
    }

    pub fn fail_next(&self, operation: &'static str, error: ServiceError) {
        self.failures.lock().unwrap().insert(operation, error);
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.as_str() == operation)
            .count()
    }

    fn enter(&self, operation: &'static str) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push(operation.to_string());
        match self.failures.lock().unwrap().remove(operation) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ContactService for FakeContacts {
    async fn list_groups(&self, _token: Option<&str>) -> Result<Vec<Group>, ServiceError> {
        self.enter("groups")?;
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn group_members(
        &self,
        group_name: &str,
        _token: Option<&str>,
    ) -> Result<Vec<String>, ServiceError> {
        self.enter("members")?;
        Ok(self
            .members
            .lock()
            .unwrap()
            .get(group_name)
            .cloned()
            .unwrap_or_default())
    }
}

pub struct Harness {
    pub projects: Arc<FakeProjects>,
    pub contacts: Arc<FakeContacts>,
    pub credentials: Arc<SessionCredentials>,
    pub events: EventBus,
    pub manager: Arc<DirectoryManager>,
}

pub fn modellers() -> Group {
    Group::new("g-1", "Modellers")
}

pub fn reviewers() -> Group {
    Group::new("g-2", "Reviewers")
}

pub fn harness(server: Vec<Project>) -> Harness {
    let projects = FakeProjects::with_projects(server);
    let contacts = FakeContacts::with_groups(vec![
        (modellers(), vec!["Ana", "Ben"]),
        (reviewers(), vec!["Cleo"]),
    ]);
    let credentials = Arc::new(SessionCredentials::with_token("token-1"));
    let events = EventBus::new();
    let manager = Arc::new(DirectoryManager::new(
        projects.clone(),
        contacts.clone(),
        credentials.clone(),
        events.clone(),
    ));

    Harness {
        projects,
        contacts,
        credentials,
        events,
        manager,
    }
}

pub fn names(projects: &[Project]) -> Vec<String> {
    projects.iter().map(|project| project.name.clone()).collect()
}
