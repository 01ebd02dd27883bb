use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

use super::view::DirectoryFilter;
use crate::connection::CredentialStore;
use crate::core::{DirectoryError, Group, Metadata, Project, Result, Scope, ServiceError};
use crate::events::{DirectoryEvent, EventBus};
use crate::service::{
    ChangeGroupRequest, ChangeMetadataRequest, ContactService, CreateProjectRequest,
    ProjectService,
};

/// What the directory is currently waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Mutating,
}

#[derive(Debug, Default)]
struct DirectoryState {
    filter: DirectoryFilter,
    canonical: Vec<Project>,
    view: Vec<Project>,
    groups: Vec<Group>,
    loads_in_flight: usize,
    mutations_in_flight: usize,
    deleting: HashSet<String>,
}

impl DirectoryState {
    fn refresh_view(&mut self) {
        self.view = self.filter.apply(&self.canonical);
    }
}

#[derive(Debug, Clone, Copy)]
enum Activity {
    Loading,
    Mutating,
}

/// Marks an operation in flight until dropped.
struct InFlight<'a> {
    state: &'a RwLock<DirectoryState>,
    activity: Activity,
    deleting: Option<String>,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match self.activity {
            Activity::Loading => state.loads_in_flight = state.loads_in_flight.saturating_sub(1),
            Activity::Mutating => {
                state.mutations_in_flight = state.mutations_in_flight.saturating_sub(1)
            }
        }
        if let Some(name) = self.deleting.take() {
            state.deleting.remove(&name);
        }
    }
}

/// Project directory state machine
///
/// Owns the canonical project set and the filtered view derived from it, and
/// runs create, delete, relink and metadata operations against the remote
/// services. Canonical state only changes after the corresponding remote
/// call succeeded.
pub struct DirectoryManager {
    projects: Arc<dyn ProjectService>,
    contacts: Arc<dyn ContactService>,
    credentials: Arc<dyn CredentialStore>,
    events: EventBus,
    disable_all_projects: bool,
    state: RwLock<DirectoryState>,
    /// Sequence number of the latest issued load
    load_seq: AtomicU64,
}

impl DirectoryManager {
    pub fn new(
        projects: Arc<dyn ProjectService>,
        contacts: Arc<dyn ContactService>,
        credentials: Arc<dyn CredentialStore>,
        events: EventBus,
    ) -> Self {
        Self {
            projects,
            contacts,
            credentials,
            events,
            disable_all_projects: false,
            state: RwLock::new(DirectoryState::default()),
            load_seq: AtomicU64::new(0),
        }
    }

    /// Restrict the directory to the "mine" scope
    pub fn disable_all_projects(mut self, disabled: bool) -> Self {
        self.disable_all_projects = disabled;
        self
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    /// Projects currently listed (scope and search applied)
    pub fn view(&self) -> Vec<Project> {
        self.read_state().view.clone()
    }

    /// Canonical project set of the last successful load
    pub fn projects(&self) -> Vec<Project> {
        self.read_state().canonical.clone()
    }

    pub fn project(&self, name: &str) -> Option<Project> {
        self.read_state()
            .canonical
            .iter()
            .find(|project| project.name == name)
            .cloned()
    }

    /// Groups cached by the last group load
    pub fn groups(&self) -> Vec<Group> {
        self.read_state().groups.clone()
    }

    pub fn scope(&self) -> Scope {
        self.read_state().filter.scope
    }

    pub fn search(&self) -> String {
        self.read_state().filter.search.clone()
    }

    pub fn phase(&self) -> Phase {
        let state = self.read_state();
        if state.loads_in_flight > 0 {
            Phase::Loading
        } else if state.mutations_in_flight > 0 {
            Phase::Mutating
        } else {
            Phase::Idle
        }
    }

    // ------------------------------------------------------------------
    // Directory loading and filtering
    // ------------------------------------------------------------------

    /// Fetch the project set for `scope` and replace the canonical set.
    ///
    /// A response that arrives after a newer load was issued is discarded.
    pub async fn load_directory(&self, scope: Scope) -> Result<()> {
        self.check_scope(scope)?;

        let seq = self.load_seq.fetch_add(1, Ordering::SeqCst) + 1;
        let _loading = self.begin(Activity::Loading, None);
        let token = self.credentials.access_token();
        debug!(scope = %scope, seq, "loading project directory");

        let mut projects = self
            .projects
            .list_projects(token.as_deref())
            .await
            .map_err(|error| self.fail("load projects", error))?;

        let latest = self.load_seq.load(Ordering::SeqCst);
        if latest != seq {
            debug!(scope = %scope, seq, latest, "discarding superseded directory response");
            return Ok(());
        }

        if scope == Scope::Mine {
            projects.retain(|project| project.is_member);
        }

        let loaded = {
            let mut state = self.write_state();
            state.canonical = projects;
            state.filter.scope = scope;
            state.refresh_view();
            state.canonical.clone()
        };

        info!(scope = %scope, count = loaded.len(), "project directory loaded");
        self.events.publish(DirectoryEvent::ProjectsLoaded(loaded));
        Ok(())
    }

    /// Switch the listing scope and reload the directory for it.
    pub async fn set_tab(&self, scope: Scope) -> Result<()> {
        self.check_scope(scope)?;
        {
            let mut state = self.write_state();
            state.filter.scope = scope;
            state.refresh_view();
        }
        self.load_directory(scope).await
    }

    /// Filter the loaded projects by name. An empty `text` lists every
    /// project of the current scope.
    pub fn set_search(&self, text: &str) {
        let mut state = self.write_state();
        state.filter.search = text.to_string();
        state.refresh_view();
    }

    /// Emit `ProjectSelected` for a listed project.
    pub fn select_project(&self, name: &str) -> Option<Project> {
        let project = self
            .read_state()
            .view
            .iter()
            .find(|project| project.name == name)
            .cloned()?;
        self.events
            .publish(DirectoryEvent::ProjectSelected(project.clone()));
        Some(project)
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Refresh the cached group list from the contact service.
    pub async fn load_groups(&self) -> Result<Vec<Group>> {
        let token = self.credentials.access_token();
        match self.contacts.list_groups(token.as_deref()).await {
            Ok(groups) => {
                debug!(count = groups.len(), "groups loaded");
                self.write_state().groups = groups.clone();
                Ok(groups)
            }
            Err(ServiceError::Unauthorized) => {
                Err(self.fail("load groups", ServiceError::Unauthorized))
            }
            Err(error) => {
                self.write_state().groups.clear();
                Err(self.fail("load groups", error))
            }
        }
    }

    async fn resolve_group<F>(&self, what: &str, matches: F) -> Result<Group>
    where
        F: Fn(&Group) -> bool,
    {
        let cached = self.read_state().groups.iter().find(|g| matches(g)).cloned();
        if let Some(group) = cached {
            return Ok(group);
        }

        debug!(group = what, "group not cached, refreshing group list");
        self.load_groups()
            .await?
            .into_iter()
            .find(|g| matches(g))
            .ok_or_else(|| DirectoryError::validation(format!("unknown group '{what}'")))
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Create a project linked to the group with id `linked_group_id`.
    ///
    /// On success the scope is reset to "mine" and the directory reloaded.
    pub async fn create_project(&self, name: &str, linked_group_id: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DirectoryError::validation("project name cannot be empty"));
        }

        let _mutating = self.begin(Activity::Mutating, None);
        let group = self
            .resolve_group(linked_group_id, |group| group.id == linked_group_id)
            .await?;

        let token = self.credentials.access_token();
        let users = self
            .contacts
            .group_members(&group.name, token.as_deref())
            .await
            .map_err(|error| self.fail("resolve group members", error))?;

        let request = CreateProjectRequest {
            name: name.to_string(),
            access_token: token.unwrap_or_default(),
            linked_group: group,
            users,
        };

        match self.projects.create_project(&request).await {
            Ok(()) => {}
            Err(ServiceError::Conflict(_)) => {
                info!(project = name, "project name already taken");
                return Err(DirectoryError::NameConflict(name.to_string()));
            }
            Err(error) => return Err(self.fail("create project", error)),
        }

        info!(project = name, group = %request.linked_group.name, "project created");
        {
            let mut state = self.write_state();
            state.filter.scope = Scope::Mine;
            state.refresh_view();
        }

        if let Err(error) = self.load_directory(Scope::Mine).await {
            warn!(project = name, error = %error, "reload after create failed");
        }
        Ok(())
    }

    /// Delete the project called `name`. At most one delete per name may be
    /// in flight.
    ///
    /// On success the scope is reset to "mine" and the directory reloaded.
    pub async fn delete_project(&self, name: &str) -> Result<()> {
        {
            let mut state = self.write_state();
            if !state.deleting.insert(name.to_string()) {
                return Err(DirectoryError::validation(format!(
                    "delete of '{name}' is already in flight"
                )));
            }
        }
        let _mutating = self.begin(Activity::Mutating, Some(name.to_string()));

        let token = self.credentials.access_token();
        self.projects
            .delete_project(name, token.as_deref())
            .await
            .map_err(|error| self.fail("delete project", error))?;

        {
            let mut state = self.write_state();
            state
                .canonical
                .retain(|project| project.name != name && project.is_member);
            state.filter.scope = Scope::Mine;
            state.refresh_view();
        }

        info!(project = name, "project deleted");
        if let Err(error) = self.load_directory(Scope::Mine).await {
            warn!(project = name, error = %error, "reload after delete failed");
        }
        Ok(())
    }

    /// Link `project_name` to the group called `new_group_name`.
    pub async fn relink_group(&self, project_name: &str, new_group_name: &str) -> Result<Project> {
        if self.project(project_name).is_none() {
            return Err(DirectoryError::validation(format!(
                "project '{project_name}' is not loaded"
            )));
        }

        let _mutating = self.begin(Activity::Mutating, None);
        let group = self
            .resolve_group(new_group_name, |group| group.name == new_group_name)
            .await?;

        let request = ChangeGroupRequest {
            name: project_name.to_string(),
            access_token: self.credentials.access_token().unwrap_or_default(),
            new_group_name: group.name.clone(),
            new_group_id: group.id.clone(),
        };
        let response = self
            .projects
            .change_group(&request)
            .await
            .map_err(|error| self.fail("change group", error))?;

        let updated = {
            let mut state = self.write_state();
            let Some(project) = state
                .canonical
                .iter_mut()
                .find(|project| project.name == project_name)
            else {
                return Err(DirectoryError::transient(format!(
                    "project '{project_name}' left the directory during relink"
                )));
            };
            project.group_name = response.group_name.or(Some(group.name));
            project.group_id = response.group_id.or(Some(group.id));
            let updated = project.clone();
            state.refresh_view();
            updated
        };

        info!(
            project = project_name,
            group = updated.group_name.as_deref().unwrap_or_default(),
            "project group changed"
        );
        self.events
            .publish(DirectoryEvent::ProjectSelected(updated.clone()));
        Ok(updated)
    }

    /// Merge `new_metadata` into the project's metadata once the service
    /// accepted it.
    pub async fn change_metadata(&self, project_name: &str, new_metadata: Metadata) -> Result<()> {
        let Some(current) = self.project(project_name) else {
            return Err(DirectoryError::validation(format!(
                "project '{project_name}' is not loaded"
            )));
        };

        let _mutating = self.begin(Activity::Mutating, None);
        let request = ChangeMetadataRequest {
            access_token: self.credentials.access_token().unwrap_or_default(),
            project_name: project_name.to_string(),
            old_metadata: current.metadata,
            new_metadata,
        };
        self.projects
            .change_metadata(&request)
            .await
            .map_err(|error| self.fail("change metadata", error))?;

        let updated = {
            let mut state = self.write_state();
            let Some(project) = state
                .canonical
                .iter_mut()
                .find(|project| project.name == project_name)
            else {
                warn!(project = project_name, "metadata accepted for a project no longer listed");
                return Ok(());
            };
            project.merge_metadata(&request.new_metadata);
            let updated = project.clone();
            state.refresh_view();
            updated
        };

        debug!(project = project_name, "project metadata changed");
        self.events.publish(DirectoryEvent::MetadataChanged {
            project: updated,
            metadata: request.new_metadata,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn check_scope(&self, scope: Scope) -> Result<()> {
        if scope == Scope::All && self.disable_all_projects {
            return Err(DirectoryError::validation("the 'all' scope is disabled"));
        }
        Ok(())
    }

    fn begin(&self, activity: Activity, deleting: Option<String>) -> InFlight<'_> {
        let mut state = self.write_state();
        match activity {
            Activity::Loading => state.loads_in_flight += 1,
            Activity::Mutating => state.mutations_in_flight += 1,
        }
        InFlight {
            state: &self.state,
            activity,
            deleting,
        }
    }

    /// Classify a service failure; a 401 clears the stored credentials.
    fn fail(&self, operation: &'static str, error: ServiceError) -> DirectoryError {
        match error {
            ServiceError::Unauthorized => {
                warn!(operation, "access token rejected");
                self.credentials.clear();
                DirectoryError::Unauthorized(format!("{operation}: access token rejected"))
            }
            other => {
                warn!(operation, error = %other, "service call failed");
                DirectoryError::TransientFailure(format!("{operation}: {other}"))
            }
        }
    }

    fn read_state(&self) -> RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
