//! axum stand-in for the project and contact services.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;

pub const VALID_TOKEN: &str = "token-1";

/// One request as the fake server saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    pub method: &'static str,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

#[derive(Default)]
struct ServerData {
    projects: Vec<Value>,
    groups: BTreeMap<String, String>,
    members: BTreeMap<String, Vec<String>>,
    requests: Vec<Recorded>,
    fail_next: Option<(StatusCode, String)>,
}

#[derive(Clone, Default)]
pub struct FakeServer {
    inner: Arc<Mutex<ServerData>>,
}

impl FakeServer {
    /// P1 (member, linked to Modellers) and P2 (not a member), plus the
    /// Modellers and Reviewers groups.
    pub fn seeded() -> Self {
        let server = Self::default();
        {
            let mut data = server.lock();
            data.projects = vec![
                json!({
                    "name": "P1",
                    "is_member": true,
                    "groupName": "Modellers",
                    "groupIdentifier": "g-1",
                    "metadata": { "stage": "draft" }
                }),
                json!({ "name": "P2" }),
            ];
            data.groups.insert("g-1".into(), "Modellers".into());
            data.groups.insert("g-2".into(), "Reviewers".into());
            data.members
                .insert("Modellers".into(), vec!["Ana".into(), "Ben".into()]);
            data.members.insert("Reviewers".into(), vec!["Cleo".into()]);
        }
        server
    }

    pub fn add_project(&self, project: Value) {
        self.lock().projects.push(project);
    }

    pub fn add_group(&self, id: &str, name: &str, members: &[&str]) {
        let mut data = self.lock();
        data.groups.insert(id.to_string(), name.to_string());
        data.members.insert(
            name.to_string(),
            members.iter().map(|member| member.to_string()).collect(),
        );
    }

    /// Answer the next request with `status` and `body`.
    pub fn fail_next(&self, status: StatusCode, body: &str) {
        self.lock().fail_next = Some((status, body.to_string()));
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.lock().requests.clone()
    }

    pub fn last_request(&self) -> Recorded {
        self.lock()
            .requests
            .last()
            .cloned()
            .expect("no request recorded")
    }

    pub fn project(&self, name: &str) -> Option<Value> {
        self.lock()
            .projects
            .iter()
            .find(|project| project["name"] == name)
            .cloned()
    }

    /// Serve on an ephemeral local port and return the base URL.
    pub async fn spawn(&self) -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake service");
        let addr = listener.local_addr().expect("local addr");
        let app = router(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("fake service");
        });
        format!("http://{addr}")
    }

    fn enter(
        &self,
        method: &'static str,
        path: String,
        headers: &HeaderMap,
        body: Option<Value>,
    ) -> Result<(), Response> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let mut data = self.lock();
        data.requests.push(Recorded {
            method,
            path,
            authorization: authorization.clone(),
            body,
        });
        if let Some((status, body)) = data.fail_next.take() {
            return Err((status, body).into_response());
        }
        if authorization.as_deref() != Some(format!("Bearer {VALID_TOKEN}").as_str()) {
            return Err((StatusCode::UNAUTHORIZED, "invalid token").into_response());
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, ServerData> {
        self.inner.lock().unwrap()
    }
}

fn router(server: FakeServer) -> Router {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/:name", delete(delete_project))
        .route("/projects/changeGroup/", post(change_group))
        .route("/projects/changeMetadata/", post(change_metadata))
        .route("/contactservice/groups", get(list_groups))
        .route("/contactservice/groups/:name/member", get(group_members))
        .with_state(server)
}

async fn list_projects(State(server): State<FakeServer>, headers: HeaderMap) -> Response {
    if let Err(response) = server.enter("GET", "/projects".into(), &headers, None) {
        return response;
    }
    let projects = server.lock().projects.clone();
    Json(json!({ "projects": projects })).into_response()
}

async fn create_project(
    State(server): State<FakeServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let recorded = Some(body.clone());
    if let Err(response) = server.enter("POST", "/projects".into(), &headers, recorded) {
        return response;
    }

    let name = body["name"].as_str().unwrap_or_default().to_string();
    let mut data = server.lock();
    if data.projects.iter().any(|project| project["name"] == name.as_str()) {
        let message = format!("project {name} already exists");
        return (StatusCode::CONFLICT, message).into_response();
    }
    data.projects.push(json!({
        "name": name,
        "is_member": true,
        "groupName": body["linkedGroup"]["name"],
        "groupIdentifier": body["linkedGroup"]["id"],
    }));
    StatusCode::CREATED.into_response()
}

async fn delete_project(
    State(server): State<FakeServer>,
    Path(name): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(response) = server.enter("DELETE", uri.path().to_string(), &headers, Some(body)) {
        return response;
    }

    let mut data = server.lock();
    let before = data.projects.len();
    data.projects.retain(|project| project["name"] != name.as_str());
    if data.projects.len() == before {
        return StatusCode::NOT_FOUND.into_response();
    }
    StatusCode::OK.into_response()
}

async fn change_group(
    State(server): State<FakeServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = "/projects/changeGroup/".to_string();
    if let Err(response) = server.enter("POST", path, &headers, Some(body.clone())) {
        return response;
    }

    let mut data = server.lock();
    let Some(project) = data
        .projects
        .iter_mut()
        .find(|project| project["name"] == body["name"])
    else {
        return StatusCode::NOT_FOUND.into_response();
    };
    project["groupName"] = body["newGroupName"].clone();
    project["groupIdentifier"] = body["newGroupId"].clone();
    Json(project.clone()).into_response()
}

async fn change_metadata(
    State(server): State<FakeServer>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let path = "/projects/changeMetadata/".to_string();
    if let Err(response) = server.enter("POST", path, &headers, Some(body.clone())) {
        return response;
    }

    let mut data = server.lock();
    let Some(project) = data
        .projects
        .iter_mut()
        .find(|project| project["name"] == body["projectName"])
    else {
        return StatusCode::NOT_FOUND.into_response();
    };
    if let Some(update) = body["newMetadata"].as_object() {
        if !project["metadata"].is_object() {
            project["metadata"] = json!({});
        }
        for (key, value) in update {
            project["metadata"][key] = value.clone();
        }
    }
    StatusCode::OK.into_response()
}

async fn list_groups(State(server): State<FakeServer>, headers: HeaderMap) -> Response {
    let path = "/contactservice/groups".to_string();
    if let Err(response) = server.enter("GET", path, &headers, None) {
        return response;
    }
    let groups = server.lock().groups.clone();
    Json(groups).into_response()
}

async fn group_members(
    State(server): State<FakeServer>,
    Path(name): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if let Err(response) = server.enter("GET", uri.path().to_string(), &headers, None) {
        return response;
    }
    let members: BTreeMap<String, String> = server
        .lock()
        .members
        .get(&name)
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(index, member)| (format!("member-{index}"), member.clone()))
        .collect();
    Json(members).into_response()
}
