use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url, header};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use super::{
    ChangeGroupRequest, ChangeMetadataRequest, ContactService, CreateProjectRequest,
    ProjectService,
};
use crate::connection::ServiceConfig;
use crate::core::{ConfigError, Group, Project, ServiceError};

#[derive(Debug, Deserialize)]
struct ProjectListing {
    #[serde(default)]
    projects: Vec<Project>,
}

/// Builds the HTTP client shared by both services.
pub fn build_client(timeout: Duration) -> Result<Client, ConfigError> {
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|error| ConfigError::Client(error.to_string()))
}

#[derive(Debug, Clone)]
struct Endpoint {
    base: String,
    client: Client,
}

impl Endpoint {
    /// Appends `segments` to the base URL, percent-encoding each one.
    /// An empty last segment yields a trailing slash.
    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.base)
            .map_err(|error| ServiceError::Transport(format!("invalid base url: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Transport(format!("'{}' cannot be a base url", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Adds a bearer header when a non-empty token is present.
    fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token.filter(|token| !token.is_empty()) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<String, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|error| ServiceError::Transport(error.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| ServiceError::Transport(format!("response read failed: {error}")))?;

        if !status.is_success() {
            debug!(status = status.as_u16(), "service request rejected");
            return Err(ServiceError::from_status(status.as_u16(), body));
        }

        Ok(body)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        let body = self.send(request).await?;
        serde_json::from_str(&body).map_err(|error| ServiceError::Decode(error.to_string()))
    }
}

/// reqwest-backed client of the project service
#[derive(Debug, Clone)]
pub struct HttpProjectService {
    endpoint: Endpoint,
}

impl HttpProjectService {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            endpoint: Endpoint {
                base: base_url.to_string(),
                client,
            },
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let client = build_client(config.request_timeout)?;
        Ok(Self::new(&config.project_service_url, client))
    }
}

#[async_trait]
impl ProjectService for HttpProjectService {
    async fn list_projects(&self, token: Option<&str>) -> Result<Vec<Project>, ServiceError> {
        let url = self.endpoint.url(&["projects"])?;
        let request = Endpoint::authorize(self.endpoint.client.get(url), token);
        let listing = self.endpoint.send_json::<ProjectListing>(request).await?;
        Ok(listing.projects)
    }

    async fn create_project(&self, request: &CreateProjectRequest) -> Result<(), ServiceError> {
        let url = self.endpoint.url(&["projects"])?;
        let builder = self.endpoint.client.post(url).json(request);
        let builder = Endpoint::authorize(builder, Some(&request.access_token));
        self.endpoint.send(builder).await.map(|_| ())
    }

    async fn delete_project(&self, name: &str, token: Option<&str>) -> Result<(), ServiceError> {
        let url = self.endpoint.url(&["projects", name])?;
        let builder = self
            .endpoint
            .client
            .delete(url)
            .json(&json!({ "access_token": token.unwrap_or_default() }));
        let builder = Endpoint::authorize(builder, token);
        self.endpoint.send(builder).await.map(|_| ())
    }

    async fn change_group(&self, request: &ChangeGroupRequest) -> Result<Project, ServiceError> {
        let url = self.endpoint.url(&["projects", "changeGroup", ""])?;
        let builder = self.endpoint.client.post(url).json(request);
        let builder = Endpoint::authorize(builder, Some(&request.access_token));
        self.endpoint.send_json(builder).await
    }

    async fn change_metadata(&self, request: &ChangeMetadataRequest) -> Result<(), ServiceError> {
        let url = self.endpoint.url(&["projects", "changeMetadata", ""])?;
        let builder = self.endpoint.client.post(url).json(request);
        let builder = Endpoint::authorize(builder, Some(&request.access_token));
        self.endpoint.send(builder).await.map(|_| ())
    }
}

/// reqwest-backed client of the contact (group) service
#[derive(Debug, Clone)]
pub struct HttpContactService {
    endpoint: Endpoint,
}

impl HttpContactService {
    pub fn new(base_url: &str, client: Client) -> Self {
        Self {
            endpoint: Endpoint {
                base: base_url.to_string(),
                client,
            },
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Result<Self, ConfigError> {
        let client = build_client(config.request_timeout)?;
        Ok(Self::new(&config.contact_service_url, client))
    }
}

#[async_trait]
impl ContactService for HttpContactService {
    async fn list_groups(&self, token: Option<&str>) -> Result<Vec<Group>, ServiceError> {
        let url = self.endpoint.url(&["groups"])?;
        let request = Endpoint::authorize(self.endpoint.client.get(url), token);
        let groups = self
            .endpoint
            .send_json::<BTreeMap<String, String>>(request)
            .await?;
        Ok(groups
            .into_iter()
            .map(|(id, name)| Group { id, name })
            .collect())
    }

    async fn group_members(
        &self,
        group_name: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>, ServiceError> {
        let url = self.endpoint.url(&["groups", group_name, "member"])?;
        let request = Endpoint::authorize(self.endpoint.client.get(url), token);
        let members = self
            .endpoint
            .send_json::<BTreeMap<String, String>>(request)
            .await?;
        Ok(members.into_values().collect())
    }
}
