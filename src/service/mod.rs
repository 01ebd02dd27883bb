//! Remote project and contact service contracts.
//!
//! The directory manager talks to both services only through these traits;
//! [`http`] provides the reqwest-backed implementations.

use async_trait::async_trait;
use serde::Serialize;

use crate::core::{Group, Metadata, Project, ServiceError};

pub mod http;

pub use http::{HttpContactService, HttpProjectService};

/// Body of `POST /projects`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub access_token: String,
    #[serde(rename = "linkedGroup")]
    pub linked_group: Group,
    pub users: Vec<String>,
}

/// Body of `POST /projects/changeGroup/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeGroupRequest {
    pub name: String,
    pub access_token: String,
    #[serde(rename = "newGroupName")]
    pub new_group_name: String,
    #[serde(rename = "newGroupId")]
    pub new_group_id: String,
}

/// Body of `POST /projects/changeMetadata/`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeMetadataRequest {
    pub access_token: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "oldMetadata")]
    pub old_metadata: Option<Metadata>,
    #[serde(rename = "newMetadata")]
    pub new_metadata: Metadata,
}

#[async_trait]
pub trait ProjectService: Send + Sync {
    async fn list_projects(&self, token: Option<&str>) -> Result<Vec<Project>, ServiceError>;
    async fn create_project(&self, request: &CreateProjectRequest) -> Result<(), ServiceError>;
    async fn delete_project(&self, name: &str, token: Option<&str>) -> Result<(), ServiceError>;
    async fn change_group(&self, request: &ChangeGroupRequest) -> Result<Project, ServiceError>;
    async fn change_metadata(&self, request: &ChangeMetadataRequest) -> Result<(), ServiceError>;
}

#[async_trait]
pub trait ContactService: Send + Sync {
    async fn list_groups(&self, token: Option<&str>) -> Result<Vec<Group>, ServiceError>;

    /// Display names of the members of the group called `group_name`.
    async fn group_members(
        &self,
        group_name: &str,
        token: Option<&str>,
    ) -> Result<Vec<String>, ServiceError>;
}
