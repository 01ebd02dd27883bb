use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ConfigError;

/// Opaque key-value payload attached to a project.
pub type Metadata = Map<String, Value>;

/// Listing mode of the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Only projects the current user is a member of
    #[default]
    Mine,
    /// Every project known to the service
    All,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Mine => "mine",
            Scope::All => "all",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mine" | "my" => Ok(Scope::Mine),
            "all" => Ok(Scope::All),
            other => Err(ConfigError::UnknownScope(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,

    #[serde(default)]
    pub is_member: bool,

    #[serde(rename = "groupName", default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,

    #[serde(rename = "groupIdentifier", default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Project {
    pub fn new(name: impl Into<String>, is_member: bool) -> Self {
        Self {
            name: name.into(),
            is_member,
            group_name: None,
            group_id: None,
            metadata: None,
        }
    }

    pub fn with_group(mut self, group: &Group) -> Self {
        self.group_name = Some(group.name.clone());
        self.group_id = Some(group.id.clone());
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Merges `update` into the project's metadata, later keys overwrite earlier ones.
    pub fn merge_metadata(&mut self, update: &Metadata) {
        let metadata = self.metadata.get_or_insert_with(Map::new);
        for (key, value) in update {
            metadata.insert(key.clone(), value.clone());
        }
    }
}

/// Group from the contact directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
}

impl Group {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
