use crate::core::{Project, Scope};

/// Scope plus search text applied to the canonical project set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryFilter {
    pub scope: Scope,
    pub search: String,
}

impl DirectoryFilter {
    pub fn new(scope: Scope, search: impl Into<String>) -> Self {
        Self {
            scope,
            search: search.into(),
        }
    }

    pub fn matches(&self, project: &Project) -> bool {
        if self.scope == Scope::Mine && !project.is_member {
            return false;
        }
        if self.search.is_empty() {
            return true;
        }
        project
            .name
            .to_lowercase()
            .contains(&self.search.to_lowercase())
    }

    /// Projects of `canonical` passing the filter, in canonical order.
    pub fn apply(&self, canonical: &[Project]) -> Vec<Project> {
        canonical
            .iter()
            .filter(|project| self.matches(project))
            .cloned()
            .collect()
    }
}
