//! Project domain model
//!
//! Projects form a tree on the CI server. Each project owns a list of build
//! configurations.

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// External identifier of a project (e.g. `_Root`, `Kotlin_dev`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Id of the server-wide root project
    pub const ROOT: &'static str = "_Root";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The global root project every other project descends from
    pub fn root() -> Self {
        Self::new(Self::ROOT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// External identifier of a build configuration (TeamCity "build type")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildConfigurationId(String);

impl BuildConfigurationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BuildConfigurationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A project on the CI server
///
/// Two `Project` values are equal when their ids are equal, whatever the
/// other fields say. Different fetches of the same project are the same project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier for the project
    pub id: ProjectId,

    /// Human readable project name
    pub name: String,

    /// Parent project, `None` only for the global root
    pub parent_id: Option<ProjectId>,

    /// Archived projects still show up in the tree but never run builds
    pub archived: bool,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
            archived: false,
        }
    }

    pub fn with_parent(mut self, parent_id: ProjectId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Project {}

impl Hash for Project {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// A build configuration, owned by exactly one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfiguration {
    pub id: BuildConfigurationId,
    pub name: String,
    pub project_id: ProjectId,
    pub paused: bool,
}

impl BuildConfiguration {
    pub fn new(id: BuildConfigurationId, name: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            id,
            name: name.into(),
            project_id,
            paused: false,
        }
    }
}

impl PartialEq for BuildConfiguration {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for BuildConfiguration {}

impl Hash for BuildConfiguration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}
