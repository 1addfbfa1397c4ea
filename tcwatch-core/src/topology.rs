//! Project topology
//!
//! A `TopologySnapshot` maps every watched project to its build
//! configurations. Snapshots are built once, then published behind an `Arc`
//! and never touched again: a newer topology replaces the whole value.

use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::project::{BuildConfiguration, BuildConfigurationId, Project, ProjectId};

/// How far topology discovery descends from the configured roots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CascadeMode {
    /// Only the root projects themselves
    #[default]
    OnlyRoot,

    /// The roots and all of their descendants
    Recursive,
}

impl std::fmt::Display for CascadeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CascadeMode::OnlyRoot => write!(f, "only-root"),
            CascadeMode::Recursive => write!(f, "recursive"),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown cascade mode `{0}`, expected `only-root` or `recursive`")]
pub struct ParseCascadeModeError(String);

impl FromStr for CascadeMode {
    type Err = ParseCascadeModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "only-root" => Ok(CascadeMode::OnlyRoot),
            "recursive" | "recursively" => Ok(CascadeMode::Recursive),
            _ => Err(ParseCascadeModeError(s.to_string())),
        }
    }
}

/// A project together with its build configurations, in server order
#[derive(Debug, Clone)]
pub struct ProjectTopology {
    pub project: Project,
    pub configurations: Vec<BuildConfiguration>,
}

/// Immutable project to build configuration mapping
#[derive(Debug, Clone, Default)]
pub struct TopologySnapshot {
    projects: BTreeMap<ProjectId, ProjectTopology>,
}

impl TopologySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a project and its configurations
    ///
    /// Used while a snapshot is being assembled. A project that is already
    /// present is replaced.
    pub fn insert(&mut self, project: Project, configurations: Vec<BuildConfiguration>) {
        self.projects.insert(
            project.id.clone(),
            ProjectTopology {
                project,
                configurations,
            },
        );
    }

    pub fn contains_project(&self, id: &ProjectId) -> bool {
        self.projects.contains_key(id)
    }

    pub fn get(&self, id: &ProjectId) -> Option<&ProjectTopology> {
        self.projects.get(id)
    }

    pub fn projects(&self) -> impl Iterator<Item = &ProjectTopology> {
        self.projects.values()
    }

    /// Every (project, configuration) pair, in project id then server order
    pub fn contexts(&self) -> impl Iterator<Item = (&Project, &BuildConfiguration)> {
        self.projects.values().flat_map(|entry| {
            entry
                .configurations
                .iter()
                .map(move |configuration| (&entry.project, configuration))
        })
    }

    pub fn contains_configuration(&self, id: &BuildConfigurationId) -> bool {
        self.contexts().any(|(_, configuration)| &configuration.id == id)
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn configuration_count(&self) -> usize {
        self.projects
            .values()
            .map(|entry| entry.configurations.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}
