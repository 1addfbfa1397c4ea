//! CI backend abstraction
//!
//! The watcher only talks to the CI server through this trait. `TeamCityClient`
//! is the production implementation; tests plug in an in-memory fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tcwatch_core::domain::build::{Build, BuildId};
use tcwatch_core::domain::project::{BuildConfiguration, BuildConfigurationId, Project, ProjectId};

use crate::error::Result;

/// Query for the builds of one configuration that changed since a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildQuery {
    pub configuration_id: BuildConfigurationId,
    pub since: DateTime<Utc>,
    pub include_canceled: bool,
    pub include_failed: bool,
    pub include_running: bool,
    pub all_branches: bool,
}

impl BuildQuery {
    /// Every build of `configuration_id` since `since`: canceled, failed and
    /// running builds included, on all branches
    pub fn since(configuration_id: BuildConfigurationId, since: DateTime<Utc>) -> Self {
        Self {
            configuration_id,
            since,
            include_canceled: true,
            include_failed: true,
            include_running: true,
            all_branches: true,
        }
    }
}

/// Configurations and direct children of one project
#[derive(Debug, Clone, Default)]
pub struct ProjectContents {
    pub configurations: Vec<BuildConfiguration>,
    pub children: Vec<Project>,
}

/// Read-only view of a CI server
#[async_trait]
pub trait CiBackend: Send + Sync {
    /// Returns the top-level projects of the server
    async fn list_root_projects(&self) -> Result<Vec<Project>>;

    /// Fetches a single project by id
    async fn get_project(&self, id: &ProjectId) -> Result<Project>;

    /// Lists the build configurations that belong directly to `project`
    async fn get_build_configurations(&self, project: &Project) -> Result<Vec<BuildConfiguration>>;

    /// Lists the direct children of `project`
    async fn get_child_projects(&self, project: &Project) -> Result<Vec<Project>>;

    /// Fetches the configurations and the children of `project` together
    ///
    /// Backends that serve both from one response should override this so
    /// a recursive walk costs one request per project.
    async fn get_project_contents(&self, project: &Project) -> Result<ProjectContents> {
        Ok(ProjectContents {
            configurations: self.get_build_configurations(project).await?,
            children: self.get_child_projects(project).await?,
        })
    }

    /// Fetches builds matching `query`
    async fn query_builds(&self, query: &BuildQuery) -> Result<Vec<Build>>;

    /// Fetches the builds of a configuration that are running right now
    async fn query_running_builds(&self, configuration_id: &BuildConfigurationId)
    -> Result<Vec<Build>>;

    /// Fetches the current snapshot of a single build
    async fn get_build(&self, id: BuildId) -> Result<Build>;
}
