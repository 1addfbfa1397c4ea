//! In-memory CI backend for tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use tcwatch_client::{BuildQuery, CiBackend, ClientError, ProjectContents, Result};
use tcwatch_core::domain::build::{Build, BuildId, BuildState, BuildStatus};
use tcwatch_core::domain::project::{BuildConfiguration, BuildConfigurationId, Project, ProjectId};

#[derive(Default)]
struct FakeState {
    projects: BTreeMap<ProjectId, Project>,
    children: BTreeMap<ProjectId, Vec<ProjectId>>,
    configurations: BTreeMap<ProjectId, Vec<BuildConfiguration>>,
    builds: BTreeMap<BuildId, Build>,
    failing_configurations: BTreeSet<BuildConfigurationId>,
    failing_builds: BTreeSet<BuildId>,
    fail_projects: bool,
    project_queries: usize,
    build_queries: usize,
    running_queries: usize,
}

/// Scriptable CI server
///
/// Build queries honour `since` on start dates: builds that have not started
/// yet are always returned.
#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_project(&self, id: &str, parent: Option<&str>) -> Project {
        let mut state = self.state.lock().unwrap();
        let mut project = Project::new(ProjectId::new(id), id);
        if let Some(parent) = parent {
            project = project.with_parent(ProjectId::new(parent));
            state
                .children
                .entry(ProjectId::new(parent))
                .or_default()
                .push(project.id.clone());
        }
        state.projects.insert(project.id.clone(), project.clone());
        project
    }

    pub fn add_configuration(&self, project: &str, id: &str) -> BuildConfiguration {
        let configuration = BuildConfiguration::new(
            BuildConfigurationId::new(id),
            id.to_lowercase(),
            ProjectId::new(project),
        );
        self.state
            .lock()
            .unwrap()
            .configurations
            .entry(ProjectId::new(project))
            .or_default()
            .push(configuration.clone());
        configuration
    }

    /// Adds a build or replaces the server-side snapshot of an existing one
    pub fn put_build(&self, build: Build) {
        self.state.lock().unwrap().builds.insert(build.id, build);
    }

    /// Drops a build so that refreshing it yields "not found"
    pub fn delete_build(&self, id: BuildId) {
        self.state.lock().unwrap().builds.remove(&id);
    }

    pub fn fail_configuration(&self, id: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        let id = BuildConfigurationId::new(id);
        if failing {
            state.failing_configurations.insert(id);
        } else {
            state.failing_configurations.remove(&id);
        }
    }

    pub fn fail_build_refresh(&self, id: BuildId, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing_builds.insert(id);
        } else {
            state.failing_builds.remove(&id);
        }
    }

    pub fn fail_projects(&self, failing: bool) {
        self.state.lock().unwrap().fail_projects = failing;
    }

    /// Requests made against any project endpoint
    pub fn project_queries(&self) -> usize {
        self.state.lock().unwrap().project_queries
    }

    pub fn build_queries(&self) -> usize {
        self.state.lock().unwrap().build_queries
    }

    pub fn running_queries(&self) -> usize {
        self.state.lock().unwrap().running_queries
    }

    fn project_guard(state: &mut FakeState, id: &ProjectId) -> Result<()> {
        state.project_queries += 1;
        if state.fail_projects {
            return Err(ClientError::api_error(503, "project tree unavailable"));
        }
        if !state.projects.contains_key(id) {
            return Err(ClientError::NotFound(format!("project {}", id)));
        }
        Ok(())
    }

    fn configuration_guard(state: &FakeState, id: &BuildConfigurationId) -> Result<()> {
        if state.failing_configurations.contains(id) {
            return Err(ClientError::api_error(500, format!("builds of {} unavailable", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl CiBackend for FakeBackend {
    async fn list_root_projects(&self) -> Result<Vec<Project>> {
        let root = ProjectId::root();
        self.get_project(&root).await.map(|project| vec![project])
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Project> {
        let mut state = self.state.lock().unwrap();
        Self::project_guard(&mut state, id)?;
        Ok(state.projects[id].clone())
    }

    async fn get_build_configurations(&self, project: &Project) -> Result<Vec<BuildConfiguration>> {
        let mut state = self.state.lock().unwrap();
        Self::project_guard(&mut state, &project.id)?;
        Ok(state
            .configurations
            .get(&project.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_child_projects(&self, project: &Project) -> Result<Vec<Project>> {
        let mut state = self.state.lock().unwrap();
        Self::project_guard(&mut state, &project.id)?;
        Ok(state
            .children
            .get(&project.id)
            .map(|ids| ids.iter().map(|id| state.projects[id].clone()).collect())
            .unwrap_or_default())
    }

    async fn get_project_contents(&self, project: &Project) -> Result<ProjectContents> {
        let mut state = self.state.lock().unwrap();
        Self::project_guard(&mut state, &project.id)?;
        Ok(ProjectContents {
            configurations: state
                .configurations
                .get(&project.id)
                .cloned()
                .unwrap_or_default(),
            children: state
                .children
                .get(&project.id)
                .map(|ids| ids.iter().map(|id| state.projects[id].clone()).collect())
                .unwrap_or_default(),
        })
    }

    async fn query_builds(&self, query: &BuildQuery) -> Result<Vec<Build>> {
        let mut state = self.state.lock().unwrap();
        state.build_queries += 1;
        Self::configuration_guard(&state, &query.configuration_id)?;
        Ok(state
            .builds
            .values()
            .rev()
            .filter(|build| build.configuration_id == query.configuration_id)
            .filter(|build| build.start_date.is_none_or(|start| start >= query.since))
            .cloned()
            .collect())
    }

    async fn query_running_builds(
        &self,
        configuration_id: &BuildConfigurationId,
    ) -> Result<Vec<Build>> {
        let mut state = self.state.lock().unwrap();
        state.running_queries += 1;
        Self::configuration_guard(&state, configuration_id)?;
        Ok(state
            .builds
            .values()
            .rev()
            .filter(|build| &build.configuration_id == configuration_id && build.is_running())
            .cloned()
            .collect())
    }

    async fn get_build(&self, id: BuildId) -> Result<Build> {
        let state = self.state.lock().unwrap();
        if state.failing_builds.contains(&id) {
            return Err(ClientError::api_error(502, format!("build {} unavailable", id)));
        }
        state
            .builds
            .get(&id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("build {}", id)))
    }
}

/// Build snapshot with the fields the watcher looks at
pub fn build(
    id: u64,
    configuration: &str,
    state: BuildState,
    start_date: Option<DateTime<Utc>>,
) -> Build {
    let mut build = Build::new(BuildId(id), BuildConfigurationId::new(configuration), state);
    build.start_date = start_date;
    if state != BuildState::Canceled {
        build.status = Some(BuildStatus::Success);
    }
    build
}
