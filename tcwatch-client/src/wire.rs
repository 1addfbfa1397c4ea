//! TeamCity REST wire format
//!
//! Response bodies as the server sends them, and their conversion into core
//! domain types. Only the fields requested through `fields=` are modelled.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tcwatch_core::domain::build::{Build, BuildId, BuildState, BuildStatus};
use tcwatch_core::domain::project::{BuildConfiguration, BuildConfigurationId, Project, ProjectId};

use crate::error::{ClientError, Result};

/// Timestamp format used in responses and `sinceDate:` locators
pub const DATE_FORMAT: &str = "%Y%m%dT%H%M%S%z";

/// `fields=` selector for a single project
pub const PROJECT_FIELDS: &str = "id,name,parentProjectId,archived,\
    buildTypes(buildType(id,name,projectId,paused)),\
    projects(project(id,name,parentProjectId,archived))";

/// `fields=` selector for a single build
pub const BUILD_FIELDS: &str = "id,buildTypeId,number,state,status,statusText,branchName,\
    startDate,webUrl,canceledInfo(timestamp),lastChanges(change(username))";

/// `fields=` selector for a build list
pub fn build_list_fields() -> String {
    format!("count,build({BUILD_FIELDS})")
}

pub fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_str(value, DATE_FORMAT)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| ClientError::ParseError(format!("Invalid date `{}`: {}", value, e)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDto {
    pub id: String,
    pub name: String,
    pub parent_project_id: Option<String>,
    #[serde(default)]
    pub archived: bool,
    pub build_types: Option<BuildTypesDto>,
    pub projects: Option<ProjectsDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectsDto {
    #[serde(default)]
    pub project: Vec<ProjectDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTypesDto {
    #[serde(default)]
    pub build_type: Vec<BuildTypeDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildTypeDto {
    pub id: String,
    pub name: String,
    pub project_id: String,
    #[serde(default)]
    pub paused: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildsDto {
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub build: Vec<BuildDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDto {
    pub id: u64,
    pub build_type_id: String,
    pub number: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    pub status_text: Option<String>,
    pub branch_name: Option<String>,
    pub start_date: Option<String>,
    pub web_url: Option<String>,
    pub canceled_info: Option<serde_json::Value>,
    pub last_changes: Option<ChangesDto>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangesDto {
    #[serde(default)]
    pub change: Vec<ChangeDto>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeDto {
    pub username: Option<String>,
}

impl ProjectDto {
    pub fn into_project(self) -> Project {
        Project {
            id: ProjectId::new(self.id),
            name: self.name,
            parent_id: self.parent_project_id.map(ProjectId::new),
            archived: self.archived,
        }
    }

    /// Splits a fully expanded project into itself, its configurations and its children
    pub fn into_parts(mut self) -> (Project, Vec<BuildConfiguration>, Vec<Project>) {
        let configurations = self
            .build_types
            .take()
            .unwrap_or_default()
            .build_type
            .into_iter()
            .map(BuildTypeDto::into_configuration)
            .collect();
        let children = self
            .projects
            .take()
            .unwrap_or_default()
            .project
            .into_iter()
            .map(ProjectDto::into_project)
            .collect();

        (self.into_project(), configurations, children)
    }
}

impl BuildTypeDto {
    pub fn into_configuration(self) -> BuildConfiguration {
        BuildConfiguration {
            id: BuildConfigurationId::new(self.id),
            name: self.name,
            project_id: ProjectId::new(self.project_id),
            paused: self.paused,
        }
    }
}

impl BuildDto {
    pub fn into_build(self) -> Result<Build> {
        let canceled = self.canceled_info.is_some();

        let state = match self.state.as_deref() {
            Some("queued") => BuildState::Queued,
            Some("running") => BuildState::Running,
            Some("finished") if canceled => BuildState::Canceled,
            Some("finished") => BuildState::Finished,
            Some("deleted") => BuildState::Deleted,
            _ => BuildState::Unknown,
        };

        // A canceled build keeps whatever status it had; report none instead
        let status = if state == BuildState::Canceled {
            None
        } else {
            self.status.as_deref().map(parse_status)
        };

        let start_date = self.start_date.as_deref().map(parse_date).transpose()?;

        let last_author = self
            .last_changes
            .and_then(|changes| changes.change.into_iter().next())
            .and_then(|change| change.username);

        Ok(Build {
            id: BuildId(self.id),
            configuration_id: BuildConfigurationId::new(self.build_type_id),
            number: self.number,
            state,
            status,
            status_text: self.status_text,
            branch_name: self.branch_name,
            start_date,
            web_url: self.web_url,
            last_author,
        })
    }
}

fn parse_status(value: &str) -> BuildStatus {
    match value {
        "SUCCESS" => BuildStatus::Success,
        "FAILURE" => BuildStatus::Failure,
        "ERROR" => BuildStatus::Error,
        _ => BuildStatus::Unknown,
    }
}
