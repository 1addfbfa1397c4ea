//! Project-related API endpoints

use tcwatch_core::domain::project::{BuildConfiguration, Project, ProjectId};
use tracing::debug;

use crate::TeamCityClient;
use crate::error::Result;
use crate::wire::{PROJECT_FIELDS, ProjectDto};

impl TeamCityClient {
    // =============================================================================
    // Project Tree
    // =============================================================================

    /// Fetch a project with its build configurations and direct children
    ///
    /// # Arguments
    /// * `id` - The project id
    ///
    /// # Returns
    /// The project, its build configurations in server order, and its child projects
    pub async fn fetch_project(
        &self,
        id: &ProjectId,
    ) -> Result<(Project, Vec<BuildConfiguration>, Vec<Project>)> {
        let url = self.rest_url(&format!("projects/id:{}", id));
        debug!("Fetching project {}", id);

        let response = self
            .get(&url)
            .query(&[("fields", PROJECT_FIELDS)])
            .send()
            .await?;

        let dto: ProjectDto = self.handle_response(response).await?;
        Ok(dto.into_parts())
    }
}
