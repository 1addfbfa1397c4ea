//! Build-related API endpoints

use tcwatch_core::domain::build::{Build, BuildId};
use tcwatch_core::domain::project::BuildConfigurationId;
use tracing::debug;

use crate::TeamCityClient;
use crate::backend::BuildQuery;
use crate::error::Result;
use crate::wire::{self, BUILD_FIELDS, BuildDto, BuildsDto};

/// Builds requested per page of a build list
pub const PAGE_SIZE: usize = 100;

/// Locator for every build of a configuration changed since `query.since`
pub fn since_locator(query: &BuildQuery) -> String {
    let mut parts = vec![
        format!("buildType:(id:{})", query.configuration_id),
        format!("sinceDate:{}", wire::format_date(query.since)),
    ];

    if query.all_branches {
        parts.push("branch:default:any".to_string());
    }
    parts.push(if query.include_canceled { "canceled:any" } else { "canceled:false" }.to_string());
    parts.push(if query.include_running { "running:any" } else { "running:false" }.to_string());
    if !query.include_failed {
        parts.push("status:SUCCESS".to_string());
    }

    parts.join(",")
}

/// Locator for the running builds of a configuration, on all branches
pub fn running_locator(configuration_id: &BuildConfigurationId) -> String {
    format!(
        "buildType:(id:{}),running:true,branch:default:any",
        configuration_id
    )
}

fn paged(locator: &str, start: usize) -> String {
    format!("{},count:{},start:{}", locator, PAGE_SIZE, start)
}

impl TeamCityClient {
    // =============================================================================
    // Build Queries
    // =============================================================================

    /// Fetch every build matching a locator, following pages until exhausted
    ///
    /// # Arguments
    /// * `locator` - A TeamCity build locator without `count`/`start`
    ///
    /// # Returns
    /// All matching builds, newest first as the server orders them
    pub async fn fetch_builds(&self, locator: &str) -> Result<Vec<Build>> {
        let url = self.rest_url("builds");
        let fields = wire::build_list_fields();
        let mut builds = Vec::new();
        let mut start = 0;

        loop {
            let response = self
                .get(&url)
                .query(&[("locator", paged(locator, start)), ("fields", fields.clone())])
                .send()
                .await?;

            let page: BuildsDto = self.handle_response(response).await?;
            let received = page.build.len();

            for dto in page.build {
                builds.push(dto.into_build()?);
            }

            if received < PAGE_SIZE {
                break;
            }
            start += received;
        }

        debug!("Locator {} matched {} build(s)", locator, builds.len());
        Ok(builds)
    }

    /// Fetch the current snapshot of a build
    ///
    /// # Arguments
    /// * `id` - The build id
    ///
    /// # Returns
    /// The build, or `ClientError::NotFound` if it has been deleted
    pub async fn fetch_build(&self, id: BuildId) -> Result<Build> {
        let url = self.rest_url(&format!("builds/id:{}", id));
        let response = self
            .get(&url)
            .query(&[("fields", BUILD_FIELDS)])
            .send()
            .await?;

        let dto: BuildDto = self.handle_response(response).await?;
        dto.into_build()
    }
}
