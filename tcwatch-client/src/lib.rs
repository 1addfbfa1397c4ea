//! tcwatch HTTP Client
//!
//! A small, type-safe client for the parts of the TeamCity REST API the build
//! watcher needs: the project tree, build queries and single-build refreshes.
//!
//! The watcher depends on the [`CiBackend`] trait rather than on
//! [`TeamCityClient`] directly, so any server that can answer those queries
//! can be watched.
//!
//! # Example
//!
//! ```no_run
//! use tcwatch_client::{CiBackend, Credentials, TeamCityClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = TeamCityClient::new("https://teamcity.jetbrains.com", Credentials::Guest);
//!
//!     for project in client.list_root_projects().await? {
//!         println!("Root project: {}", project);
//!     }
//!     Ok(())
//! }
//! ```

mod backend;
mod builds;
pub mod error;
mod projects;
pub mod wire;

// Re-export commonly used types
pub use backend::{BuildQuery, CiBackend, ProjectContents};
pub use error::{ClientError, Result};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tcwatch_core::domain::build::{Build, BuildId};
use tcwatch_core::domain::project::{BuildConfiguration, BuildConfigurationId, Project, ProjectId};

/// How requests authenticate against the server
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Anonymous read access (`/guestAuth`)
    Guest,

    /// HTTP basic authentication (`/httpAuth`)
    User { username: String, password: String },
}

impl Credentials {
    /// Path prefix TeamCity uses to pick the authentication scheme
    fn path_prefix(&self) -> &'static str {
        match self {
            Credentials::Guest => "guestAuth",
            Credentials::User { .. } => "httpAuth",
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Guest => write!(f, "Guest"),
            Credentials::User { username, .. } => f
                .debug_struct("User")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// HTTP client for the TeamCity REST API
#[derive(Debug, Clone)]
pub struct TeamCityClient {
    /// Base URL of the server (e.g., "https://teamcity.example.com")
    base_url: String,
    credentials: Credentials,
    /// HTTP client instance
    client: Client,
}

impl TeamCityClient {
    /// Create a new TeamCity client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the server (e.g., "https://teamcity.example.com")
    /// * `credentials` - Guest access or a user/password pair
    ///
    /// # Example
    /// ```
    /// use tcwatch_client::{Credentials, TeamCityClient};
    ///
    /// let client = TeamCityClient::new("https://teamcity.example.com", Credentials::Guest);
    /// ```
    pub fn new(base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self::with_client(base_url, credentials, Client::new())
    }

    /// Create a new TeamCity client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    pub fn with_client(
        base_url: impl Into<String>,
        credentials: Credentials,
        client: Client,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            client,
        }
    }

    /// Get the base URL of the server
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of a REST resource, e.g. `rest_url("builds/id:5")`
    pub(crate) fn rest_url(&self, resource: &str) -> String {
        format!(
            "{}/{}/app/rest/{}",
            self.base_url,
            self.credentials.path_prefix(),
            resource
        )
    }

    /// Starts a GET request with JSON accept header and credentials applied
    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");

        match &self.credentials {
            Credentials::Guest => request,
            Credentials::User { username, password } => {
                request.basic_auth(username, Some(password))
            }
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    pub(crate) async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ClientError::NotFound(error_text));
            }
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}

#[async_trait]
impl CiBackend for TeamCityClient {
    async fn list_root_projects(&self) -> Result<Vec<Project>> {
        let root = self.get_project(&ProjectId::root()).await?;
        Ok(vec![root])
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Project> {
        let (project, _, _) = self.fetch_project(id).await?;
        Ok(project)
    }

    async fn get_build_configurations(&self, project: &Project) -> Result<Vec<BuildConfiguration>> {
        let (_, configurations, _) = self.fetch_project(&project.id).await?;
        Ok(configurations)
    }

    async fn get_child_projects(&self, project: &Project) -> Result<Vec<Project>> {
        let (_, _, children) = self.fetch_project(&project.id).await?;
        Ok(children)
    }

    async fn get_project_contents(&self, project: &Project) -> Result<ProjectContents> {
        let (_, configurations, children) = self.fetch_project(&project.id).await?;
        Ok(ProjectContents {
            configurations,
            children,
        })
    }

    async fn query_builds(&self, query: &BuildQuery) -> Result<Vec<Build>> {
        self.fetch_builds(&builds::since_locator(query)).await
    }

    async fn query_running_builds(
        &self,
        configuration_id: &BuildConfigurationId,
    ) -> Result<Vec<Build>> {
        self.fetch_builds(&builds::running_locator(configuration_id))
            .await
    }

    async fn get_build(&self, id: BuildId) -> Result<Build> {
        self.fetch_build(id).await
    }
}
