//! Watcher configuration
//!
//! Defines all configurable parameters for the watcher: the server to poll,
//! how to authenticate, which part of the project tree to watch and how
//! often to poll.

use std::time::Duration;

use tcwatch_client::Credentials;
use tcwatch_core::domain::project::ProjectId;
use tcwatch_core::topology::CascadeMode;

use crate::error::{Result, WatchError};

/// Default period of the update loop (new and finished builds)
pub const DEFAULT_UPDATES_DELAY_MS: i64 = 30_000;

/// Default period of the topology loop (project tree)
pub const DEFAULT_PROJECTS_DELAY_MS: i64 = 600_000;

/// Watcher configuration
///
/// Poll periods are kept in signed milliseconds as they come from the
/// outside world; `validate` rejects negative values.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server base URL (e.g., "https://teamcity.example.com")
    pub server_url: String,

    /// Guest access or a user/password pair
    pub credentials: Credentials,

    /// Projects to watch; empty means the server-wide root project
    pub root_project_ids: Vec<ProjectId>,

    /// Whether child projects of the roots are watched as well
    pub cascade_mode: CascadeMode,

    /// How often to look for new builds and re-check running ones
    pub updates_delay_ms: i64,

    /// How often to rebuild the project topology
    pub projects_delay_ms: i64,

    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            credentials: Credentials::Guest,
            root_project_ids: Vec::new(),
            cascade_mode: CascadeMode::OnlyRoot,
            updates_delay_ms: DEFAULT_UPDATES_DELAY_MS,
            projects_delay_ms: DEFAULT_PROJECTS_DELAY_MS,
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_root_projects(mut self, root_project_ids: Vec<ProjectId>) -> Self {
        self.root_project_ids = root_project_ids;
        self
    }

    pub fn with_cascade_mode(mut self, cascade_mode: CascadeMode) -> Self {
        self.cascade_mode = cascade_mode;
        self
    }

    pub fn with_delays(mut self, updates_delay_ms: i64, projects_delay_ms: i64) -> Self {
        self.updates_delay_ms = updates_delay_ms;
        self.projects_delay_ms = projects_delay_ms;
        self
    }

    /// Period of the update loop
    pub fn updates_delay(&self) -> Duration {
        millis(self.updates_delay_ms)
    }

    /// Period of the topology loop
    pub fn projects_delay(&self) -> Duration {
        millis(self.projects_delay_ms)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(WatchError::invalid_configuration(
                "server_url cannot be empty",
            ));
        }

        if !self.server_url.starts_with("http://") && !self.server_url.starts_with("https://") {
            return Err(WatchError::invalid_configuration(
                "server_url must start with http:// or https://",
            ));
        }

        if self.updates_delay_ms < 0 {
            return Err(WatchError::invalid_configuration(format!(
                "updates delay is negative: {}ms",
                self.updates_delay_ms
            )));
        }

        if self.projects_delay_ms < 0 {
            return Err(WatchError::invalid_configuration(format!(
                "projects delay is negative: {}ms",
                self.projects_delay_ms
            )));
        }

        if let Credentials::User { username, password } = &self.credentials {
            if username.is_empty() {
                return Err(WatchError::invalid_configuration("username cannot be empty"));
            }
            if password.is_empty() {
                return Err(WatchError::invalid_configuration(format!(
                    "password is required for user `{}`",
                    username
                )));
            }
        }

        Ok(())
    }
}

fn millis(value: i64) -> Duration {
    Duration::from_millis(u64::try_from(value).unwrap_or(0))
}

/// Splits raw root project arguments on whitespace and commas
///
/// Accepts both repeated flags and a single space separated list, as found
/// in an environment variable.
pub fn parse_project_ids<S: AsRef<str>>(values: &[S]) -> Vec<ProjectId> {
    let mut ids: Vec<ProjectId> = Vec::new();
    for value in values {
        for id in value
            .as_ref()
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|id| !id.is_empty())
        {
            let id = ProjectId::new(id);
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::new("https://teamcity.example.com");
        assert_eq!(config.updates_delay(), Duration::from_secs(30));
        assert_eq!(config.projects_delay(), Duration::from_secs(600));
        assert_eq!(config.cascade_mode, CascadeMode::OnlyRoot);
        assert!(config.root_project_ids.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::new("https://teamcity.example.com");

        config.server_url = String::new();
        assert!(config.validate().is_err());

        config.server_url = "not-a-url".to_string();
        assert!(config.validate().is_err());

        config.server_url = "http://localhost:8111".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_negative_delays_are_rejected() {
        let config = Config::new("https://teamcity.example.com").with_delays(-1, 600_000);
        assert!(matches!(
            config.validate(),
            Err(WatchError::InvalidConfiguration(_))
        ));

        let config = Config::new("https://teamcity.example.com").with_delays(30_000, -5);
        assert!(matches!(
            config.validate(),
            Err(WatchError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_zero_delays_are_allowed() {
        let config = Config::new("https://teamcity.example.com").with_delays(0, 0);
        assert!(config.validate().is_ok());
        assert_eq!(config.updates_delay(), Duration::ZERO);
    }

    #[test]
    fn test_user_credentials_need_password() {
        let config = Config::new("https://teamcity.example.com").with_credentials(
            Credentials::User {
                username: "bot".to_string(),
                password: String::new(),
            },
        );
        assert!(config.validate().is_err());

        let config = config.with_credentials(Credentials::User {
            username: "bot".to_string(),
            password: "secret".to_string(),
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_project_ids() {
        let ids = parse_project_ids(&["Kotlin Kotlin_dev", "  Ktor,Kotlin ", ""]);
        let ids: Vec<&str> = ids.iter().map(ProjectId::as_str).collect();
        assert_eq!(ids, vec!["Kotlin", "Kotlin_dev", "Ktor"]);
    }
}
