//! Build domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

use crate::domain::project::BuildConfigurationId;

/// Build identifier
///
/// The server hands out build ids in strictly increasing order, so the
/// numeric value doubles as a "seen before" ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub u64);

impl BuildId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildState {
    Queued,
    Running,
    Finished,
    Canceled,
    Deleted,
    Unknown,
}

impl BuildState {
    pub fn is_running(self) -> bool {
        matches!(self, BuildState::Running)
    }

    /// Every state other than `Running` ends the tracking of a build
    pub fn is_terminal(self) -> bool {
        !self.is_running()
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildState::Queued => write!(f, "QUEUED"),
            BuildState::Running => write!(f, "RUNNING"),
            BuildState::Finished => write!(f, "FINISHED"),
            BuildState::Canceled => write!(f, "CANCELED"),
            BuildState::Deleted => write!(f, "DELETED"),
            BuildState::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Outcome reported by the server
///
/// Running builds already carry one: it flips to `Failure` as soon as a step
/// fails, before the build finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuildStatus {
    Success,
    Failure,
    Error,
    Unknown,
}

impl std::fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildStatus::Success => write!(f, "SUCCESS"),
            BuildStatus::Failure => write!(f, "FAILURE"),
            BuildStatus::Error => write!(f, "ERROR"),
            BuildStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Snapshot of a build as fetched from the server
///
/// Snapshots are never updated in place. A newer fetch of the same build
/// replaces the old value. Equality is by `id` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Build {
    pub id: BuildId,
    pub configuration_id: BuildConfigurationId,
    pub number: Option<String>,
    pub state: BuildState,

    /// Absent for canceled builds
    pub status: Option<BuildStatus>,
    pub status_text: Option<String>,
    pub branch_name: Option<String>,

    /// Absent until the build leaves the queue
    pub start_date: Option<DateTime<Utc>>,
    pub web_url: Option<String>,
    pub last_author: Option<String>,
}

impl Build {
    /// Creates a bare build snapshot with only the required fields set
    pub fn new(id: BuildId, configuration_id: BuildConfigurationId, state: BuildState) -> Self {
        Self {
            id,
            configuration_id,
            number: None,
            state,
            status: None,
            status_text: None,
            branch_name: None,
            start_date: None,
            web_url: None,
            last_author: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Returns a copy of this snapshot in a different state
    pub fn with_state(&self, state: BuildState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }
}

impl PartialEq for Build {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Build {}

impl Hash for Build {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Build {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "build {} #{} of {} [{}",
            self.id,
            self.number.as_deref().unwrap_or("?"),
            self.configuration_id,
            self.state
        )?;
        match self.status {
            Some(status) => write!(f, "/{}]", status),
            None => write!(f, "]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_running_is_non_terminal() {
        assert!(!BuildState::Running.is_terminal());
        for state in [
            BuildState::Queued,
            BuildState::Finished,
            BuildState::Canceled,
            BuildState::Deleted,
            BuildState::Unknown,
        ] {
            assert!(state.is_terminal(), "{state} should be terminal");
        }
    }

    #[test]
    fn test_snapshots_of_same_build_are_equal() {
        let cfg = BuildConfigurationId::new("Kotlin_dev");
        let mut running = Build::new(BuildId(42), cfg.clone(), BuildState::Running);
        running.status = Some(BuildStatus::Success);
        let finished = running.with_state(BuildState::Finished);

        assert_eq!(running, finished);
        assert_eq!(finished.state, BuildState::Finished);
        assert_eq!(running.state, BuildState::Running);
        assert_ne!(running, Build::new(BuildId(43), cfg, BuildState::Running));
    }

    #[test]
    fn test_build_id_ordering() {
        assert!(BuildId(7) > BuildId(5));
        assert_eq!(BuildId::default(), BuildId(0));
    }

    #[test]
    fn test_display() {
        let mut build = Build::new(
            BuildId(5),
            BuildConfigurationId::new("Kotlin_dev"),
            BuildState::Running,
        );
        build.number = Some("1.3.50-dev-12".to_string());
        assert_eq!(
            build.to_string(),
            "build 5 #1.3.50-dev-12 of Kotlin_dev [RUNNING]"
        );
        build.status = Some(BuildStatus::Failure);
        assert_eq!(
            build.to_string(),
            "build 5 #1.3.50-dev-12 of Kotlin_dev [RUNNING/FAILURE]"
        );
    }
}
