//! Build lifecycle events

use crate::domain::build::Build;
use crate::domain::project::{BuildConfiguration, Project};

/// The project and build configuration a build was discovered under
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildContext {
    pub project: Project,
    pub configuration: BuildConfiguration,
}

impl BuildContext {
    pub fn new(project: Project, configuration: BuildConfiguration) -> Self {
        Self {
            project,
            configuration,
        }
    }
}

/// Which lifecycle transition an event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// First time the build was seen, in whatever state it was in
    New,

    /// A tracked running build reached a terminal state
    Finished,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::New => write!(f, "new"),
            EventKind::Finished => write!(f, "finished"),
        }
    }
}

/// A build lifecycle event handed to every registered handler
#[derive(Debug, Clone)]
pub struct BuildEvent {
    pub kind: EventKind,
    pub context: BuildContext,
    pub build: Build,
}

impl BuildEvent {
    pub fn new(kind: EventKind, context: BuildContext, build: Build) -> Self {
        Self {
            kind,
            context,
            build,
        }
    }
}

impl std::fmt::Display for BuildEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} in {}",
            self.kind, self.build, self.context.project.id
        )
    }
}
