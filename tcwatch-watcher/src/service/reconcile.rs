//! Reconcile service
//!
//! Re-checks every build in the running registry. Builds that reached a
//! terminal state produce a `Finished` event and leave the registry; builds
//! still running stay, with their latest snapshot stored.
//!
//! Failures are per build: a build that could not be refreshed keeps its
//! entry and is retried on the next pass.

use std::sync::Arc;
use tracing::{debug, info, warn};

use tcwatch_client::CiBackend;
use tcwatch_core::domain::build::BuildState;
use tcwatch_core::domain::event::{BuildEvent, EventKind};

use crate::state::{RunningBuild, RunningRegistry};

/// Result of a reconcile pass
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// One `Finished` event per build that left the registry
    pub events: Vec<BuildEvent>,
    pub registry: RunningRegistry,
}

/// Tracks running builds until they finish
pub struct ReconcileService {
    backend: Arc<dyn CiBackend>,
}

impl ReconcileService {
    pub fn new(backend: Arc<dyn CiBackend>) -> Self {
        Self { backend }
    }

    /// Refreshes every build of `registry` and returns the updated registry
    pub async fn reconcile(&self, registry: &RunningRegistry) -> ReconcileOutcome {
        debug!("Start check running builds ({})", registry.len());

        let mut next = registry.clone();
        let mut events = Vec::new();

        for RunningBuild { context, build } in registry.iter() {
            let refreshed = match self.backend.get_build(build.id).await {
                Ok(refreshed) => refreshed,
                Err(e) if e.is_not_found() => {
                    info!("Build {} disappeared from the server", build.id);
                    next.remove(build.id);
                    events.push(BuildEvent::new(
                        EventKind::Finished,
                        context.clone(),
                        build.with_state(BuildState::Deleted),
                    ));
                    continue;
                }
                Err(e) => {
                    warn!("Failed to refresh build {}: {:#}", build.id, e);
                    continue;
                }
            };

            if refreshed.is_running() {
                if refreshed.status != build.status {
                    info!(
                        "Build {} status changed: {:?} -> {:?}",
                        build.id, build.status, refreshed.status
                    );
                }
                next.insert(context.clone(), refreshed);
                continue;
            }

            info!("Build finished {}", refreshed);
            next.remove(build.id);
            events.push(BuildEvent::new(EventKind::Finished, context.clone(), refreshed));
        }

        debug!(
            "End check running builds: {} finished, {} still running",
            events.len(),
            next.len()
        );

        ReconcileOutcome {
            events,
            registry: next,
        }
    }
}
