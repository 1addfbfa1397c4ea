//! Discovery service
//!
//! Finds builds the watcher has not seen yet. A pass scans every
//! (project, configuration) pair of the topology, skips builds at or below
//! the watermark captured when the pass started, registers new running
//! builds, and produces one `New` event per new build.
//!
//! A configuration whose builds cannot be fetched is skipped and pinned in
//! the backlog at the watermark the pass started with. Later passes scan it
//! from there until a fetch succeeds, so its builds are neither lost nor
//! reported twice, and the other configurations are not held back.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use tcwatch_client::{BuildQuery, CiBackend};
use tcwatch_core::domain::build::{Build, BuildId};
use tcwatch_core::domain::event::{BuildContext, BuildEvent, EventKind};
use tcwatch_core::domain::project::BuildConfiguration;
use tcwatch_core::topology::TopologySnapshot;

use crate::state::{Backlog, RunningRegistry, Watermark};

/// Which builds a discovery pass asks the server for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Everything changed since the watermark: regular passes
    Updates,

    /// Only builds running right now: the seeding pass at startup
    Running,
}

/// Result of a discovery pass
#[derive(Debug)]
pub struct DiscoveryOutcome {
    /// One `New` event per new build, in configuration visiting order
    pub events: Vec<BuildEvent>,
    pub watermark: Watermark,
    pub backlog: Backlog,
    pub registry: RunningRegistry,
}

/// Incremental discovery of new builds
pub struct DiscoveryService {
    backend: Arc<dyn CiBackend>,
}

impl DiscoveryService {
    pub fn new(backend: Arc<dyn CiBackend>) -> Self {
        Self { backend }
    }

    /// Runs one discovery pass
    ///
    /// # Arguments
    /// * `topology` - Snapshot to scan, taken once by the caller
    /// * `watermark` - Watermark published by the previous pass
    /// * `backlog` - Configurations that failed in earlier passes
    /// * `registry` - Running registry published by the previous pass
    /// * `scan` - Regular update scan or startup seeding
    pub async fn discover(
        &self,
        topology: &TopologySnapshot,
        watermark: Watermark,
        backlog: &Backlog,
        registry: &RunningRegistry,
        scan: Scan,
    ) -> DiscoveryOutcome {
        debug!(
            "Start check new builds (lastId={}, time={}, backlog={}, scan={:?})",
            watermark.last_seen_id,
            watermark.last_update_time,
            backlog.len(),
            scan
        );

        let mut next_watermark = watermark;
        let mut backlog = backlog.clone();
        let mut registry = registry.clone();
        let mut events = Vec::new();
        let mut seen: HashSet<BuildId> = HashSet::new();

        backlog.retain(|id| topology.contains_configuration(id));

        for (project, configuration) in topology.contexts() {
            // Read once per pass: comparing against a watermark advanced
            // mid-pass would skip builds of configurations visited later.
            let baseline = backlog.baseline(&configuration.id, watermark);

            let builds = match self.fetch(configuration, baseline, scan).await {
                Ok(builds) => builds,
                Err(e) => {
                    warn!("Failed to check builds of {}: {:#}", configuration.id, e);
                    backlog.pin(configuration.id.clone(), baseline);
                    continue;
                }
            };

            if backlog.release(&configuration.id).is_some() {
                info!("Builds of {} are reachable again", configuration.id);
            }

            for build in builds {
                if build.id <= baseline.last_seen_id || !seen.insert(build.id) {
                    continue;
                }

                info!("New build {} in {}", build, project.id);

                next_watermark = next_watermark.advanced(
                    build.id,
                    build.start_date.unwrap_or(next_watermark.last_update_time),
                );

                let context = BuildContext::new(project.clone(), configuration.clone());
                if build.is_running() {
                    registry.insert(context.clone(), build.clone());
                }
                events.push(BuildEvent::new(EventKind::New, context, build));
            }
        }

        debug!(
            "End check new builds: {} new, watermark ({}, {}), {} in backlog",
            events.len(),
            next_watermark.last_seen_id,
            next_watermark.last_update_time,
            backlog.len()
        );

        DiscoveryOutcome {
            events,
            watermark: next_watermark,
            backlog,
            registry,
        }
    }

    async fn fetch(
        &self,
        configuration: &BuildConfiguration,
        baseline: Watermark,
        scan: Scan,
    ) -> tcwatch_client::Result<Vec<Build>> {
        match scan {
            Scan::Updates => {
                let query = BuildQuery::since(configuration.id.clone(), baseline.last_update_time);
                self.backend.query_builds(&query).await
            }
            Scan::Running => self.backend.query_running_builds(&configuration.id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBackend, build};
    use chrono::{DateTime, Duration, Utc};
    use tcwatch_core::domain::build::BuildState;
    use tcwatch_core::domain::project::{BuildConfigurationId, ProjectId};

    struct Fixture {
        backend: Arc<FakeBackend>,
        service: DiscoveryService,
        topology: TopologySnapshot,
        t0: DateTime<Utc>,
    }

    /// Root project with configurations A and B
    fn fixture() -> Fixture {
        let backend = Arc::new(FakeBackend::new());
        let root = backend.add_project("Root", None);
        let a = backend.add_configuration("Root", "A");
        let b = backend.add_configuration("Root", "B");

        let mut topology = TopologySnapshot::new();
        topology.insert(root, vec![a, b]);

        Fixture {
            service: DiscoveryService::new(backend.clone()),
            backend,
            topology,
            t0: Utc::now(),
        }
    }

    impl Fixture {
        /// Pass from a fresh watcher state
        async fn first_pass(&self, scan: Scan) -> DiscoveryOutcome {
            self.service
                .discover(
                    &self.topology,
                    Watermark::starting_at(self.t0),
                    &Backlog::new(),
                    &RunningRegistry::new(),
                    scan,
                )
                .await
        }

        /// Pass continuing from a previous outcome
        async fn next_pass(&self, previous: &DiscoveryOutcome) -> DiscoveryOutcome {
            self.service
                .discover(
                    &self.topology,
                    previous.watermark,
                    &previous.backlog,
                    &previous.registry,
                    Scan::Updates,
                )
                .await
        }
    }

    fn secs(t0: DateTime<Utc>, n: i64) -> Option<DateTime<Utc>> {
        Some(t0 + Duration::seconds(n))
    }

    fn ids(events: &[BuildEvent]) -> Vec<u64> {
        events.iter().map(|e| e.build.id.value()).collect()
    }

    #[tokio::test]
    async fn test_first_pass_reports_every_new_build() {
        let f = fixture();
        f.backend.put_build(build(5, "A", BuildState::Running, secs(f.t0, 1)));
        f.backend.put_build(build(7, "A", BuildState::Finished, secs(f.t0, 2)));

        let outcome = f.first_pass(Scan::Updates).await;

        let mut reported = ids(&outcome.events);
        reported.sort();
        assert_eq!(reported, vec![5, 7]);
        assert!(outcome.events.iter().all(|e| e.kind == EventKind::New));
        assert_eq!(outcome.registry.ids().collect::<Vec<_>>(), vec![BuildId(5)]);
        assert_eq!(outcome.watermark.last_seen_id, BuildId(7));
        assert_eq!(outcome.watermark.last_update_time, f.t0 + Duration::seconds(2));
        assert!(outcome.backlog.is_empty());
    }

    #[tokio::test]
    async fn test_builds_are_new_only_once() {
        let f = fixture();
        f.backend.put_build(build(5, "A", BuildState::Running, secs(f.t0, 1)));

        let first = f.first_pass(Scan::Updates).await;
        assert_eq!(ids(&first.events), vec![5]);

        // Same build still returned by the server, now with a later start
        f.backend.put_build(build(5, "A", BuildState::Running, secs(f.t0, 30)));
        f.backend.put_build(build(9, "B", BuildState::Queued, None));

        let second = f.next_pass(&first).await;
        assert_eq!(ids(&second.events), vec![9]);
        assert!(second.watermark.last_seen_id >= first.watermark.last_seen_id);
        assert!(second.watermark.last_update_time >= first.watermark.last_update_time);
    }

    #[tokio::test]
    async fn test_old_max_id_is_captured_once_per_pass() {
        // Configuration A yields 10, configuration B yields 8 in the same pass.
        // 8 is below the id reached while scanning A but above the watermark
        // the pass started with, so it is still new.
        let f = fixture();
        f.backend.put_build(build(10, "A", BuildState::Finished, secs(f.t0, 1)));
        f.backend.put_build(build(8, "B", BuildState::Finished, secs(f.t0, 1)));

        let outcome = f.first_pass(Scan::Updates).await;

        assert_eq!(ids(&outcome.events), vec![10, 8]);
        assert_eq!(outcome.watermark.last_seen_id, BuildId(10));
    }

    #[tokio::test]
    async fn test_watermark_time_never_regresses() {
        let f = fixture();
        let start = Watermark::starting_at(f.t0 + Duration::seconds(60));
        // Queued builds have no start date and are always returned
        f.backend.put_build(build(3, "A", BuildState::Queued, None));

        let outcome = f
            .service
            .discover(
                &f.topology,
                start,
                &Backlog::new(),
                &RunningRegistry::new(),
                Scan::Updates,
            )
            .await;

        assert_eq!(ids(&outcome.events), vec![3]);
        assert_eq!(outcome.watermark.last_update_time, start.last_update_time);
        assert_eq!(outcome.watermark.last_seen_id, BuildId(3));
    }

    #[tokio::test]
    async fn test_empty_topology_keeps_watermark() {
        let f = fixture();
        let start = Watermark::starting_at(f.t0);

        let outcome = f
            .service
            .discover(
                &TopologySnapshot::new(),
                start,
                &Backlog::new(),
                &RunningRegistry::new(),
                Scan::Updates,
            )
            .await;

        assert!(outcome.events.is_empty());
        assert_eq!(outcome.watermark, start);
        assert_eq!(f.backend.build_queries(), 0);
    }

    #[tokio::test]
    async fn test_terminal_builds_are_reported_but_not_registered() {
        let f = fixture();
        f.backend.put_build(build(4, "A", BuildState::Canceled, secs(f.t0, 1)));
        f.backend.put_build(build(6, "B", BuildState::Finished, secs(f.t0, 1)));

        let outcome = f.first_pass(Scan::Updates).await;

        assert_eq!(outcome.events.len(), 2);
        assert!(outcome.registry.is_empty());
        let canceled = &outcome.events[0];
        assert_eq!(canceled.build.state, BuildState::Canceled);
        assert_eq!(canceled.context.configuration.id.as_str(), "A");
        assert_eq!(canceled.context.project.id, ProjectId::new("Root"));
    }

    #[tokio::test]
    async fn test_failing_configuration_does_not_block_others() {
        let f = fixture();
        let b = BuildConfigurationId::new("B");
        f.backend.put_build(build(4, "B", BuildState::Finished, secs(f.t0, 1)));
        f.backend.put_build(build(5, "A", BuildState::Finished, secs(f.t0, 2)));
        f.backend.fail_configuration("B", true);

        let mut outcome = f.first_pass(Scan::Updates).await;
        let mut reported = ids(&outcome.events);
        for _ in 0..4 {
            outcome = f.next_pass(&outcome).await;
            reported.extend(ids(&outcome.events));
        }

        // A is reported once although B fails on every pass
        assert_eq!(reported, vec![5]);
        assert!(outcome.backlog.contains(&b));
        assert_eq!(outcome.backlog.baseline(&b, outcome.watermark).last_seen_id, BuildId(0));
        assert_eq!(outcome.watermark.last_seen_id, BuildId(5));

        // B recovers: its builds below the global watermark are still new
        f.backend.put_build(build(6, "B", BuildState::Running, secs(f.t0, 3)));
        f.backend.fail_configuration("B", false);

        // Newest first, as the server orders them
        let recovered = f.next_pass(&outcome).await;
        assert_eq!(ids(&recovered.events), vec![6, 4]);
        assert!(recovered.backlog.is_empty());
        assert!(recovered.registry.contains(BuildId(6)));
        assert_eq!(recovered.watermark.last_seen_id, BuildId(6));

        let after = f.next_pass(&recovered).await;
        assert!(after.events.is_empty());
    }

    #[tokio::test]
    async fn test_configuration_gone_from_topology_leaves_backlog() {
        let f = fixture();
        let mut backlog = Backlog::new();
        backlog.pin(BuildConfigurationId::new("Deleted"), Watermark::starting_at(f.t0));

        let outcome = f
            .service
            .discover(
                &f.topology,
                Watermark::starting_at(f.t0),
                &backlog,
                &RunningRegistry::new(),
                Scan::Updates,
            )
            .await;

        assert!(outcome.backlog.is_empty());
    }

    #[tokio::test]
    async fn test_seeding_scan_only_asks_for_running_builds() {
        let f = fixture();
        // Started long before the watcher: invisible to a since-query
        f.backend.put_build(build(2, "A", BuildState::Running, secs(f.t0, -3600)));
        f.backend.put_build(build(1, "A", BuildState::Finished, secs(f.t0, -7200)));

        let outcome = f.first_pass(Scan::Running).await;

        assert_eq!(ids(&outcome.events), vec![2]);
        assert!(outcome.registry.contains(BuildId(2)));
        assert_eq!(outcome.watermark.last_seen_id, BuildId(2));
        assert_eq!(outcome.watermark.last_update_time, f.t0);
        assert_eq!(f.backend.running_queries(), 2);
        assert_eq!(f.backend.build_queries(), 0);
    }
}
