//! Build watcher
//!
//! Owns the two polling loops and the dispatch task:
//! - topology loop: rebuilds the project snapshot every `projects_delay`
//! - update loop: discovers new builds, then reconciles running ones, every
//!   `updates_delay`
//!
//! Each loop does its work, then sleeps. A failed iteration is logged and the
//! loop carries on at the next tick; only `stop` ends a loop.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tcwatch_client::{CiBackend, TeamCityClient};
use tcwatch_core::domain::event::BuildEvent;
use tcwatch_core::topology::TopologySnapshot;

use crate::config::Config;
use crate::dispatch::{BuildHandler, Dispatcher};
use crate::error::{Result, WatchError};
use crate::service::{DiscoveryService, ReconcileService, Scan, TopologyService};
use crate::state::{RunningRegistry, WatchState, Watermark};

/// Background tasks of a started watcher
struct Tasks {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// Watches a CI server and reports build lifecycle events to handlers
pub struct BuildWatcher {
    config: Config,
    backend: Arc<dyn CiBackend>,
    /// Taken by `start`; handlers can only be added before that
    dispatcher: Option<Dispatcher>,
    state: Arc<WatchState>,
    tasks: Option<Tasks>,
}

impl BuildWatcher {
    /// Creates a watcher over any CI backend
    ///
    /// The watermark is reset to the current time by `start`: builds started
    /// before that are only reported if they are still running at startup.
    pub fn new(config: Config, backend: Arc<dyn CiBackend>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            backend,
            dispatcher: Some(Dispatcher::new()),
            state: Arc::new(WatchState::new(Watermark::starting_at(chrono::Utc::now()))),
            tasks: None,
        })
    }

    /// Creates a watcher talking to the TeamCity server named in `config`
    pub fn connect(config: Config) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(tcwatch_client::ClientError::from)?;
        let client = TeamCityClient::with_client(
            config.server_url.clone(),
            config.credentials.clone(),
            http,
        );

        Self::new(config, Arc::new(client))
    }

    /// Adds a handler; only allowed before `start`
    pub fn register_handler(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn BuildHandler>,
    ) -> Result<()> {
        let dispatcher = self.dispatcher.as_mut().ok_or(WatchError::AlreadyStarted)?;
        let name = name.into();
        if dispatcher.register(name.clone(), handler).is_some() {
            warn!("Handler {} replaced", name);
        }
        Ok(())
    }

    /// Spawns the polling loops and the dispatch task
    ///
    /// Must be called from within a tokio runtime. A watcher starts once.
    pub fn start(&mut self) -> Result<()> {
        let dispatcher = self.dispatcher.take().ok_or(WatchError::AlreadyStarted)?;

        info!(
            "Starting build watcher for {} (roots: {:?}, cascade: {}, updates: {:?}, projects: {:?})",
            self.config.server_url,
            self.config.root_project_ids,
            self.config.cascade_mode,
            self.config.updates_delay(),
            self.config.projects_delay()
        );
        if dispatcher.is_empty() {
            warn!("No handlers registered, events will only be logged at debug level");
        }

        self.state
            .reset_watermark(Watermark::starting_at(chrono::Utc::now()));

        let shutdown = CancellationToken::new();
        let (events, queue) = mpsc::unbounded_channel();

        // Subscribe before any publication so the first snapshot is not missed
        let topology_rx = self.state.subscribe_topology();

        let topology_loop = TopologyLoop {
            service: TopologyService::new(
                Arc::clone(&self.backend),
                self.config.root_project_ids.clone(),
                self.config.cascade_mode,
            ),
            state: Arc::clone(&self.state),
            period: self.config.projects_delay(),
            shutdown: shutdown.clone(),
        };

        let update_loop = UpdateLoop {
            discovery: DiscoveryService::new(Arc::clone(&self.backend)),
            reconcile: ReconcileService::new(Arc::clone(&self.backend)),
            state: Arc::clone(&self.state),
            events,
            period: self.config.updates_delay(),
            shutdown: shutdown.clone(),
        };

        let handles = vec![
            Arc::new(dispatcher).spawn(queue, shutdown.clone()),
            tokio::spawn(topology_loop.run()),
            tokio::spawn(update_loop.run(topology_rx)),
        ];

        self.tasks = Some(Tasks { shutdown, handles });
        Ok(())
    }

    /// Cancels the loops and waits for them to exit
    ///
    /// In-flight requests are abandoned. Events still queued are dropped.
    pub async fn stop(&mut self) -> Result<()> {
        let tasks = self.tasks.take().ok_or(WatchError::NotStarted)?;
        info!("Stopping build watcher");

        tasks.shutdown.cancel();
        for handle in tasks.handles {
            if let Err(e) = handle.await {
                error!("Watcher task failed: {}", e);
            }
        }

        info!("Build watcher stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.tasks.is_some()
    }

    pub fn current_topology(&self) -> Arc<TopologySnapshot> {
        self.state.topology()
    }

    pub fn current_watermark(&self) -> Watermark {
        self.state.watermark()
    }

    pub fn currently_running_builds(&self) -> Arc<RunningRegistry> {
        self.state.running()
    }
}

impl Drop for BuildWatcher {
    fn drop(&mut self) {
        if let Some(tasks) = &self.tasks {
            tasks.shutdown.cancel();
        }
    }
}

/// Sleeps for `period`; returns false if cancelled first
async fn pause(period: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = time::sleep(period) => true,
    }
}

struct TopologyLoop {
    service: TopologyService,
    state: Arc<WatchState>,
    period: Duration,
    shutdown: CancellationToken,
}

impl TopologyLoop {
    async fn run(self) {
        debug!("Topology loop started");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.service.refresh() => match result {
                    Ok(snapshot) => {
                        info!(
                            "Project structure updated: {} project(s), {} configuration(s)",
                            snapshot.project_count(),
                            snapshot.configuration_count()
                        );
                        self.state.publish_topology(snapshot);
                    }
                    Err(e) => warn!("Failed to update project structure: {:#}", e),
                },
            }

            if !pause(self.period, &self.shutdown).await {
                break;
            }
        }

        debug!("Topology loop stopped");
    }
}

struct UpdateLoop {
    discovery: DiscoveryService,
    reconcile: ReconcileService,
    state: Arc<WatchState>,
    events: mpsc::UnboundedSender<BuildEvent>,
    period: Duration,
    shutdown: CancellationToken,
}

impl UpdateLoop {
    async fn run(self, mut topology_rx: watch::Receiver<Arc<TopologySnapshot>>) {
        debug!("Update loop waiting for the first project structure");

        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return,
            changed = topology_rx.changed() => {
                if changed.is_err() {
                    return;
                }
            }
        }

        let mut scan = Scan::Running;
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                _ = self.tick(&mut scan) => {}
            }

            if !pause(self.period, &self.shutdown).await {
                break;
            }
        }

        debug!("Update loop stopped");
    }

    /// One iteration: discovery, then reconciliation
    ///
    /// State is published and events enqueued right after each step, with no
    /// await in between, so a cancelled iteration never leaves them apart.
    async fn tick(&self, scan: &mut Scan) {
        let topology = self.state.topology();
        let running = self.state.running();

        let outcome = self
            .discovery
            .discover(
                &topology,
                self.state.watermark(),
                &self.state.backlog(),
                &running,
                *scan,
            )
            .await;
        if !outcome.backlog.is_empty() {
            warn!(
                "{} configuration(s) could not be checked, retrying next tick",
                outcome.backlog.len()
            );
        }
        self.state
            .publish_pass(outcome.watermark, outcome.backlog, outcome.registry);
        self.enqueue(outcome.events);

        if *scan == Scan::Running {
            info!(
                "Initialized running builds: {} tracked",
                self.state.running().len()
            );
            *scan = Scan::Updates;
        }

        let outcome = self.reconcile.reconcile(&self.state.running()).await;
        self.state.publish_running(outcome.registry);
        self.enqueue(outcome.events);
    }

    fn enqueue(&self, events: Vec<BuildEvent>) {
        for event in events {
            if self.events.send(event).is_err() {
                debug!("Dispatcher gone, dropping remaining events");
                return;
            }
        }
    }
}
