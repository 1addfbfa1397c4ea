//! Watcher state
//!
//! Everything the two polling loops share. Each value is published as a
//! whole through a `watch` channel: writers build a new value and swap it in,
//! readers take the current `Arc` and keep using it even if a newer value is
//! published meanwhile.
//!
//! Writers:
//! - topology: topology loop only
//! - watermark, backlog and running registry: update loop only

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

use tcwatch_core::domain::build::{Build, BuildId};
use tcwatch_core::domain::event::BuildContext;
use tcwatch_core::domain::project::BuildConfigurationId;
use tcwatch_core::topology::TopologySnapshot;

/// Boundary below which builds count as already processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    /// Highest build id seen so far
    pub last_seen_id: BuildId,

    /// Latest start time seen so far; build queries start here
    pub last_update_time: DateTime<Utc>,
}

impl Watermark {
    /// A watermark that has seen nothing, scanning from `time` onwards
    pub fn starting_at(time: DateTime<Utc>) -> Self {
        Self {
            last_seen_id: BuildId::default(),
            last_update_time: time,
        }
    }

    pub fn has_seen(&self, id: BuildId) -> bool {
        id <= self.last_seen_id
    }

    /// Moves the watermark forward; neither component ever goes back
    pub fn advanced(self, id: BuildId, time: DateTime<Utc>) -> Self {
        Self {
            last_seen_id: self.last_seen_id.max(id),
            last_update_time: self.last_update_time.max(time),
        }
    }
}

/// Configurations whose builds could not be fetched
///
/// Each one is pinned at the watermark of the first pass it failed in and is
/// scanned from there until a fetch succeeds again, while the global
/// watermark keeps moving for the others.
#[derive(Debug, Clone, Default)]
pub struct Backlog {
    pinned: BTreeMap<BuildConfigurationId, Watermark>,
}

impl Backlog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Watermark to scan `id` from: its pinned one, or `current`
    pub fn baseline(&self, id: &BuildConfigurationId, current: Watermark) -> Watermark {
        self.pinned.get(id).copied().unwrap_or(current)
    }

    /// Pins `id` at `watermark` unless it is already pinned
    pub fn pin(&mut self, id: BuildConfigurationId, watermark: Watermark) {
        self.pinned.entry(id).or_insert(watermark);
    }

    pub fn release(&mut self, id: &BuildConfigurationId) -> Option<Watermark> {
        self.pinned.remove(id)
    }

    /// Drops configurations for which `keep` returns false
    pub fn retain(&mut self, mut keep: impl FnMut(&BuildConfigurationId) -> bool) {
        self.pinned.retain(|id, _| keep(id));
    }

    pub fn contains(&self, id: &BuildConfigurationId) -> bool {
        self.pinned.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}

/// A build believed to be running, with the context it was discovered in
#[derive(Debug, Clone)]
pub struct RunningBuild {
    pub context: BuildContext,
    pub build: Build,
}

/// Builds currently in progress, keyed by build id
#[derive(Debug, Clone, Default)]
pub struct RunningRegistry {
    builds: BTreeMap<BuildId, RunningBuild>,
}

impl RunningRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `build`, replacing any older snapshot with the same id
    pub fn insert(&mut self, context: BuildContext, build: Build) {
        self.builds
            .insert(build.id, RunningBuild { context, build });
    }

    pub fn remove(&mut self, id: BuildId) -> Option<RunningBuild> {
        self.builds.remove(&id)
    }

    pub fn get(&self, id: BuildId) -> Option<&RunningBuild> {
        self.builds.get(&id)
    }

    pub fn contains(&self, id: BuildId) -> bool {
        self.builds.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = BuildId> + '_ {
        self.builds.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RunningBuild> {
        self.builds.values()
    }

    pub fn len(&self) -> usize {
        self.builds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}

/// Published state shared between the loops and outside readers
#[derive(Debug)]
pub struct WatchState {
    topology: watch::Sender<Arc<TopologySnapshot>>,
    watermark: watch::Sender<Watermark>,
    backlog: watch::Sender<Arc<Backlog>>,
    running: watch::Sender<Arc<RunningRegistry>>,
}

impl WatchState {
    pub fn new(watermark: Watermark) -> Self {
        Self {
            topology: watch::Sender::new(Arc::new(TopologySnapshot::new())),
            watermark: watch::Sender::new(watermark),
            backlog: watch::Sender::new(Arc::new(Backlog::new())),
            running: watch::Sender::new(Arc::new(RunningRegistry::new())),
        }
    }

    pub fn topology(&self) -> Arc<TopologySnapshot> {
        Arc::clone(&self.topology.borrow())
    }

    /// Receiver notified on every topology publication after this call
    pub fn subscribe_topology(&self) -> watch::Receiver<Arc<TopologySnapshot>> {
        self.topology.subscribe()
    }

    pub fn publish_topology(&self, snapshot: TopologySnapshot) {
        self.topology.send_replace(Arc::new(snapshot));
    }

    pub fn watermark(&self) -> Watermark {
        *self.watermark.borrow()
    }

    /// Restarts scanning from `watermark`, forgetting any backlog
    pub fn reset_watermark(&self, watermark: Watermark) {
        self.watermark.send_replace(watermark);
        self.backlog.send_replace(Arc::new(Backlog::new()));
    }

    pub fn backlog(&self) -> Arc<Backlog> {
        Arc::clone(&self.backlog.borrow())
    }

    pub fn running(&self) -> Arc<RunningRegistry> {
        Arc::clone(&self.running.borrow())
    }

    /// Publishes the result of a pass: watermark, backlog and registry together
    pub fn publish_pass(&self, watermark: Watermark, backlog: Backlog, running: RunningRegistry) {
        self.watermark.send_replace(watermark);
        self.backlog.send_replace(Arc::new(backlog));
        self.running.send_replace(Arc::new(running));
    }

    pub fn publish_running(&self, running: RunningRegistry) {
        self.running.send_replace(Arc::new(running));
    }
}
