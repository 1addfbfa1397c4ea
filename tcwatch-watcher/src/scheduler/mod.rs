//! Scheduler layer for the watcher
//!
//! Runs the topology and update loops on their own periods and feeds the
//! events they produce to the dispatcher. Owns the start/stop lifecycle.

pub mod watcher;

pub use watcher::BuildWatcher;
