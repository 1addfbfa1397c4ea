//! tcwatch Core
//!
//! Core types and abstractions for the tcwatch build notifier.
//!
//! This crate contains:
//! - Domain types: Projects, build configurations, builds and build events
//! - Filter: branch / build configuration matching for subscribers
//! - Topology: the project to build configuration snapshot the watcher polls against
//!
//! Nothing in here performs I/O.

pub mod domain;
pub mod filter;
pub mod topology;
