//! Core domain types
//!
//! This module contains the entities the watcher observes on the CI server.
//! All of them are owned by the server: the watcher only ever holds fetched
//! snapshots and compares them by their external id.

pub mod build;
pub mod event;
pub mod project;
