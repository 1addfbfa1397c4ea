//! tcwatch Watcher
//!
//! Keeps a local view of a TeamCity server in sync by polling, and reports
//! build lifecycle events to registered handlers.
//!
//! Architecture:
//! - Configuration: server, credentials, watched projects and poll periods
//! - State: topology snapshot, watermark and running registry, published
//!   through `watch` channels
//! - Services: topology walk, new-build discovery, running-build reconcile
//! - Dispatch: handler registry fed through an unbounded queue
//! - Scheduler: the two polling loops and the start/stop lifecycle
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tcwatch_watcher::{BuildWatcher, Config, LogHandler};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut watcher = BuildWatcher::connect(Config::new("https://teamcity.example.com"))?;
//!     watcher.register_handler("log", Arc::new(LogHandler))?;
//!     watcher.start()?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     watcher.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod scheduler;
pub mod service;
pub mod state;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use dispatch::{BuildHandler, FilteredHandler, FnHandler, LogHandler};
pub use error::{Result, WatchError};
pub use scheduler::BuildWatcher;
pub use state::{RunningBuild, RunningRegistry, Watermark};
