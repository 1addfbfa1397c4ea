//! Dispatch layer
//!
//! Hands build events to the registered handlers. The polling loops only
//! enqueue events; a dedicated task drains the queue and runs the handlers,
//! so a slow handler never stalls discovery.

pub mod dispatcher;
pub mod handler;

pub use dispatcher::Dispatcher;
pub use handler::{BuildHandler, FilteredHandler, FnHandler, LogHandler};
