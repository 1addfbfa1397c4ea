//! Event dispatcher
//!
//! Runs every registered handler for each event. Each handler call gets its
//! own task so that an error or a panic in one handler is logged and the
//! others still run.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use tcwatch_core::domain::event::BuildEvent;

use super::handler::BuildHandler;

/// Named set of build handlers
#[derive(Default)]
pub struct Dispatcher {
    handlers: BTreeMap<String, Arc<dyn BuildHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler under `name`, returning the one it replaces
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn BuildHandler>,
    ) -> Option<Arc<dyn BuildHandler>> {
        self.handlers.insert(name.into(), handler)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs every handler on `event` and waits for all of them
    pub async fn dispatch(&self, event: &BuildEvent) {
        debug!("Dispatching {} to {} handler(s)", event, self.handlers.len());

        let event = Arc::new(event.clone());
        let mut handles = Vec::with_capacity(self.handlers.len());

        for (name, handler) in &self.handlers {
            let handler = Arc::clone(handler);
            let event = Arc::clone(&event);
            let task_name = name.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = handler.handle(&event).await {
                    error!("Handler {} failed on {}: {:#}", task_name, event, e);
                }
            });
            handles.push((name, handle));
        }

        for (name, handle) in handles {
            if let Err(e) = handle.await {
                warn!("Handler {} panicked: {}", name, e);
            }
        }
    }

    /// Spawns the task draining `queue` until it closes or `shutdown` fires
    ///
    /// Events are dispatched one at a time in queue order.
    pub fn spawn(
        self: Arc<Self>,
        mut queue: mpsc::UnboundedReceiver<BuildEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    event = queue.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = self.dispatch(&event) => {}
                }
            }
            debug!("Dispatcher stopped");
        })
    }
}
