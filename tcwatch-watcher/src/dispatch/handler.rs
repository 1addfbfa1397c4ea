//! Build event handlers

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

use tcwatch_core::domain::event::BuildEvent;
use tcwatch_core::filter::Filter;

/// Receives every build event the watcher produces
///
/// Errors are logged by the dispatcher and do not affect other handlers.
#[async_trait]
pub trait BuildHandler: Send + Sync {
    async fn handle(&self, event: &BuildEvent) -> anyhow::Result<()>;
}

/// Adapts an async closure into a handler
///
/// The closure receives an owned copy of the event.
pub struct FnHandler<F> {
    f: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(BuildEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> BuildHandler for FnHandler<F>
where
    F: Fn(BuildEvent) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn handle(&self, event: &BuildEvent) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}

/// Forwards only the events whose build passes a filter
///
/// The filter is shared, so patterns changed at runtime apply to the next
/// event.
pub struct FilteredHandler {
    filter: Arc<Filter>,
    inner: Arc<dyn BuildHandler>,
}

impl FilteredHandler {
    pub fn new(filter: Arc<Filter>, inner: Arc<dyn BuildHandler>) -> Self {
        Self { filter, inner }
    }

    pub fn filter(&self) -> &Arc<Filter> {
        &self.filter
    }
}

#[async_trait]
impl BuildHandler for FilteredHandler {
    async fn handle(&self, event: &BuildEvent) -> anyhow::Result<()> {
        if !self.filter.matches(&event.build) {
            return Ok(());
        }
        self.inner.handle(event).await
    }
}

/// Writes every event to the log
#[derive(Debug, Default)]
pub struct LogHandler;

#[async_trait]
impl BuildHandler for LogHandler {
    async fn handle(&self, event: &BuildEvent) -> anyhow::Result<()> {
        let build = &event.build;
        info!(
            "[{}] {} / {} #{} {}{}{}",
            event.kind,
            event.context.project.name,
            event.context.configuration.name,
            build.number.as_deref().unwrap_or("?"),
            build
                .status
                .map(|status| status.to_string())
                .unwrap_or_else(|| build.state.to_string()),
            build
                .branch_name
                .as_deref()
                .map(|branch| format!(" on {}", branch))
                .unwrap_or_default(),
            build
                .web_url
                .as_deref()
                .map(|url| format!(" {}", url))
                .unwrap_or_default(),
        );
        Ok(())
    }
}
