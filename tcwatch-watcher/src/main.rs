//! tcwatch
//!
//! Watches a TeamCity server and logs every new and finished build.
//!
//! Every option can also be given through a `TCWATCH_*` environment
//! variable. Logging follows `RUST_LOG`.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tcwatch_client::Credentials;
use tcwatch_core::filter::Filter;
use tcwatch_core::topology::CascadeMode;
use tcwatch_watcher::config::{self, DEFAULT_PROJECTS_DELAY_MS, DEFAULT_UPDATES_DELAY_MS};
use tcwatch_watcher::{BuildWatcher, Config, FilteredHandler, LogHandler};

#[derive(Parser)]
#[command(name = "tcwatch")]
#[command(about = "Watch a TeamCity server for new and finished builds", long_about = None)]
#[command(version)]
struct Cli {
    /// Server URL
    #[arg(long, env = "TCWATCH_SERVER_URL")]
    server_url: String,

    /// User name; guest access when omitted
    #[arg(long, env = "TCWATCH_USERNAME")]
    username: Option<String>,

    /// Password for the user
    #[arg(long, env = "TCWATCH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Root project ids, space or comma separated; the server root when omitted
    #[arg(long = "root-project", env = "TCWATCH_ROOT_PROJECTS")]
    root_projects: Vec<String>,

    /// Whether child projects are watched as well (only-root, recursive)
    #[arg(long, env = "TCWATCH_CASCADE_MODE", default_value_t = CascadeMode::OnlyRoot)]
    cascade_mode: CascadeMode,

    /// Period of the new/finished build checks in milliseconds
    #[arg(long, env = "TCWATCH_UPDATES_DELAY_MS", default_value_t = DEFAULT_UPDATES_DELAY_MS, allow_negative_numbers = true)]
    updates_delay_ms: i64,

    /// Period of the project structure refresh in milliseconds
    #[arg(long, env = "TCWATCH_PROJECTS_DELAY_MS", default_value_t = DEFAULT_PROJECTS_DELAY_MS, allow_negative_numbers = true)]
    projects_delay_ms: i64,

    /// HTTP request timeout in seconds
    #[arg(long, env = "TCWATCH_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Only log builds on branches matching this pattern
    #[arg(long, env = "TCWATCH_BRANCH_FILTER", default_value = ".*")]
    branch_filter: String,

    /// Only log builds of configurations matching this pattern
    #[arg(long, env = "TCWATCH_CONFIGURATION_FILTER", default_value = ".*")]
    configuration_filter: String,
}

impl Cli {
    fn credentials(&self) -> Result<Credentials> {
        match (&self.username, &self.password) {
            (None, _) => Ok(Credentials::Guest),
            (Some(username), Some(password)) => Ok(Credentials::User {
                username: username.clone(),
                password: password.clone(),
            }),
            (Some(username), None) => {
                anyhow::bail!("--password is required for user `{}`", username)
            }
        }
    }

    fn config(&self) -> Result<Config> {
        let mut config = Config::new(self.server_url.clone())
            .with_credentials(self.credentials()?)
            .with_root_projects(config::parse_project_ids(&self.root_projects))
            .with_cascade_mode(self.cascade_mode)
            .with_delays(self.updates_delay_ms, self.projects_delay_ms);
        config.request_timeout = Duration::from_secs(self.request_timeout_secs);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tcwatch_watcher=info,tcwatch_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    info!("Starting tcwatch");

    let config = cli.config()?;
    info!(
        "Loaded configuration: server_url={}, credentials={:?}",
        config.server_url, config.credentials
    );

    let filter = Filter::with_patterns(&cli.branch_filter, &cli.configuration_filter)
        .context("Invalid build filter")?;

    let mut watcher = BuildWatcher::connect(config).context("Failed to create build watcher")?;
    watcher.register_handler(
        "log",
        Arc::new(FilteredHandler::new(Arc::new(filter), Arc::new(LogHandler))),
    )?;
    watcher.start().context("Failed to start build watcher")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    watcher.stop().await?;

    Ok(())
}
