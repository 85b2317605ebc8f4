//! parlor — booking backend with a messaging session lifecycle core.
//!
//! Wires the record stores, the session supervisor, the dispatch gateway,
//! the notification scheduler and the HTTP server together, then serves
//! until SIGINT. All shared objects are constructed here once and injected;
//! there are no process-wide singletons.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use parlor_messaging::driver::StubDriver;
use parlor_messaging::{DispatchGateway, MessagingConfig, MessagingDriver, SessionSupervisor};
use parlor_server::notifications::NotificationService;
use parlor_server::scheduler::{Scheduler, SchedulerConfig};
use parlor_server::server::ApiServer;
use parlor_server::{AppState, ServerConfig};
use parlor_store::Stores;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Booking backend with a messaging session lifecycle core.
#[derive(Debug, Parser)]
#[command(name = "parlor", version, about)]
struct Cli {
    /// Bind host.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port.
    #[arg(long, default_value_t = 3080)]
    port: u16,

    /// Data directory for record stores and driver session storage.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Log level when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Cap on automatic reconnect attempts.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Run against the scripted stub driver (local development without a
    /// browser-automation driver attached).
    #[arg(long)]
    stub_driver: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    parlor_core::logging::init_subscriber(&cli.log_level);

    let stores = Arc::new(
        Stores::open(&cli.data_dir.join("records")).context("opening record stores")?,
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let driver: Arc<dyn MessagingDriver> = if cli.stub_driver {
        info!("using the scripted stub driver");
        StubDriver::new(events_tx, true)
    } else {
        // the production browser-automation driver is deployed separately
        // and binds MessagingDriver at integration time
        anyhow::bail!("no production driver in this build; run with --stub-driver");
    };

    let mut messaging_config = MessagingConfig::rooted_at(&cli.data_dir.join("messaging"));
    messaging_config.max_retries = cli.max_retries;
    let supervisor = SessionSupervisor::spawn(driver, events_rx, messaging_config);
    let gateway = Arc::new(DispatchGateway::new(Arc::clone(&supervisor)));

    let server_config = ServerConfig {
        host: cli.host,
        port: cli.port,
        ..ServerConfig::default()
    };
    let notifier = Arc::new(NotificationService::new(
        Arc::clone(&supervisor),
        Arc::clone(&gateway),
        Arc::clone(&stores),
        Duration::from_millis(server_config.pacing_ms),
    ));
    let scheduler = Scheduler::start(
        Arc::clone(&notifier),
        Arc::clone(&supervisor),
        SchedulerConfig {
            reminder_interval_secs: server_config.reminder_interval_secs,
            report_hour: server_config.report_hour,
        },
    );

    let state = AppState::new(
        Arc::clone(&supervisor),
        gateway,
        stores,
        notifier,
    );

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            signal.cancel();
        }
    });

    ApiServer::new(server_config, state)
        .serve(shutdown)
        .await
        .context("http server failed")?;

    scheduler.shutdown().await;
    supervisor.disconnect().await;
    info!("shutdown complete");
    Ok(())
}
