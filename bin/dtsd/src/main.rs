//! ---
//! dts_section: "01-core-functionality"
//! dts_subsection: "binary"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Binary entrypoint for the DTS daemon."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dts_common::{init_tracing, AppConfig};
use dts_feed::{FeedController, FeedRuntime, RenderSink, SeededRandom, TracingSink};
use dts_metrics::{new_registry, DaemonMetrics, FeedMetrics, SharedRegistry};
use dts_net::{
    ApiClient, ApiServerBuilder, BroadcastSink, PushChannel, PushSubscription,
    TelemetryBroadcaster,
};
use dts_session::{FileSessionStore, Navigation, SessionGuard};
use tokio::signal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about = "Digital Twin Substation daemon", long_about = None)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Run the telemetry feed and dashboard API")]
    Run,
    #[command(about = "Fetch the latest sensor reading from the backend")]
    FetchSensors,
    #[command(about = "Fetch active alerts from the backend")]
    FetchAlerts,
    #[command(about = "Send a command to the backend")]
    SendCommand {
        command: String,
        #[arg(long, value_name = "JSON", help = "Command parameters as JSON")]
        parameters: Option<String>,
    },
    #[command(subcommand, about = "Inspect or clear the local session")]
    Session(SessionCommands),
    #[command(about = "Evaluate the page guard for a path")]
    Guard { path: String },
}

#[derive(Debug, Subcommand)]
enum SessionCommands {
    #[command(about = "Show whether a session token is present")]
    Status,
    #[command(about = "Clear the session after confirmation")]
    Logout {
        #[arg(long, help = "Skip the confirmation prompt")]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut candidates = Vec::new();
    if let Some(path) = &cli.config {
        candidates.push(path.clone());
    }
    candidates.push(PathBuf::from("configs/dtsd.toml"));

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(&candidates)?;
    let config = loaded.config;
    let load_duration = load_started.elapsed();

    let registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());

    init_tracing("dtsd", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; running with defaults"),
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            daemon_metrics.inc_start();
            run_daemon(config, registry).await?
        }
        Commands::FetchSensors => {
            let client = ApiClient::from_config(&config.api)?;
            print_json(&client.fetch_sensor_data().await)?;
        }
        Commands::FetchAlerts => {
            let client = ApiClient::from_config(&config.api)?;
            print_json(&client.fetch_alerts().await)?;
        }
        Commands::SendCommand {
            command,
            parameters,
        } => {
            let parameters = match parameters {
                Some(raw) => serde_json::from_str(&raw).context("--parameters is not valid JSON")?,
                None => serde_json::Value::Null,
            };
            let client = ApiClient::from_config(&config.api)?;
            print_json(&client.send_command(&command, parameters).await)?;
        }
        Commands::Session(action) => {
            let store = FileSessionStore::open(&config.session.path)?;
            let guard = SessionGuard::new(store);
            match action {
                SessionCommands::Status => {
                    println!(
                        "Authenticated: {}\nSubstation: {}",
                        guard.is_authenticated(),
                        guard.substation_id().unwrap_or_else(|| "none".into())
                    );
                }
                SessionCommands::Logout { yes } => {
                    let navigation = if yes {
                        guard.logout(&mut |_: &str| true)?
                    } else {
                        guard.logout(&mut prompt_stdin)?
                    };
                    print_navigation(navigation);
                }
            }
        }
        Commands::Guard { path } => {
            let store = FileSessionStore::open(&config.session.path)?;
            print_navigation(SessionGuard::new(store).guard_page(&path));
        }
    }

    Ok(())
}

async fn run_daemon(config: AppConfig, registry: SharedRegistry) -> Result<()> {
    let feed_metrics = FeedMetrics::new(registry.clone())?;
    let broadcaster = TelemetryBroadcaster::new(config.server.broadcast_capacity);
    let sink: Arc<dyn RenderSink> = if config.server.enabled {
        Arc::new(BroadcastSink::new(broadcaster.clone()))
    } else {
        Arc::new(TracingSink)
    };

    let rng = SeededRandom::from_optional_seed(config.feed.random_seed);
    let controller = FeedController::seeded(config.feed.clone(), Box::new(rng), sink);
    let feed = FeedRuntime::new(controller)
        .with_metrics(feed_metrics)
        .spawn();

    let push = if config.push.enabled {
        connect_push(&config, &feed).await
    } else {
        info!("push channel disabled by configuration");
        None
    };

    let api_server = if config.server.enabled {
        let server = ApiServerBuilder::new(config.server.listen, feed.control())
            .with_metrics_registry(registry)
            .with_broadcaster(broadcaster)
            .spawn()
            .await
            .context("failed to start dashboard api")?;
        Some(server)
    } else {
        info!("dashboard api disabled by configuration");
        None
    };

    info!("daemon running; waiting for termination signal");
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    if let Some(subscription) = push {
        subscription.close().await;
    }
    if let Some(server) = api_server {
        server.shutdown().await?;
    }
    feed.shutdown().await?;

    Ok(())
}

async fn connect_push(config: &AppConfig, feed: &dts_feed::FeedHandle) -> Option<PushSubscription> {
    let channel = match PushChannel::from_config(&config.push) {
        Ok(channel) => channel,
        Err(err) => {
            warn!(error = %err, "push channel misconfigured; using synthetic data");
            return None;
        }
    };
    match channel.connect(feed.push_sender()).await {
        Ok(subscription) => Some(subscription),
        Err(err) => {
            warn!(error = %err, url = %channel.url(), "push channel unavailable; using synthetic data");
            None
        }
    }
}

fn prompt_stdin(prompt: &str) -> bool {
    print!("{prompt} [y/N] ");
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn print_navigation(navigation: Navigation) {
    match navigation {
        Navigation::Stay => println!("stay"),
        Navigation::Redirect(page) => println!("redirect: {}", page.file_name()),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
