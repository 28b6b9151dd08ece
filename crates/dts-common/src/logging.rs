//! ---
//! dts_section: "01-core-functionality"
//! dts_subsection: "module"
//! dts_type: "source"
//! dts_scope: "code"
//! dts_description: "Tracing subscriber setup for the telemetry feed daemon and its tools."
//! dts_version: "v0.0.0-prealpha"
//! dts_owner: "tbd"
//! ---
use anyhow::Result;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Filter override checked before `RUST_LOG`.
pub const LOG_ENV: &str = "DTS_LOG";

/// Workspace targets that log at `info` when no override is set.
pub const FEED_TARGETS: [&str; 6] = [
    "dtsd",
    "dts_common",
    "dts_feed",
    "dts_metrics",
    "dts_net",
    "dts_session",
];

/// Writer guards; dropping them would lose buffered lines.
struct LogGuards {
    _file: WorkerGuard,
    _stdout: WorkerGuard,
}

static GUARDS: OnceCell<LogGuards> = OnceCell::new();

/// Stdout format for the daemon. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Base name handed to the daily roller, e.g. `dtsd.log` (rotated to `dtsd.log.YYYY-MM-DD`).
pub fn log_file_name(service_name: &str, config: &LoggingConfig) -> String {
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    format!("{prefix}.log")
}

/// `warn` for dependencies, `info` for the feed crates.
pub fn default_directive() -> String {
    FEED_TARGETS
        .iter()
        .fold(String::from("warn"), |mut directive, target| {
            directive.push(',');
            directive.push_str(target);
            directive.push_str("=info");
            directive
        })
}

/// Pick the filter from `DTS_LOG`, then `RUST_LOG`, then [`default_directive`].
///
/// An unparsable override is reported on stderr and replaced by the default.
fn select_filter(dts_log: Option<String>, rust_log: Option<String>) -> EnvFilter {
    let Some((source, directive)) = dts_log
        .map(|d| (LOG_ENV, d))
        .or_else(|| rust_log.map(|d| ("RUST_LOG", d)))
    else {
        return EnvFilter::new(default_directive());
    };
    EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("ignoring invalid {source} directive {directive:?}: {err}");
        EnvFilter::new(default_directive())
    })
}

fn stdout_layer<S>(format: LogFormat, writer: NonBlocking) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let layer = fmt::layer().with_timer(fmt::time::UtcTime::rfc_3339());
    match format {
        LogFormat::StructuredJson => layer.with_target(false).json().with_writer(writer).boxed(),
        LogFormat::Pretty => layer.with_target(true).with_writer(writer).boxed(),
    }
}

/// Install the global subscriber: configured stdout format plus a daily JSON file
/// under `config.directory`.
///
/// Calling it again keeps the first subscriber.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory)?;
    let file_name = log_file_name(service_name, config);

    let (file_writer, file_guard) =
        tracing_appender::non_blocking(daily(&config.directory, &file_name));
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    let file_layer = fmt::layer()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .json()
        .with_writer(file_writer)
        .boxed();
    let filter = select_filter(
        std::env::var(LOG_ENV).ok(),
        std::env::var("RUST_LOG").ok(),
    );

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer(config.format, stdout_writer))
        .with(file_layer)
        .try_init()
        .is_ok();
    if installed {
        let _ = GUARDS.set(LogGuards {
            _file: file_guard,
            _stdout: stdout_guard,
        });
        info!(
            service = service_name,
            file = %config.directory.join(&file_name).display(),
            format = ?config.format,
            "tracing initialised"
        );
    }
    Ok(())
}
