//! Log output for the service and its one-shot subcommands.
//!
//! `start` writes JSON lines to a daily file under the logs directory and
//! human-readable lines to stderr. Every line carries the fields of the span it
//! was emitted in, so pipeline events keep the message id and sender, and
//! HTTP events keep the request span opened by the router's trace layer.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Log file name prefix inside the logs directory.
pub const LOG_FILE_PREFIX: &str = "ticketline.log";

/// Directives used when `RUST_LOG` is unset or does not parse.
///
/// Service events at debug, request spans from the router at info, and
/// everything else (sqlx, reqwest, lettre) at warn.
pub const DEFAULT_FILTER: &str = "warn,ticketline=debug,tower_http=info";

/// Keeps the file writer flushing; drop it only at shutdown.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// Logging for `start`: JSON file (daily rotation) plus stderr.
///
/// Request spans are reported on close on stderr, which gives each webhook
/// delivery a timing line.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        anyhow::anyhow!(
            "failed to create logs directory {}: {e}",
            logs_dir.display()
        )
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(non_blocking);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(json_layer)
        .with(console_layer)
        .init();

    Ok(LoggingGuard { _guard: guard })
}

/// Stderr-only logging for `migrate` and `check-config`.
pub fn init_cli() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn env_filter() -> EnvFilter {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref())
}

fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
