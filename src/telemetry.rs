//! Logging setup.
//!
//! Two sinks: stderr for the operator, and a daily-rotated file under
//! `.coursegen/logs` that keeps the full record of a run. `RUST_LOG`
//! overrides the stderr level.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

pub const LOG_FILE_PREFIX: &str = "coursegen.log";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    /// Emit JSON lines on stderr instead of human-readable text
    pub json: bool,
    /// Directory for the rolling log file; no file logging when `None`
    pub log_dir: Option<PathBuf>,
}

/// Directive used for stderr when `RUST_LOG` is not set.
///
/// Quiet by default so progress rendering stays readable.
pub fn stderr_directive(verbose: bool) -> &'static str {
    if verbose {
        "coursegen=debug"
    } else {
        "coursegen=warn"
    }
}

fn stderr_filter(verbose: bool, env: Option<&str>) -> EnvFilter {
    env.filter(|v| !v.trim().is_empty())
        .and_then(|v| EnvFilter::try_new(v).ok())
        .unwrap_or_else(|| EnvFilter::new(stderr_directive(verbose)))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and closes the log file.
pub fn init(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let env = std::env::var("RUST_LOG").ok();
    let filter = stderr_filter(options.verbose, env.as_deref());

    let stderr_layer = if options.json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter)
            .boxed()
    };

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new("coursegen=debug"));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
