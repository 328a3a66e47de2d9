/// Tracing setup for the CLI
///
/// Human-readable events go to stderr. When a run directory is known, the same
/// events are also appended to `console.log` inside it so every run carries its
/// own transcript next to the JSON artifacts.
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const CONSOLE_LOG_FILE: &str = "console.log";

/// Keeps the file writer flushing; drop it before the process exits
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(debug: bool) -> EnvFilter {
    if debug {
        EnvFilter::new("fleet_medic=debug,info")
    } else {
        EnvFilter::new("info")
    }
}

pub fn init(debug: bool, log_dir: Option<&Path>) -> Result<LoggingGuard, TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, CONSOLE_LOG_FILE);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()?;

    Ok(LoggingGuard { _file: guard })
}
