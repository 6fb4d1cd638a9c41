use std::fs;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter;
use tracing_subscriber::{prelude::*, EnvFilter};

pub const LOG_FILE_NAME: &str = "fbview.log";

static CONSOLE_LOGGING: AtomicBool = AtomicBool::new(true);

/// Turns the stderr copy of warnings and errors on or off. The log file is
/// unaffected.
pub fn set_console_logging(enabled: bool) {
    CONSOLE_LOGGING.store(enabled, Ordering::Relaxed);
}

fn console_accepts(level: &Level) -> bool {
    CONSOLE_LOGGING.load(Ordering::Relaxed) && *level <= Level::WARN
}

/// Logs everything `RUST_LOG` allows (default `info`) to a file, and
/// warnings and errors to stderr until [`set_console_logging`] turns that
/// off.
pub fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_filter(filter::filter_fn(|metadata| {
            console_accepts(metadata.level())
        }));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_only_takes_warnings_while_enabled() {
        assert!(console_accepts(&Level::ERROR));
        assert!(console_accepts(&Level::WARN));
        assert!(!console_accepts(&Level::INFO));

        set_console_logging(false);
        assert!(!console_accepts(&Level::ERROR));
        assert!(!console_accepts(&Level::WARN));

        set_console_logging(true);
        assert!(console_accepts(&Level::WARN));
    }
}
