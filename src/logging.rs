//! Logging setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies to
//! roomcast and the HTTP layer, with sqlx held at `warn` so per-statement
//! logging does not drown out delivery events at `debug`.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Result, RoomcastError};

/// Map a configured level onto a filter directive, defaulting to `info`.
fn normalize_level(level: &str) -> &'static str {
    match level.trim().to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Filter directives used when `RUST_LOG` is not set.
fn default_directives(level: &str) -> String {
    format!("{},sqlx=warn", normalize_level(level))
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives(level)))
}

/// Open the log file for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber.
///
/// Events go to stdout and, unless `file` is empty, are appended to the log
/// file as well. Fails if the file cannot be opened or a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if config.file.trim().is_empty() {
        return install_console(&config.level);
    }

    let log_file = Arc::new(open_log_file(Path::new(&config.file))?);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout.and(log_file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(build_filter(&config.level))
        .try_init()
        .map_err(|e| RoomcastError::Config(format!("logging already initialized: {e}")))
}

/// Console-only logging, used when the log file is unusable.
pub fn init_console_only(level: &str) {
    if let Err(e) = install_console(level) {
        eprintln!("{e}");
    }
}

fn install_console(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_target(true),
        )
        .with(build_filter(level))
        .try_init()
        .map_err(|e| RoomcastError::Config(format!("logging already initialized: {e}")))
}
