//! Logging setup for the CLI
//!
//! Logs go to stderr so command output on stdout stays clean. With a log
//! file configured, a second non-blocking layer writes plain text to a
//! daily-rolling file next to it.

use anyhow::{Context, Result};
use franchise_core::observability::{build_filter, init_tracing};
use franchise_core::LoggingConfig;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Install the global subscriber
///
/// Keep the returned guard alive until exit, dropping it flushes the log file.
///
/// # Errors
/// Returns an error if the level is invalid, the log directory cannot be
/// created, or a subscriber is already installed
pub fn init_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let Some(log_file) = &config.log_file else {
        init_tracing(config)?;
        return Ok(None);
    };

    let (directory, file_name) = split_log_path(log_file);
    std::fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create log directory {}", directory.display()))?;
    let appender = tracing_appender::rolling::daily(&directory, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);
    let stderr_layer = if config.json_logs {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    tracing_subscriber::registry()
        .with(build_filter(&config.level)?)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Tracing init failed")?;

    info!(log_file = %log_file.display(), "Logging to file");
    Ok(Some(guard))
}

fn split_log_path(path: &Path) -> (PathBuf, String) {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map_or_else(|| "franchise.log".to_string(), |n| n.to_string_lossy().into_owned());
    (directory, file_name)
}
