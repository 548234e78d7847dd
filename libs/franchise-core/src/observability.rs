//! Structured logging setup and operational counters
//!
//! Counters are recorded through the `metrics` facade when the
//! `observability` feature is enabled and compile to nothing otherwise.

use crate::config::LoggingConfig;
use crate::error::{FranchiseError, Result};
use tracing::{info, Level};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

pub const NOTIFICATIONS_SENT: &str = "franchise_notifications_sent_total";
pub const NOTIFICATIONS_FAILED: &str = "franchise_notifications_failed_total";
pub const ROLLBACKS: &str = "franchise_optimistic_rollbacks_total";

/// Filter from `RUST_LOG`, falling back to the configured level
///
/// # Errors
/// Returns an error if `level` is not a tracing level
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    level
        .parse::<Level>()
        .map_err(|e| FranchiseError::configuration(format!("Invalid log level: {e}")))?;
    Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
}

/// Install a global subscriber writing to stderr
///
/// # Errors
/// Returns an error if the level is invalid or a subscriber is already installed
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(&config.level)?);

    let installed = if config.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    };
    installed.map_err(|e| FranchiseError::configuration(format!("Tracing init failed: {e}")))?;

    info!("Tracing initialized with level: {}", config.level);
    Ok(())
}

/// Count one notification dispatch outcome
pub fn record_notification(delivered: bool) {
    #[cfg(feature = "observability")]
    {
        let name = if delivered {
            NOTIFICATIONS_SENT
        } else {
            NOTIFICATIONS_FAILED
        };
        metrics::counter!(name).increment(1);
    }
    #[cfg(not(feature = "observability"))]
    let _ = delivered;
}

/// Count one optimistic change undone after a failed save
pub fn record_rollback(operation: &'static str) {
    #[cfg(feature = "observability")]
    metrics::counter!(ROLLBACKS, "operation" => operation).increment(1);
    #[cfg(not(feature = "observability"))]
    let _ = operation;
}
