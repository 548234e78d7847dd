//! Franchise Core - Client library for franchise compliance case tracking
//!
//! Cases are franchise setup workflows made of services (registrations,
//! licenses and similar compliance sub-tasks). This crate keeps the state a
//! client derives from the backend consistent and talks to the backend REST
//! API.
//!
//! # Features
//!
//! - **Status Roll-up**: Case status and completion percentage derived from services
//! - **Unread Tracking**: Per-viewer unread remarks driving badges and highlights
//! - **Optimistic Writes**: Local changes applied first and rolled back on failure
//! - **Notification Fan-out**: Best-effort, sequential, one failure never stops the rest
//! - **Session Context**: Typed session state with pluggable persistence
//! - **Layered Configuration**: Defaults, JSON/YAML files, environment, overrides
//!
//! # Quick Start
//!
//! ```no_run
//! use franchise_core::{
//!     CaseApi, CaseStatus, ClientConfig, EventBroadcaster, FranchiseError, HttpApiClient,
//!     Synchronizer,
//! };
//!
//! # async fn example() -> Result<(), FranchiseError> {
//! let api = HttpApiClient::new(&ClientConfig::default())?.with_token("token");
//! let mut case = api.get_case("case-1").await?;
//!
//! let sync = Synchronizer::new(&api, EventBroadcaster::new(), CaseStatus::NewCase);
//! let summary = sync.recompute_and_persist(&mut case).await?;
//! println!("{} at {}%", summary.overall_status, summary.completion_percentage);
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Features
//!
//! - `test-utils`: In-memory backend and fixtures (for testing only)
//! - `observability`: Operational counters through the `metrics` facade

pub mod access;
pub mod api;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod events;
pub mod models;
pub mod notify;
pub mod observability;
pub mod session;
pub mod status;
pub mod sync;
pub mod unread;
pub mod users;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use api::{BackendApi, CaseApi, HttpApiClient, NotificationApi, RemarkApi, UserApi};
pub use config::{ApiConfig, ClientConfig, ConfigOverlay, LoggingConfig};
pub use config_loader::{load_config, ConfigLoader};
pub use error::{FranchiseError, Result};
pub use events::{Event, EventBroadcaster, EventType};
pub use models::*;
pub use notify::{fan_out, FailedDelivery, FanOutReport};
pub use session::{
    FileSessionStore, MemorySessionStore, Session, SessionContext, SessionStore, SessionUser,
};
pub use status::{ProgressStatus, StatusAggregator, StatusSummary};
pub use sync::{ReadOutcome, RemarkOutcome, Synchronizer};
pub use unread::UnreadTracker;
pub use users::{DirectoryConfig, DirectoryStats, UserDirectory};
pub use validation::ValidationReport;

/// Re-export commonly used types
pub use chrono::{DateTime, Utc};
