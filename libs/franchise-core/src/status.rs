//! Case status aggregation
//!
//! Rolls the statuses of a case's services up into an overall case status and
//! a completion percentage. Everything here is a pure function of its input.
//!
//! The three-tier rule:
//!
//! 1. every service completed → [`CaseStatus::Completed`]
//! 2. otherwise any service in progress or completed → [`CaseStatus::InProgress`]
//! 3. otherwise (including an empty list) → the caller's default status
//!
//! # Examples
//!
//! ```
//! use franchise_core::{status::aggregate, CaseStatus, ServiceStatus};
//!
//! let summary = aggregate(
//!     &[ServiceStatus::Completed, ServiceStatus::Completed, ServiceStatus::InProgress],
//!     CaseStatus::NewCase,
//! );
//! assert_eq!(summary.completion_percentage, 67);
//! assert_eq!(summary.overall_status, CaseStatus::InProgress);
//! ```

use crate::models::{CaseStatus, LegacyStatus, Service, ServiceStatus};
use serde::{Deserialize, Serialize};

/// A status that takes part in aggregation
///
/// Anything that is neither completed nor in progress counts as not started.
pub trait ProgressStatus {
    fn is_completed(&self) -> bool;
    fn is_in_progress(&self) -> bool;
}

impl ProgressStatus for ServiceStatus {
    fn is_completed(&self) -> bool {
        *self == Self::Completed
    }

    fn is_in_progress(&self) -> bool {
        *self == Self::InProgress
    }
}

impl ProgressStatus for LegacyStatus {
    fn is_completed(&self) -> bool {
        *self == Self::Completed
    }

    fn is_in_progress(&self) -> bool {
        *self == Self::InProgress
    }
}

impl<T: ProgressStatus + ?Sized> ProgressStatus for &T {
    fn is_completed(&self) -> bool {
        (**self).is_completed()
    }

    fn is_in_progress(&self) -> bool {
        (**self).is_in_progress()
    }
}

/// Derived case status and completion percentage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    #[serde(rename = "status")]
    pub overall_status: CaseStatus,
    pub completion_percentage: u8,
}

impl StatusSummary {
    /// Summary of a case with no services
    #[must_use]
    pub fn empty(default_status: CaseStatus) -> Self {
        Self {
            overall_status: default_status,
            completion_percentage: 0,
        }
    }
}

/// Aggregate any sequence of statuses
pub fn aggregate<I>(statuses: I, default_status: CaseStatus) -> StatusSummary
where
    I: IntoIterator,
    I::Item: ProgressStatus,
{
    let mut total = 0usize;
    let mut completed = 0usize;
    let mut in_progress = 0usize;
    for status in statuses {
        total += 1;
        if status.is_completed() {
            completed += 1;
        } else if status.is_in_progress() {
            in_progress += 1;
        }
    }

    if total == 0 {
        return StatusSummary::empty(default_status);
    }

    let overall_status = if completed == total {
        CaseStatus::Completed
    } else if completed + in_progress > 0 {
        CaseStatus::InProgress
    } else {
        default_status
    };

    StatusSummary {
        overall_status,
        completion_percentage: rounded_percentage(completed, total),
    }
}

/// Aggregate the statuses of a service list
#[must_use]
pub fn summarize_services(services: &[Service], default_status: CaseStatus) -> StatusSummary {
    aggregate(services.iter().map(|s| s.status), default_status)
}

/// `round(100 * part / total)` with halves rounded up, in integer arithmetic
fn rounded_percentage(part: usize, total: usize) -> u8 {
    debug_assert!(total > 0 && part <= total);
    let value = (200 * part + total) / (2 * total);
    u8::try_from(value).unwrap_or(100)
}

/// Aggregator bound to the default status of one call site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusAggregator {
    default_status: CaseStatus,
}

impl StatusAggregator {
    #[must_use]
    pub fn new(default_status: CaseStatus) -> Self {
        Self { default_status }
    }

    #[must_use]
    pub fn default_status(&self) -> CaseStatus {
        self.default_status
    }

    #[must_use]
    pub fn summarize(&self, services: &[Service]) -> StatusSummary {
        summarize_services(services, self.default_status)
    }

    #[must_use]
    pub fn summarize_statuses<I>(&self, statuses: I) -> StatusSummary
    where
        I: IntoIterator,
        I::Item: ProgressStatus,
    {
        aggregate(statuses, self.default_status)
    }
}
