//! Data models for cases, services, remarks, users and notifications

use crate::error::{FranchiseError, Result};
use crate::status::{self, StatusSummary};
use chrono::{DateTime, Utc};
use franchise_common::constants::{
    ROLE_ADMIN, ROLE_SUPER_ADMIN, STATUS_APPROVED, STATUS_COMPLETED, STATUS_DETAIL_REQUIRED,
    STATUS_IN_PROGRESS, STATUS_NEW_CASE, STATUS_PENDING, STATUS_REJECTED, STATUS_TO_BE_STARTED,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Status of a single service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ServiceStatus {
    #[default]
    #[serde(rename = "To be Started")]
    ToBeStarted,
    #[serde(rename = "Detail Required")]
    DetailRequired,
    #[serde(rename = "In-Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl ServiceStatus {
    /// Wire label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ToBeStarted => STATUS_TO_BE_STARTED,
            Self::DetailRequired => STATUS_DETAIL_REQUIRED,
            Self::InProgress => STATUS_IN_PROGRESS,
            Self::Completed => STATUS_COMPLETED,
        }
    }
}

/// Status enumeration used by older case-level records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LegacyStatus {
    #[default]
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "In-Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Approved")]
    Approved,
    #[serde(rename = "Rejected")]
    Rejected,
}

impl LegacyStatus {
    /// Wire label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => STATUS_PENDING,
            Self::InProgress => STATUS_IN_PROGRESS,
            Self::Completed => STATUS_COMPLETED,
            Self::Approved => STATUS_APPROVED,
            Self::Rejected => STATUS_REJECTED,
        }
    }
}

/// Overall status of a case, derived from its services
///
/// `Approved` and `Rejected` only appear on cases stored by the older
/// workflow. Aggregation never produces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CaseStatus {
    #[default]
    #[serde(rename = "New-Case")]
    NewCase,
    #[serde(rename = "Pending")]
    Pending,
    #[serde(rename = "In-Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
    #[serde(rename = "Approved")]
    Approved,
    #[serde(rename = "Rejected")]
    Rejected,
}

impl CaseStatus {
    /// Wire label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewCase => STATUS_NEW_CASE,
            Self::Pending => STATUS_PENDING,
            Self::InProgress => STATUS_IN_PROGRESS,
            Self::Completed => STATUS_COMPLETED,
            Self::Approved => STATUS_APPROVED,
            Self::Rejected => STATUS_REJECTED,
        }
    }

    /// Whether this is a recorded outcome of the older workflow
    #[must_use]
    pub fn is_legacy_outcome(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl From<LegacyStatus> for CaseStatus {
    fn from(status: LegacyStatus) -> Self {
        match status {
            LegacyStatus::Pending => Self::Pending,
            LegacyStatus::InProgress => Self::InProgress,
            LegacyStatus::Completed => Self::Completed,
            LegacyStatus::Approved => Self::Approved,
            LegacyStatus::Rejected => Self::Rejected,
        }
    }
}

macro_rules! impl_status_text {
    ($ty:ty, [$($variant:ident),+ $(,)?]) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = FranchiseError;

            /// Accepts the wire label case-insensitively, with `-`, `_` and spaces interchangeable
            fn from_str(s: &str) -> Result<Self> {
                let wanted = normalize_label(s);
                [$(<$ty>::$variant),+]
                    .into_iter()
                    .find(|status| normalize_label(status.as_str()) == wanted)
                    .ok_or_else(|| {
                        FranchiseError::validation(format!(
                            "Unknown {} '{}'",
                            stringify!($ty),
                            s
                        ))
                    })
            }
        }
    };
}

impl_status_text!(ServiceStatus, [ToBeStarted, DetailRequired, InProgress, Completed]);
impl_status_text!(LegacyStatus, [Pending, InProgress, Completed, Approved, Rejected]);
impl_status_text!(CaseStatus, [NewCase, Pending, InProgress, Completed, Approved, Rejected]);

fn normalize_label(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Reference to a user as stored on cases and services
///
/// The backend sends either a bare id string or an embedded user object.
/// Both shapes deserialize into this one type; it serializes back as the id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "UserRefWire", into = "String")]
pub struct UserRef {
    pub id: String,
    pub display_name: Option<String>,
}

impl UserRef {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    #[must_use]
    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(name.into()),
        }
    }

    /// Name to show, falling back to the id
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UserRefWire {
    Id(String),
    Embedded {
        #[serde(alias = "_id")]
        id: String,
        #[serde(default, alias = "displayName", alias = "username")]
        name: Option<String>,
    },
}

impl From<UserRefWire> for UserRef {
    fn from(wire: UserRefWire) -> Self {
        match wire {
            UserRefWire::Id(id) => Self::new(id),
            UserRefWire::Embedded { id, name } => Self {
                id,
                display_name: name,
            },
        }
    }
}

impl From<UserRef> for String {
    fn from(user: UserRef) -> Self {
        user.id
    }
}

/// Coarse user role
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    SuperAdmin,
    Member(String),
}

impl Role {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin | Self::SuperAdmin)
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Member("User".to_string())
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            ROLE_ADMIN => Self::Admin,
            ROLE_SUPER_ADMIN => Self::SuperAdmin,
            _ => Self::Member(value),
        }
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Admin => ROLE_ADMIN.to_string(),
            Role::SuperAdmin => ROLE_SUPER_ADMIN.to_string(),
            Role::Member(name) => name,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => f.write_str(ROLE_ADMIN),
            Self::SuperAdmin => f.write_str(ROLE_SUPER_ADMIN),
            Self::Member(name) => f.write_str(name),
        }
    }
}

/// Individual permission flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    Edit,
    Delete,
    Remarks,
    AllCaseAccess,
}

impl Permission {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::Delete => "delete",
            Self::Remarks => "remarks",
            Self::AllCaseAccess => "allCaseAccess",
        }
    }
}

/// Permission set fetched per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Permissions {
    pub edit: bool,
    pub delete: bool,
    pub remarks: bool,
    pub all_case_access: bool,
}

impl Permissions {
    /// Every flag set
    #[must_use]
    pub fn all() -> Self {
        Self {
            edit: true,
            delete: true,
            remarks: true,
            all_case_access: true,
        }
    }

    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        match permission {
            Permission::Edit => self.edit,
            Permission::Delete => self.delete,
            Permission::Remarks => self.remarks,
            Permission::AllCaseAccess => self.all_case_access,
        }
    }
}

/// Full user record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub permissions: Permissions,
}

/// Compliance sub-task of a case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: ServiceStatus,
    #[serde(default)]
    pub remark: Option<String>,
    #[serde(default)]
    pub completion_percentage: u8,
    #[serde(default)]
    pub assigned_to: Option<UserRef>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Service {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, status: ServiceStatus) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status,
            remark: None,
            completion_percentage: 0,
            assigned_to: None,
            tags: Vec::new(),
        }
    }
}

/// Franchise setup workflow
///
/// `status` and `completion_percentage` are derived from the services and
/// only change through [`Case::recompute`], [`Case::set_service_status`] or
/// the explicit [`Case::override_summary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Case {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, alias = "serialNo")]
    pub serial_number: u32,
    #[serde(default)]
    pub owner_name: String,
    #[serde(default)]
    pub client_name: String,
    #[serde(default)]
    pub unit_name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    services: Vec<Service>,
    #[serde(default, alias = "overallStatus")]
    status: CaseStatus,
    #[serde(default, alias = "overallCompletionPercentage")]
    completion_percentage: u8,
    #[serde(default)]
    pub assigned_users: Vec<UserRef>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

/// Restorable copy of the derived parts of a case
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CaseSnapshot {
    services: Vec<Service>,
    summary: StatusSummary,
    updated_at: DateTime<Utc>,
}

impl Case {
    /// Create a case whose summary is computed from `services`
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        serial_number: u32,
        services: Vec<Service>,
        default_status: CaseStatus,
    ) -> Self {
        let summary = status::summarize_services(&services, default_status);
        Self {
            id: id.into(),
            serial_number,
            owner_name: String::new(),
            client_name: String::new(),
            unit_name: String::new(),
            address: String::new(),
            services,
            status: summary.overall_status,
            completion_percentage: summary.completion_percentage,
            assigned_users: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    #[must_use]
    pub fn service(&self, service_id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == service_id)
    }

    #[must_use]
    pub fn status(&self) -> CaseStatus {
        self.status
    }

    #[must_use]
    pub fn completion_percentage(&self) -> u8 {
        self.completion_percentage
    }

    /// Summary currently held by the case
    #[must_use]
    pub fn summary(&self) -> StatusSummary {
        StatusSummary {
            overall_status: self.status,
            completion_percentage: self.completion_percentage,
        }
    }

    /// Whether the held summary matches what the services imply
    #[must_use]
    pub fn is_consistent(&self, default_status: CaseStatus) -> bool {
        self.summary() == status::summarize_services(&self.services, default_status)
    }

    /// Re-derive the summary from the services
    pub fn recompute(&mut self, default_status: CaseStatus) -> StatusSummary {
        let summary = status::summarize_services(&self.services, default_status);
        self.apply_summary(summary);
        summary
    }

    /// Change one service's status and re-derive the case summary
    ///
    /// Returns the previous status of the service.
    ///
    /// # Errors
    /// Returns `FranchiseError::ServiceNotFound` if the case has no such service
    pub fn set_service_status(
        &mut self,
        service_id: &str,
        new_status: ServiceStatus,
        default_status: CaseStatus,
    ) -> Result<ServiceStatus> {
        let service = self
            .services
            .iter_mut()
            .find(|s| s.id == service_id)
            .ok_or_else(|| FranchiseError::ServiceNotFound {
                id: service_id.to_string(),
            })?;
        let previous = std::mem::replace(&mut service.status, new_status);
        service.completion_percentage = if new_status == ServiceStatus::Completed {
            100
        } else {
            service.completion_percentage.min(99)
        };
        self.recompute(default_status);
        Ok(previous)
    }

    /// Set the summary directly, bypassing aggregation
    pub fn override_summary(&mut self, summary: StatusSummary, reason: &str) {
        warn!(
            case_id = %self.id,
            status = %summary.overall_status,
            completion = summary.completion_percentage,
            reason,
            "Overriding derived case summary"
        );
        self.apply_summary(summary);
    }

    /// Whether the user is on the case team
    #[must_use]
    pub fn is_assigned(&self, user_id: &str) -> bool {
        self.assigned_users.iter().any(|u| u.id == user_id)
    }

    /// Ids of the case team, in assignment order, without duplicates
    #[must_use]
    pub fn assignee_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::with_capacity(self.assigned_users.len());
        for user in &self.assigned_users {
            if !ids.contains(&user.id.as_str()) {
                ids.push(&user.id);
            }
        }
        ids
    }

    pub(crate) fn apply_summary(&mut self, summary: StatusSummary) {
        self.status = summary.overall_status;
        self.completion_percentage = summary.completion_percentage;
        self.updated_at = Utc::now();
    }

    pub(crate) fn snapshot(&self) -> CaseSnapshot {
        CaseSnapshot {
            services: self.services.clone(),
            summary: self.summary(),
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn restore(&mut self, snapshot: CaseSnapshot) {
        self.services = snapshot.services;
        self.status = snapshot.summary.overall_status;
        self.completion_percentage = snapshot.summary.completion_percentage;
        self.updated_at = snapshot.updated_at;
    }
}

/// Comment left on a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Remark {
    #[serde(alias = "_id")]
    pub id: String,
    pub case_id: String,
    pub service_id: String,
    #[serde(alias = "userId")]
    pub author_id: String,
    #[serde(default, alias = "userName")]
    pub author_name: String,
    #[serde(rename = "text", alias = "remark")]
    pub body: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    read_by: Vec<String>,
}

impl Remark {
    /// Create a remark; the author has read their own remark
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        case_id: impl Into<String>,
        service_id: impl Into<String>,
        author_id: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        let author_id = author_id.into();
        Self {
            id: id.into(),
            case_id: case_id.into(),
            service_id: service_id.into(),
            read_by: vec![author_id.clone()],
            author_id,
            author_name: String::new(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }

    /// Replace the reader list, dropping duplicates but keeping first-read order
    #[must_use]
    pub fn with_readers<I, S>(mut self, readers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.read_by.clear();
        for reader in readers {
            self.mark_read_by(reader.into());
        }
        self
    }

    /// Ids of users who have read the remark, in the order they read it
    #[must_use]
    pub fn read_by(&self) -> &[String] {
        &self.read_by
    }

    #[must_use]
    pub fn is_read_by(&self, user_id: &str) -> bool {
        self.read_by.iter().any(|id| id == user_id)
    }

    /// Append `user_id` to the readers
    ///
    /// Returns `true` when the reader list changed. The list only grows.
    pub fn mark_read_by(&mut self, user_id: impl Into<String>) -> bool {
        let user_id = user_id.into();
        if self.is_read_by(&user_id) {
            return false;
        }
        self.read_by.push(user_id);
        true
    }

    /// Undo an optimistic append that the backend refused
    pub(crate) fn retract_read(&mut self, user_id: &str) {
        if self.read_by.last().map(String::as_str) == Some(user_id) {
            self.read_by.pop();
        } else {
            self.read_by.retain(|id| id != user_id);
        }
    }
}

/// Push notification addressed to one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// Dispatch request for a push notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: String,
    pub message: String,
}

/// Remark form submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRemark {
    pub case_id: String,
    pub service_id: String,
    pub text: String,
}
