//! Backend API surface
//!
//! Each resource group is a trait so the optimistic-update and fan-out logic
//! can run against [`HttpApiClient`] in production and an in-memory double in
//! tests.

mod http;

pub use http::HttpApiClient;

use crate::error::Result;
use crate::models::{
    Case, Notification, NotificationRequest, NewRemark, Permissions, Remark, ServiceStatus, User,
};
use crate::status::StatusSummary;
use async_trait::async_trait;

/// Case records and their derived summary
#[async_trait]
pub trait CaseApi: Send + Sync {
    async fn list_cases(&self) -> Result<Vec<Case>>;

    /// # Errors
    /// Returns `FranchiseError::CaseNotFound` if the backend has no such case
    async fn get_case(&self, case_id: &str) -> Result<Case>;

    /// Persist a locally derived summary
    async fn update_case_status(&self, case_id: &str, summary: StatusSummary) -> Result<()>;

    async fn update_service_status(
        &self,
        case_id: &str,
        service_id: &str,
        status: ServiceStatus,
    ) -> Result<()>;
}

/// Remarks on services
#[async_trait]
pub trait RemarkApi: Send + Sync {
    async fn list_remarks(&self, case_id: &str, service_id: &str) -> Result<Vec<Remark>>;

    async fn create_remark(&self, remark: &NewRemark) -> Result<Remark>;

    /// Add `user_id` to the remark's readers
    async fn mark_remark_read(&self, remark_id: &str, user_id: &str) -> Result<()>;

    async fn delete_remark(&self, remark_id: &str) -> Result<()>;

    async fn delete_all_remarks(&self, case_id: &str, service_id: &str) -> Result<()>;
}

/// User directory
#[async_trait]
pub trait UserApi: Send + Sync {
    /// # Errors
    /// Returns `FranchiseError::UserNotFound` if the backend has no such user
    async fn get_user(&self, user_id: &str) -> Result<User>;

    async fn get_permissions(&self, user_id: &str) -> Result<Permissions>;
}

/// Push notifications
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn send_notification(&self, request: &NotificationRequest) -> Result<()>;

    async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>>;

    async fn mark_notification_read(&self, notification_id: &str) -> Result<()>;
}

/// Everything the client talks to
pub trait BackendApi: CaseApi + RemarkApi + UserApi + NotificationApi {}

impl<T> BackendApi for T where T: CaseApi + RemarkApi + UserApi + NotificationApi {}
