//! Fixtures and an in-memory backend for tests
//!
//! [`MockBackend`] implements every API trait over plain collections and can
//! be told to fail specific calls, which is how the rollback and fan-out
//! paths are exercised without a server.

use crate::api::{CaseApi, NotificationApi, RemarkApi, UserApi};
use crate::error::{FranchiseError, Result};
use crate::models::{
    Case, CaseStatus, Notification, NotificationRequest, NewRemark, Permissions, Remark, Role,
    Service, ServiceStatus, User, UserRef,
};
use crate::status::StatusSummary;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Member with no permissions
#[must_use]
pub fn mock_user(id: &str, name: &str) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: Some(format!("{id}@franchise.test")),
        role: Role::Member("Member".to_string()),
        permissions: Permissions::default(),
    }
}

#[must_use]
pub fn mock_admin(id: &str, name: &str) -> User {
    User {
        role: Role::Admin,
        ..mock_user(id, name)
    }
}

/// Case with one service per status (ids `s1`, `s2`, ...) and the given team
#[must_use]
pub fn mock_case(id: &str, statuses: &[ServiceStatus], assignees: &[&str]) -> Case {
    let services = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| Service::new(format!("s{}", i + 1), format!("Service {}", i + 1), *status))
        .collect();
    let mut case = Case::new(id, 1, services, CaseStatus::NewCase);
    case.owner_name = "Owner".to_string();
    case.client_name = "Client".to_string();
    case.unit_name = format!("Unit {id}");
    case.assigned_users = assignees.iter().map(|a| UserRef::new(*a)).collect();
    case
}

/// Remark on `case_id`/`service_id` written by `author` and read by `readers`
#[must_use]
pub fn mock_remark(id: &str, case_id: &str, service_id: &str, author: &str, readers: &[&str]) -> Remark {
    Remark::new(id, case_id, service_id, author, format!("remark {id}"))
        .with_readers(readers.iter().copied())
}

fn injected(operation: &str) -> FranchiseError {
    FranchiseError::Api {
        status: 500,
        message: format!("injected failure in {operation}"),
    }
}

#[derive(Debug, Default)]
struct MockState {
    cases: BTreeMap<String, Case>,
    remarks: Vec<Remark>,
    users: HashMap<String, User>,
    notifications: Vec<Notification>,
    sent: Vec<NotificationRequest>,
    failing_recipients: HashSet<String>,
    failing_reads: HashSet<String>,
    fail_writes: bool,
    failing_methods: HashMap<&'static str, usize>,
    acting_user: Option<String>,
    calls: HashMap<&'static str, usize>,
    next_id: u64,
}

impl MockState {
    fn record(&mut self, call: &'static str) {
        *self.calls.entry(call).or_default() += 1;
    }

    fn write_fails(&mut self, call: &'static str) -> bool {
        if self.fail_writes {
            return true;
        }
        match self.failing_methods.get_mut(call) {
            Some(0) => true,
            Some(successes) => {
                *successes -= 1;
                false
            }
            None => false,
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn case_mut(&mut self, case_id: &str) -> Result<&mut Case> {
        self.cases
            .get_mut(case_id)
            .ok_or_else(|| FranchiseError::CaseNotFound {
                id: case_id.to_string(),
            })
    }
}

/// In-memory implementation of every backend trait
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_case(&self, case: Case) {
        self.state.lock().cases.insert(case.id.clone(), case);
    }

    #[must_use]
    pub fn case(&self, case_id: &str) -> Option<Case> {
        self.state.lock().cases.get(case_id).cloned()
    }

    pub fn add_remark(&self, remark: Remark) {
        self.state.lock().remarks.push(remark);
    }

    #[must_use]
    pub fn remark(&self, remark_id: &str) -> Option<Remark> {
        self.state
            .lock()
            .remarks
            .iter()
            .find(|r| r.id == remark_id)
            .cloned()
    }

    pub fn add_user(&self, user: User) {
        self.state.lock().users.insert(user.id.clone(), user);
    }

    pub fn add_notification(&self, notification: Notification) {
        self.state.lock().notifications.push(notification);
    }

    /// User the backend attributes new remarks to
    pub fn act_as(&self, user_id: &str) {
        self.state.lock().acting_user = Some(user_id.to_string());
    }

    /// Every notification dispatch that succeeded, in order
    #[must_use]
    pub fn sent_notifications(&self) -> Vec<NotificationRequest> {
        self.state.lock().sent.clone()
    }

    /// Make dispatches to `user_id` fail
    pub fn fail_notifications_for(&self, user_id: &str) {
        self.state
            .lock()
            .failing_recipients
            .insert(user_id.to_string());
    }

    /// Make read-state writes for `remark_id` fail
    pub fn fail_read_for(&self, remark_id: &str) {
        self.state.lock().failing_reads.insert(remark_id.to_string());
    }

    /// Make every case and remark mutation fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Let the named mutation succeed `successes` more times, then fail it
    /// on every later call
    pub fn fail_method_after(&self, method: &'static str, successes: usize) {
        self.state.lock().failing_methods.insert(method, successes);
    }

    /// How many times the named trait method was called
    #[must_use]
    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }
}

#[async_trait]
impl CaseApi for MockBackend {
    async fn list_cases(&self) -> Result<Vec<Case>> {
        let mut state = self.state.lock();
        state.record("list_cases");
        Ok(state.cases.values().cloned().collect())
    }

    async fn get_case(&self, case_id: &str) -> Result<Case> {
        let mut state = self.state.lock();
        state.record("get_case");
        state.case_mut(case_id).map(|c| c.clone())
    }

    async fn update_case_status(&self, case_id: &str, summary: StatusSummary) -> Result<()> {
        let mut state = self.state.lock();
        state.record("update_case_status");
        if state.write_fails("update_case_status") {
            return Err(injected("update_case_status"));
        }
        state.case_mut(case_id)?.apply_summary(summary);
        Ok(())
    }

    async fn update_service_status(
        &self,
        case_id: &str,
        service_id: &str,
        status: ServiceStatus,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.record("update_service_status");
        if state.write_fails("update_service_status") {
            return Err(injected("update_service_status"));
        }
        state
            .case_mut(case_id)?
            .set_service_status(service_id, status, CaseStatus::NewCase)?;
        Ok(())
    }
}

#[async_trait]
impl RemarkApi for MockBackend {
    async fn list_remarks(&self, case_id: &str, service_id: &str) -> Result<Vec<Remark>> {
        let mut state = self.state.lock();
        state.record("list_remarks");
        Ok(state
            .remarks
            .iter()
            .filter(|r| r.case_id == case_id && r.service_id == service_id)
            .cloned()
            .collect())
    }

    async fn create_remark(&self, remark: &NewRemark) -> Result<Remark> {
        let mut state = self.state.lock();
        state.record("create_remark");
        if state.write_fails("create_remark") {
            return Err(injected("create_remark"));
        }
        let id = state.next_id("remark");
        let author = state
            .acting_user
            .clone()
            .unwrap_or_else(|| "mock-user".to_string());
        let created = Remark::new(id, &remark.case_id, &remark.service_id, author, &remark.text);
        state.remarks.push(created.clone());
        Ok(created)
    }

    async fn mark_remark_read(&self, remark_id: &str, user_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record("mark_remark_read");
        if state.write_fails("mark_remark_read") || state.failing_reads.contains(remark_id) {
            return Err(injected("mark_remark_read"));
        }
        let remark = state
            .remarks
            .iter_mut()
            .find(|r| r.id == remark_id)
            .ok_or_else(|| FranchiseError::RemarkNotFound {
                id: remark_id.to_string(),
            })?;
        remark.mark_read_by(user_id);
        Ok(())
    }

    async fn delete_remark(&self, remark_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record("delete_remark");
        if state.write_fails("delete_remark") {
            return Err(injected("delete_remark"));
        }
        let before = state.remarks.len();
        state.remarks.retain(|r| r.id != remark_id);
        if state.remarks.len() == before {
            return Err(FranchiseError::RemarkNotFound {
                id: remark_id.to_string(),
            });
        }
        Ok(())
    }

    async fn delete_all_remarks(&self, case_id: &str, service_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record("delete_all_remarks");
        if state.write_fails("delete_all_remarks") {
            return Err(injected("delete_all_remarks"));
        }
        state
            .remarks
            .retain(|r| !(r.case_id == case_id && r.service_id == service_id));
        Ok(())
    }
}

#[async_trait]
impl UserApi for MockBackend {
    async fn get_user(&self, user_id: &str) -> Result<User> {
        let mut state = self.state.lock();
        state.record("get_user");
        state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| FranchiseError::UserNotFound {
                id: user_id.to_string(),
            })
    }

    async fn get_permissions(&self, user_id: &str) -> Result<Permissions> {
        let mut state = self.state.lock();
        state.record("get_permissions");
        state
            .users
            .get(user_id)
            .map(|u| u.permissions)
            .ok_or_else(|| FranchiseError::UserNotFound {
                id: user_id.to_string(),
            })
    }
}

#[async_trait]
impl NotificationApi for MockBackend {
    async fn send_notification(&self, request: &NotificationRequest) -> Result<()> {
        let mut state = self.state.lock();
        state.record("send_notification");
        if state.failing_recipients.contains(&request.user_id) {
            return Err(FranchiseError::Http(format!(
                "connection reset while notifying {}",
                request.user_id
            )));
        }
        let id = state.next_id("notification");
        state.notifications.push(Notification {
            id,
            user_id: request.user_id.clone(),
            message: request.message.clone(),
            read: false,
            created_at: Utc::now(),
        });
        state.sent.push(request.clone());
        Ok(())
    }

    async fn list_notifications(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut state = self.state.lock();
        state.record("list_notifications");
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(&self, notification_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.record("mark_notification_read");
        match state
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
        {
            Some(notification) => {
                notification.read = true;
                Ok(())
            }
            None => Err(FranchiseError::Api {
                status: 404,
                message: format!("notification {notification_id} not found"),
            }),
        }
    }
}
