//! Best-effort notification fan-out
//!
//! Recipients are notified one at a time. A failed dispatch is logged,
//! recorded in the [`FanOutReport`] and skipped; it never aborts the rest of
//! the fan-out and never becomes an error for the caller.

use crate::api::NotificationApi;
use crate::models::{Case, NotificationRequest};
use crate::observability;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

/// A dispatch that did not go through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDelivery {
    pub user_id: String,
    pub error: String,
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanOutReport {
    /// Recipients notified, in dispatch order
    pub delivered: Vec<String>,
    pub failed: Vec<FailedDelivery>,
}

impl FanOutReport {
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failed.len()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Fold another report into this one
    pub fn absorb(&mut self, other: Self) {
        self.delivered.extend(other.delivered);
        self.failed.extend(other.failed);
    }
}

/// Send `message` to each recipient in turn
#[instrument(skip(api, recipients, message))]
pub async fn fan_out<A, I, S>(api: &A, recipients: I, message: &str) -> FanOutReport
where
    A: NotificationApi + ?Sized,
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut report = FanOutReport::default();
    for recipient in recipients {
        let request = NotificationRequest {
            user_id: recipient.into(),
            message: message.to_string(),
        };
        match api.send_notification(&request).await {
            Ok(()) => {
                debug!(recipient = %request.user_id, "Notification sent");
                observability::record_notification(true);
                report.delivered.push(request.user_id);
            }
            Err(e) => {
                warn!(recipient = %request.user_id, error = %e, "Notification failed, skipping");
                observability::record_notification(false);
                report.failed.push(FailedDelivery {
                    user_id: request.user_id,
                    error: e.to_string(),
                });
            }
        }
    }
    report
}

/// Everyone on the case team except the user who acted
#[must_use]
pub fn team_recipients<'a>(case: &'a Case, actor_id: &str) -> Vec<&'a str> {
    case.assignee_ids()
        .into_iter()
        .filter(|id| *id != actor_id)
        .collect()
}

/// Notify the rest of the case team
pub async fn notify_case_team<A>(
    api: &A,
    case: &Case,
    actor_id: &str,
    message: &str,
) -> FanOutReport
where
    A: NotificationApi + ?Sized,
{
    let recipients = team_recipients(case, actor_id);
    if recipients.is_empty() {
        debug!(case_id = %case.id, "No one else on the case team to notify");
        return FanOutReport::default();
    }
    fan_out(api, recipients, message).await
}

/// Text sent when a user reads remarks on a case
#[must_use]
pub fn read_receipt_message(reader: &str, case: &Case, count: usize) -> String {
    let unit = case_label(case);
    match count {
        1 => format!("{reader} read a remark on {unit}"),
        n => format!("{reader} read {n} remarks on {unit}"),
    }
}

/// Text sent when a remark is added to a case
#[must_use]
pub fn new_remark_message(author: &str, case: &Case, service_name: &str) -> String {
    format!("{author} added a remark on {service_name} for {}", case_label(case))
}

fn case_label(case: &Case) -> String {
    if case.unit_name.is_empty() {
        format!("case #{}", case.serial_number)
    } else {
        case.unit_name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServiceStatus;
    use crate::test_utils::{mock_case, MockBackend};

    #[tokio::test]
    async fn test_failed_recipient_does_not_stop_fan_out() {
        let backend = MockBackend::new();
        backend.fail_notifications_for("u2");

        let report = fan_out(&backend, ["u1", "u2", "u3"], "hello").await;

        assert_eq!(report.delivered, ["u1", "u3"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].user_id, "u2");
        assert_eq!(report.attempted(), 3);
        assert!(!report.is_complete());

        let sent: Vec<String> = backend
            .sent_notifications()
            .into_iter()
            .map(|n| n.user_id)
            .collect();
        assert_eq!(sent, ["u1", "u3"]);
        assert_eq!(backend.calls("send_notification"), 3);
    }

    #[tokio::test]
    async fn test_notify_case_team_excludes_actor() {
        let backend = MockBackend::new();
        let case = mock_case("c1", &[ServiceStatus::InProgress], &["u1", "u2", "u1", "u3"]);

        let report = notify_case_team(&backend, &case, "u2", "ping").await;
        assert_eq!(report.delivered, ["u1", "u3"]);
    }

    #[tokio::test]
    async fn test_notify_case_team_alone() {
        let backend = MockBackend::new();
        let case = mock_case("c1", &[], &["u1"]);
        let report = notify_case_team(&backend, &case, "u1", "ping").await;
        assert_eq!(report, FanOutReport::default());
        assert_eq!(backend.calls("send_notification"), 0);
    }

    #[test]
    fn test_messages() {
        let mut case = mock_case("c1", &[], &[]);
        assert_eq!(
            read_receipt_message("Asha", &case, 1),
            "Asha read a remark on Unit c1"
        );
        case.unit_name.clear();
        assert_eq!(
            read_receipt_message("Asha", &case, 3),
            "Asha read 3 remarks on case #1"
        );
        assert_eq!(
            new_remark_message("Ravi", &case, "GST"),
            "Ravi added a remark on GST for case #1"
        );
    }

    #[test]
    fn test_report_absorb() {
        let mut report = FanOutReport {
            delivered: vec!["u1".to_string()],
            failed: vec![],
        };
        report.absorb(FanOutReport {
            delivered: vec![],
            failed: vec![FailedDelivery {
                user_id: "u2".to_string(),
                error: "down".to_string(),
            }],
        });
        assert_eq!(report.attempted(), 2);
    }
}
