//! Optimistic writes to the backend
//!
//! Every mutation is applied to local state first, then persisted. When the
//! backend refuses, the local change is rolled back, a revert event is
//! published and the backend error is returned; its
//! [`user_notice`](crate::FranchiseError::user_notice) is meant for a
//! transient message. Notification fan-out only follows a confirmed write.

use crate::access;
use crate::api::BackendApi;
use crate::error::{FranchiseError, Result};
use crate::events::{EventBroadcaster, EventType};
use crate::models::{Case, CaseStatus, NewRemark, Remark, ServiceStatus};
use crate::notify::{self, FanOutReport};
use crate::observability;
use crate::session::SessionContext;
use crate::status::StatusSummary;
use crate::unread::UnreadTracker;
use crate::validation;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Result of a read-state change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadOutcome {
    /// Remarks whose read state the backend confirmed
    pub marked: Vec<String>,
    /// Optimistic reads taken back after the backend refused them
    pub reverted: Vec<String>,
    /// Team fan-out result, kept out of serialized output
    #[serde(skip)]
    pub notifications: FanOutReport,
}

impl ReadOutcome {
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.marked.is_empty() && self.reverted.is_empty()
    }
}

/// A remark the backend accepted, plus the team notifications it triggered
#[derive(Debug, Clone, PartialEq)]
pub struct RemarkOutcome {
    pub remark: Remark,
    pub notifications: FanOutReport,
}

/// Runs optimistic updates against a backend
pub struct Synchronizer<'a, A: ?Sized> {
    api: &'a A,
    events: EventBroadcaster,
    default_status: CaseStatus,
}

impl<'a, A> Synchronizer<'a, A>
where
    A: BackendApi + ?Sized,
{
    #[must_use]
    pub fn new(api: &'a A, events: EventBroadcaster, default_status: CaseStatus) -> Self {
        Self {
            api,
            events,
            default_status,
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Re-derive the case summary and write it back
    ///
    /// # Errors
    /// Returns the backend error after restoring the previous summary
    #[instrument(skip(self, case), fields(case_id = %case.id))]
    pub async fn recompute_and_persist(&self, case: &mut Case) -> Result<StatusSummary> {
        let snapshot = case.snapshot();
        let previous = case.summary();
        let summary = case.recompute(self.default_status);
        self.announce(case, previous, summary);

        match self.api.update_case_status(&case.id, summary).await {
            Ok(()) => {
                debug!(status = %summary.overall_status, completion = summary.completion_percentage, "Case summary saved");
                Ok(summary)
            }
            Err(e) => {
                case.restore(snapshot);
                self.roll_back(case, previous, summary, "update_case_status", &e);
                Err(e)
            }
        }
    }

    /// Change a service status and persist it together with the new case summary
    ///
    /// The service is written first. If the backend then refuses the case
    /// summary, the service write is undone with a second PATCH carrying the
    /// previous status so the stored case matches its stored summary.
    ///
    /// # Errors
    /// Returns `FranchiseError::ServiceNotFound` before any write when the
    /// service is unknown, otherwise the backend error after restoring the
    /// service and the summary. A failed undo is appended to that error.
    #[instrument(skip(self, case), fields(case_id = %case.id))]
    pub async fn set_service_status(
        &self,
        case: &mut Case,
        service_id: &str,
        status: ServiceStatus,
    ) -> Result<StatusSummary> {
        let snapshot = case.snapshot();
        let previous = case.summary();
        let previous_status = case.set_service_status(service_id, status, self.default_status)?;
        let summary = case.summary();
        self.announce(case, previous, summary);

        if let Err(e) = self
            .api
            .update_service_status(&case.id, service_id, status)
            .await
        {
            case.restore(snapshot);
            self.roll_back(case, previous, summary, "update_service_status", &e);
            return Err(e);
        }

        match self.api.update_case_status(&case.id, summary).await {
            Ok(()) => {
                info!(service_id, %status, "Service status saved");
                Ok(summary)
            }
            Err(e) => {
                let e = match self
                    .api
                    .update_service_status(&case.id, service_id, previous_status)
                    .await
                {
                    Ok(()) => {
                        debug!(service_id, status = %previous_status, "Service status write undone");
                        e
                    }
                    Err(undo) => {
                        warn!(
                            service_id,
                            status = %previous_status,
                            error = %undo,
                            "Could not undo service status write, backend summary is stale"
                        );
                        e.with_note(format!("restoring service {service_id} also failed: {undo}"))
                    }
                };
                case.restore(snapshot);
                self.roll_back(case, previous, summary, "update_case_status", &e);
                Err(e)
            }
        }
    }

    /// Mark one remark read, persist it and tell the rest of the case team
    ///
    /// Reading an already-read remark does nothing and calls nothing.
    ///
    /// # Errors
    /// Returns `FranchiseError::RemarkNotFound` if the tracker does not hold
    /// the remark, otherwise the backend error after the read is reverted
    #[instrument(skip(self, tracker, case, reader_name), fields(viewer = %tracker.viewer()))]
    pub async fn mark_read(
        &self,
        tracker: &mut UnreadTracker,
        case: &Case,
        remark_id: &str,
        reader_name: &str,
    ) -> Result<ReadOutcome> {
        if !tracker.mark_as_read(remark_id)? {
            return Ok(ReadOutcome::default());
        }

        let viewer = tracker.viewer().to_string();
        if let Err(e) = self.api.mark_remark_read(remark_id, &viewer).await {
            warn!(remark_id, error = %e, "Read state not saved, reverting");
            tracker.revert_reads(&[remark_id.to_string()]);
            observability::record_rollback("mark_remark_read");
            return Err(e);
        }

        let message = notify::read_receipt_message(reader_name, case, 1);
        let notifications = notify::notify_case_team(self.api, case, &viewer, &message).await;
        Ok(ReadOutcome {
            marked: vec![remark_id.to_string()],
            reverted: Vec::new(),
            notifications,
        })
    }

    /// Mark every unread remark read as one batch
    ///
    /// Writes go out one by one. Reads the backend refuses are reverted
    /// together and listed in [`ReadOutcome::reverted`]. Unlike calling
    /// [`mark_read`](Self::mark_read) per remark, which notifies the team
    /// once per read, a batch sends one notification per recipient that
    /// counts every confirmed read.
    ///
    /// # Errors
    /// Returns the first backend error when no write at all succeeded
    #[instrument(skip(self, tracker, case, reader_name), fields(viewer = %tracker.viewer()))]
    pub async fn mark_all_read(
        &self,
        tracker: &mut UnreadTracker,
        case: &Case,
        reader_name: &str,
    ) -> Result<ReadOutcome> {
        let changed = tracker.mark_all_as_read();
        if changed.is_empty() {
            return Ok(ReadOutcome::default());
        }

        let viewer = tracker.viewer().to_string();
        let mut marked = Vec::with_capacity(changed.len());
        let mut reverted = Vec::new();
        let mut first_error = None;
        for remark_id in changed {
            match self.api.mark_remark_read(&remark_id, &viewer).await {
                Ok(()) => marked.push(remark_id),
                Err(e) => {
                    warn!(remark_id = %remark_id, error = %e, "Read state not saved");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    reverted.push(remark_id);
                }
            }
        }

        if !reverted.is_empty() {
            tracker.revert_reads(&reverted);
            observability::record_rollback("mark_remark_read");
        }
        if marked.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let message = notify::read_receipt_message(reader_name, case, marked.len());
        let notifications = notify::notify_case_team(self.api, case, &viewer, &message).await;
        Ok(ReadOutcome {
            marked,
            reverted,
            notifications,
        })
    }

    /// Validate and create a remark as the signed-in user
    ///
    /// The author counts as having read their own remark. When a tracker for
    /// the same service is supplied the new remark is added to it.
    ///
    /// # Errors
    /// Returns `FranchiseError::Validation` listing every invalid field, a
    /// permission error, or the backend error
    #[instrument(skip(self, session, case, submission, tracker), fields(case_id = %case.id))]
    pub async fn add_remark(
        &self,
        session: &SessionContext,
        case: &Case,
        submission: &NewRemark,
        tracker: Option<&mut UnreadTracker>,
    ) -> Result<RemarkOutcome> {
        access::require_remarks(session, case)?;
        validation::validate_new_remark(submission, Some(case)).into_result()?;

        let author = session.current_user()?;
        let mut remark = self.api.create_remark(submission).await?;
        remark.mark_read_by(author.id.as_str());
        if remark.author_name.is_empty() {
            remark.author_name.clone_from(&author.name);
        }
        if let Some(tracker) = tracker {
            tracker.push(remark.clone());
        }

        let service_name = case
            .service(&submission.service_id)
            .map_or(submission.service_id.as_str(), |s| s.name.as_str());
        let message = notify::new_remark_message(&author.name, case, service_name);
        let notifications = notify::notify_case_team(self.api, case, &author.id, &message).await;

        info!(remark_id = %remark.id, "Remark added");
        Ok(RemarkOutcome {
            remark,
            notifications,
        })
    }

    /// Delete one remark
    ///
    /// # Errors
    /// Returns a permission error or the backend error
    #[instrument(skip(self, session, case, tracker), fields(case_id = %case.id))]
    pub async fn delete_remark(
        &self,
        session: &SessionContext,
        case: &Case,
        remark_id: &str,
        tracker: Option<&mut UnreadTracker>,
    ) -> Result<()> {
        access::require_delete(session, case)?;
        self.api.delete_remark(remark_id).await?;
        if let Some(tracker) = tracker {
            tracker.remove(remark_id);
        }
        Ok(())
    }

    /// Delete every remark on one service
    ///
    /// # Errors
    /// Returns a permission error or the backend error
    #[instrument(skip(self, session, case, tracker), fields(case_id = %case.id))]
    pub async fn delete_all_remarks(
        &self,
        session: &SessionContext,
        case: &Case,
        service_id: &str,
        tracker: Option<&mut UnreadTracker>,
    ) -> Result<()> {
        access::require_delete(session, case)?;
        self.api.delete_all_remarks(&case.id, service_id).await?;
        if let Some(tracker) = tracker {
            let ids: Vec<String> = tracker
                .remarks()
                .iter()
                .filter(|r| r.service_id == service_id)
                .map(|r| r.id.clone())
                .collect();
            for id in ids {
                tracker.remove(&id);
            }
        }
        Ok(())
    }

    fn announce(&self, case: &Case, previous: StatusSummary, summary: StatusSummary) {
        if previous != summary {
            self.events.publish(EventType::CaseSummaryChanged {
                case_id: case.id.clone(),
                summary,
            });
        }
    }

    fn roll_back(
        &self,
        case: &Case,
        previous: StatusSummary,
        attempted: StatusSummary,
        operation: &'static str,
        error: &FranchiseError,
    ) {
        warn!(case_id = %case.id, operation, error = %error, "Save failed, case rolled back");
        observability::record_rollback(operation);
        if previous != attempted {
            self.events.publish(EventType::CaseSummaryReverted {
                case_id: case.id.clone(),
                summary: previous,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Event;
    use crate::models::Permissions;
    use crate::test_utils::{mock_case, mock_remark, mock_user, MockBackend};
    use tokio::sync::broadcast::error::TryRecvError;

    fn drain(receiver: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<EventType> {
        let mut events = Vec::new();
        loop {
            match receiver.try_recv() {
                Ok(event) => events.push(event.event_type),
                Err(TryRecvError::Empty) => return events,
                Err(other) => panic!("unexpected receive error: {other:?}"),
            }
        }
    }

    fn sync(backend: &MockBackend) -> Synchronizer<'_, MockBackend> {
        Synchronizer::new(backend, EventBroadcaster::new(), CaseStatus::NewCase)
    }

    #[tokio::test]
    async fn test_recompute_and_persist() {
        let backend = MockBackend::new();
        let mut case = mock_case(
            "c1",
            &[
                ServiceStatus::Completed,
                ServiceStatus::Completed,
                ServiceStatus::InProgress,
            ],
            &[],
        );
        backend.add_case(case.clone());
        let stale = StatusSummary::empty(CaseStatus::NewCase);
        case.override_summary(stale, "stale copy");

        let sync = sync(&backend);
        let mut events = sync.events().subscribe();
        let summary = sync.recompute_and_persist(&mut case).await.unwrap();

        assert_eq!(summary.completion_percentage, 67);
        assert_eq!(case.summary(), summary);
        assert_eq!(backend.case("c1").unwrap().summary(), summary);
        assert!(matches!(
            drain(&mut events).as_slice(),
            [EventType::CaseSummaryChanged { .. }]
        ));
    }

    #[tokio::test]
    async fn test_recompute_rolls_back_on_failure() {
        let backend = MockBackend::new();
        let mut case = mock_case("c1", &[ServiceStatus::Completed], &[]);
        let stale = StatusSummary::empty(CaseStatus::NewCase);
        case.override_summary(stale, "stale copy");
        let before = case.clone();
        backend.add_case(case.clone());
        backend.set_fail_writes(true);

        let sync = sync(&backend);
        let mut events = sync.events().subscribe();
        let err = sync.recompute_and_persist(&mut case).await.unwrap_err();

        assert!(err.is_remote());
        assert_eq!(case, before);
        let events = drain(&mut events);
        assert_eq!(events.len(), 2);
        assert!(matches!(
            &events[1],
            EventType::CaseSummaryReverted { summary, .. } if *summary == stale
        ));
    }

    #[tokio::test]
    async fn test_set_service_status_rolls_back_together() {
        let backend = MockBackend::new();
        let mut case = mock_case(
            "c1",
            &[ServiceStatus::InProgress, ServiceStatus::ToBeStarted],
            &[],
        );
        backend.add_case(case.clone());
        backend.set_fail_writes(true);
        let before = case.clone();

        let result = sync(&backend)
            .set_service_status(&mut case, "s1", ServiceStatus::Completed)
            .await;

        assert!(result.is_err());
        assert_eq!(case, before);
        assert_eq!(case.service("s1").unwrap().status, ServiceStatus::InProgress);
    }

    #[tokio::test]
    async fn test_refused_summary_undoes_service_write() {
        let backend = MockBackend::new();
        let mut case = mock_case(
            "c1",
            &[ServiceStatus::Completed, ServiceStatus::ToBeStarted],
            &[],
        );
        backend.add_case(case.clone());
        backend.fail_method_after("update_case_status", 0);
        let before = case.clone();

        let sync = sync(&backend);
        let mut events = sync.events().subscribe();
        let err = sync
            .set_service_status(&mut case, "s2", ServiceStatus::Completed)
            .await
            .unwrap_err();

        assert!(err.is_remote());
        assert_eq!(case, before);
        assert_eq!(backend.calls("update_service_status"), 2);
        let stored = backend.case("c1").unwrap();
        assert_eq!(stored.service("s2").unwrap().status, ServiceStatus::ToBeStarted);
        assert_eq!(stored.summary(), before.summary());
        assert!(matches!(
            drain(&mut events).as_slice(),
            [
                EventType::CaseSummaryChanged { .. },
                EventType::CaseSummaryReverted { .. }
            ]
        ));
    }

    #[tokio::test]
    async fn test_failed_undo_is_reported_with_the_error() {
        let backend = MockBackend::new();
        let mut case = mock_case(
            "c1",
            &[ServiceStatus::Completed, ServiceStatus::ToBeStarted],
            &[],
        );
        backend.add_case(case.clone());
        backend.fail_method_after("update_case_status", 0);
        backend.fail_method_after("update_service_status", 1);
        let before = case.clone();

        let err = sync(&backend)
            .set_service_status(&mut case, "s2", ServiceStatus::Completed)
            .await
            .unwrap_err();

        assert!(err.is_remote());
        assert!(err.to_string().contains("restoring service s2 also failed"));
        assert_eq!(case, before);
        assert_eq!(
            backend.case("c1").unwrap().service("s2").unwrap().status,
            ServiceStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_set_service_status_unknown_service_makes_no_call() {
        let backend = MockBackend::new();
        let mut case = mock_case("c1", &[ServiceStatus::InProgress], &[]);
        let result = sync(&backend)
            .set_service_status(&mut case, "nope", ServiceStatus::Completed)
            .await;
        assert!(matches!(result, Err(FranchiseError::ServiceNotFound { .. })));
        assert_eq!(backend.calls("update_service_status"), 0);
    }

    #[tokio::test]
    async fn test_set_service_status_completes_case() {
        let backend = MockBackend::new();
        let mut case = mock_case(
            "c1",
            &[ServiceStatus::Completed, ServiceStatus::InProgress],
            &[],
        );
        backend.add_case(case.clone());

        let summary = sync(&backend)
            .set_service_status(&mut case, "s2", ServiceStatus::Completed)
            .await
            .unwrap();
        assert_eq!(summary.overall_status, CaseStatus::Completed);
        assert_eq!(summary.completion_percentage, 100);
        assert_eq!(
            backend.case("c1").unwrap().service("s2").unwrap().status,
            ServiceStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_mark_read_notifies_team() {
        let backend = MockBackend::new();
        let case = mock_case("c1", &[ServiceStatus::InProgress], &["u1", "u2", "u3"]);
        let remark = mock_remark("r1", "c1", "s1", "u1", &["u1"]);
        backend.add_remark(remark.clone());
        backend.fail_notifications_for("u3");

        let sync = sync(&backend);
        let mut tracker = UnreadTracker::new("u2", vec![remark], sync.events().clone());
        let outcome = sync
            .mark_read(&mut tracker, &case, "r1", "Ravi")
            .await
            .unwrap();

        assert_eq!(outcome.marked, ["r1"]);
        assert_eq!(outcome.notifications.delivered, ["u1"]);
        assert_eq!(outcome.notifications.failed[0].user_id, "u3");
        assert!(!tracker.is_unread("r1"));
        assert!(backend.remark("r1").unwrap().is_read_by("u2"));

        let again = sync
            .mark_read(&mut tracker, &case, "r1", "Ravi")
            .await
            .unwrap();
        assert!(again.is_noop());
        assert_eq!(backend.calls("mark_remark_read"), 1);
    }

    #[tokio::test]
    async fn test_mark_read_reverts_on_failure() {
        let backend = MockBackend::new();
        let case = mock_case("c1", &[], &["u1", "u2"]);
        let remark = mock_remark("r1", "c1", "s1", "u1", &["u1"]);
        backend.add_remark(remark.clone());
        backend.fail_read_for("r1");

        let sync = sync(&backend);
        let mut events = sync.events().subscribe();
        let mut tracker = UnreadTracker::new("u2", vec![remark], sync.events().clone());
        let result = sync.mark_read(&mut tracker, &case, "r1", "Ravi").await;

        assert!(result.is_err());
        assert!(tracker.is_unread("r1"));
        assert_eq!(tracker.remark("r1").unwrap().read_by(), ["u1"]);
        assert_eq!(backend.calls("send_notification"), 0);
        let events = drain(&mut events);
        assert!(matches!(
            events.as_slice(),
            [EventType::RemarksRead { .. }, EventType::RemarksReadReverted { .. }]
        ));
    }

    #[tokio::test]
    async fn test_mark_all_read_partial_failure() {
        let backend = MockBackend::new();
        let case = mock_case("c1", &[], &["u1", "u2"]);
        let remarks = vec![
            mock_remark("r1", "c1", "s1", "u1", &["u1"]),
            mock_remark("r2", "c1", "s1", "u1", &["u1"]),
            mock_remark("r3", "c1", "s1", "u1", &["u1", "u2"]),
        ];
        for remark in &remarks {
            backend.add_remark(remark.clone());
        }
        backend.fail_read_for("r2");

        let sync = sync(&backend);
        let mut tracker = UnreadTracker::new("u2", remarks, sync.events().clone());
        let outcome = sync.mark_all_read(&mut tracker, &case, "Ravi").await.unwrap();

        assert_eq!(outcome.marked, ["r1"]);
        assert_eq!(outcome.reverted, ["r2"]);
        assert_eq!(tracker.unread_count(), 1);
        assert!(tracker.is_unread("r2"));
        assert_eq!(
            backend.sent_notifications()[0].message,
            "Ravi read a remark on Unit c1"
        );
    }

    #[tokio::test]
    async fn test_mark_all_read_total_failure_is_error() {
        let backend = MockBackend::new();
        let case = mock_case("c1", &[], &["u1", "u2"]);
        let remarks = vec![mock_remark("r1", "c1", "s1", "u1", &[])];
        backend.set_fail_writes(true);

        let sync = sync(&backend);
        let mut tracker = UnreadTracker::new("u2", remarks, sync.events().clone());
        assert!(sync.mark_all_read(&mut tracker, &case, "Ravi").await.is_err());
        assert_eq!(tracker.unread_count(), 1);
    }

    #[tokio::test]
    async fn test_add_remark() {
        let backend = MockBackend::new();
        backend.act_as("u1");
        let case = mock_case("c1", &[ServiceStatus::InProgress], &["u1", "u2"]);
        let session = SessionContext::in_memory();
        let mut user = mock_user("u1", "Asha");
        user.permissions = Permissions {
            remarks: true,
            ..Permissions::default()
        };
        session.sign_in("tok", &user).unwrap();

        let sync = sync(&backend);
        let mut tracker = UnreadTracker::new("u1", vec![], sync.events().clone());
        let submission = NewRemark {
            case_id: "c1".to_string(),
            service_id: "s1".to_string(),
            text: "Uploaded the lease".to_string(),
        };
        let outcome = sync
            .add_remark(&session, &case, &submission, Some(&mut tracker))
            .await
            .unwrap();

        assert!(outcome.remark.is_read_by("u1"));
        assert_eq!(outcome.remark.author_name, "Asha");
        assert_eq!(tracker.unread_count(), 0);
        assert_eq!(tracker.remarks().len(), 1);
        assert_eq!(outcome.notifications.delivered, ["u2"]);
    }

    #[tokio::test]
    async fn test_add_remark_rejects_invalid_submission() {
        let backend = MockBackend::new();
        let case = mock_case("c1", &[ServiceStatus::InProgress], &["u1"]);
        let session = SessionContext::in_memory();
        let mut user = mock_user("u1", "Asha");
        user.permissions.remarks = true;
        session.sign_in("tok", &user).unwrap();

        let submission = NewRemark {
            case_id: "c1".to_string(),
            service_id: "s1".to_string(),
            text: "  ".to_string(),
        };
        let result = sync(&backend)
            .add_remark(&session, &case, &submission, None)
            .await;
        assert!(matches!(result, Err(FranchiseError::Validation { .. })));
        assert_eq!(backend.calls("create_remark"), 0);
    }

    #[tokio::test]
    async fn test_delete_requires_permission() {
        let backend = MockBackend::new();
        backend.add_remark(mock_remark("r1", "c1", "s1", "u1", &[]));
        let case = mock_case("c1", &[ServiceStatus::InProgress], &["u1"]);
        let session = SessionContext::in_memory();
        let mut user = mock_user("u1", "Asha");
        session.sign_in("tok", &user).unwrap();

        let sync = sync(&backend);
        assert!(matches!(
            sync.delete_remark(&session, &case, "r1", None).await,
            Err(FranchiseError::PermissionDenied { .. })
        ));

        user.permissions.delete = true;
        session.sign_in("tok", &user).unwrap();
        sync.delete_remark(&session, &case, "r1", None).await.unwrap();
        assert!(backend.remark("r1").is_none());
    }
}
