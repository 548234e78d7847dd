//! Per-viewer unread remark tracking
//!
//! The free functions are the pure core. [`UnreadTracker`] holds one viewer's
//! remark list and publishes an [`EventType::RemarksRead`] event each time a
//! call actually changes read state, so badge counters recompute once per
//! call (once per batch for [`UnreadTracker::mark_all_as_read`]).

use crate::error::{FranchiseError, Result};
use crate::events::{EventBroadcaster, EventType};
use crate::models::{Notification, Remark};
use std::collections::BTreeMap;
use tracing::debug;

/// Whether `viewer` has not read `remark`
#[must_use]
pub fn is_unread(remark: &Remark, viewer: &str) -> bool {
    !remark.is_read_by(viewer)
}

/// Number of remarks `viewer` has not read
pub fn unread_count<'a, I>(remarks: I, viewer: &str) -> usize
where
    I: IntoIterator<Item = &'a Remark>,
{
    remarks
        .into_iter()
        .filter(|remark| is_unread(remark, viewer))
        .count()
}

/// Record that `viewer` read `remark`; returns `true` if it was unread
pub fn mark_as_read(remark: &mut Remark, viewer: &str) -> bool {
    remark.mark_read_by(viewer)
}

/// Mark every unread remark as read, returning the ids that changed
pub fn mark_all_as_read(remarks: &mut [Remark], viewer: &str) -> Vec<String> {
    remarks
        .iter_mut()
        .filter_map(|remark| mark_as_read(remark, viewer).then(|| remark.id.clone()))
        .collect()
}

/// Unread counts keyed by service id; services with nothing unread are omitted
pub fn unread_by_service<'a, I>(remarks: I, viewer: &str) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a Remark>,
{
    let mut counts = BTreeMap::new();
    for remark in remarks {
        if is_unread(remark, viewer) {
            *counts.entry(remark.service_id.clone()).or_insert(0) += 1;
        }
    }
    counts
}

/// Oldest unread remark, the one a thread view scrolls to and highlights
pub fn first_unread<'a, I>(remarks: I, viewer: &str) -> Option<&'a Remark>
where
    I: IntoIterator<Item = &'a Remark>,
{
    remarks
        .into_iter()
        .filter(|remark| is_unread(remark, viewer))
        .min_by_key(|remark| remark.created_at)
}

/// Number of unread notifications for the header badge
#[must_use]
pub fn unread_notification_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.read).count()
}

/// One viewer's remarks plus the observers of their read state
#[derive(Debug, Clone)]
pub struct UnreadTracker {
    viewer: String,
    remarks: Vec<Remark>,
    events: EventBroadcaster,
}

impl UnreadTracker {
    #[must_use]
    pub fn new(viewer: impl Into<String>, remarks: Vec<Remark>, events: EventBroadcaster) -> Self {
        Self {
            viewer: viewer.into(),
            remarks,
            events,
        }
    }

    #[must_use]
    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    #[must_use]
    pub fn remarks(&self) -> &[Remark] {
        &self.remarks
    }

    #[must_use]
    pub fn remark(&self, remark_id: &str) -> Option<&Remark> {
        self.remarks.iter().find(|r| r.id == remark_id)
    }

    #[must_use]
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Swap in a freshly fetched remark list
    pub fn replace_remarks(&mut self, remarks: Vec<Remark>) {
        self.remarks = remarks;
    }

    /// Add a newly created remark to the end of the thread
    pub fn push(&mut self, remark: Remark) {
        self.remarks.push(remark);
    }

    /// Drop a remark that was deleted on the backend
    pub fn remove(&mut self, remark_id: &str) -> Option<Remark> {
        let index = self.remarks.iter().position(|r| r.id == remark_id)?;
        Some(self.remarks.remove(index))
    }

    #[must_use]
    pub fn is_unread(&self, remark_id: &str) -> bool {
        self.remark(remark_id)
            .is_some_and(|remark| is_unread(remark, &self.viewer))
    }

    #[must_use]
    pub fn unread_count(&self) -> usize {
        unread_count(&self.remarks, &self.viewer)
    }

    #[must_use]
    pub fn unread_by_service(&self) -> BTreeMap<String, usize> {
        unread_by_service(&self.remarks, &self.viewer)
    }

    #[must_use]
    pub fn first_unread(&self) -> Option<&Remark> {
        first_unread(&self.remarks, &self.viewer)
    }

    /// Mark one remark as read
    ///
    /// Returns `false` without signalling when the viewer had already read it.
    ///
    /// # Errors
    /// Returns `FranchiseError::RemarkNotFound` if the remark is not tracked
    pub fn mark_as_read(&mut self, remark_id: &str) -> Result<bool> {
        let viewer = self.viewer.clone();
        let remark = self
            .remarks
            .iter_mut()
            .find(|r| r.id == remark_id)
            .ok_or_else(|| FranchiseError::RemarkNotFound {
                id: remark_id.to_string(),
            })?;

        if !mark_as_read(remark, &viewer) {
            return Ok(false);
        }

        debug!(remark_id, viewer = %viewer, "Remark marked as read");
        self.events.publish(EventType::RemarksRead {
            viewer,
            remark_ids: vec![remark_id.to_string()],
        });
        Ok(true)
    }

    /// Mark every unread remark as read as one batch with a single signal
    pub fn mark_all_as_read(&mut self) -> Vec<String> {
        let changed = mark_all_as_read(&mut self.remarks, &self.viewer);
        if !changed.is_empty() {
            debug!(count = changed.len(), viewer = %self.viewer, "Remarks marked as read");
            self.events.publish(EventType::RemarksRead {
                viewer: self.viewer.clone(),
                remark_ids: changed.clone(),
            });
        }
        changed
    }

    /// Take back optimistic reads that the backend refused
    pub(crate) fn revert_reads(&mut self, remark_ids: &[String]) {
        if remark_ids.is_empty() {
            return;
        }
        for remark in self
            .remarks
            .iter_mut()
            .filter(|r| remark_ids.contains(&r.id))
        {
            remark.retract_read(&self.viewer);
        }
        self.events.publish(EventType::RemarksReadReverted {
            viewer: self.viewer.clone(),
            remark_ids: remark_ids.to_vec(),
        });
    }
}
