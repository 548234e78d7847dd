//! Change events for badge counters and other observers

use crate::status::StatusSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// What changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum EventType {
    /// The viewer read one or more remarks
    RemarksRead {
        viewer: String,
        remark_ids: Vec<String>,
    },
    /// Optimistic reads the backend refused were taken back
    RemarksReadReverted {
        viewer: String,
        remark_ids: Vec<String>,
    },
    /// A case summary was re-derived locally
    CaseSummaryChanged {
        case_id: String,
        summary: StatusSummary,
    },
    /// A case summary was rolled back after a failed save
    CaseSummaryReverted {
        case_id: String,
        summary: StatusSummary,
    },
}

impl EventType {
    /// Case the event concerns, if it is case-scoped
    #[must_use]
    pub fn case_id(&self) -> Option<&str> {
        match self {
            Self::CaseSummaryChanged { case_id, .. } | Self::CaseSummaryReverted { case_id, .. } => {
                Some(case_id)
            }
            Self::RemarksRead { .. } | Self::RemarksReadReverted { .. } => None,
        }
    }
}

/// Event envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    #[must_use]
    pub fn new(event_type: EventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            timestamp: Utc::now(),
        }
    }
}

/// Fan-out point for change events
///
/// Cloning yields another handle onto the same channel. Publishing with no
/// subscribers is not an error.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<Event>,
}

impl EventBroadcaster {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event_type: EventType) -> usize {
        let event = Event::new(event_type);
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                trace!("No subscribers for event");
                0
            }
        }
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
