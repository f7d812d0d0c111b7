//! Workflow history: an append-only record of what the host did.
//!
//! Every delivery, activity transition and satisfied wait is appended in
//! order, so a finished workflow can be inspected (or persisted with
//! [`crate::core::HistoryStore`]) after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single entry in a workflow's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event was recorded
    pub timestamp: DateTime<Utc>,

    /// The workflow instance this event belongs to
    pub workflow_id: String,

    /// Position in the workflow's history (starts at 1)
    pub sequence: u64,

    /// Type of event
    pub event_type: HistoryEventType,

    /// Signal or activity name (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Signal payload (for signal events)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// Human-readable summary
    pub summary: String,

    /// Error message if something failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HistoryEvent {
    /// Create a new event with the current timestamp
    pub fn new(
        workflow_id: impl Into<String>,
        sequence: u64,
        event_type: HistoryEventType,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            workflow_id: workflow_id.into(),
            sequence,
            event_type,
            name: None,
            payload: None,
            summary: summary.into(),
            error: None,
        }
    }

    /// Attach the signal or activity name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a signal payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach error information
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Types of events recorded in a workflow history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryEventType {
    /// A delivery was handed to a registered handler
    SignalDelivered,

    /// A delivery arrived with no handler registered and was kept for later
    SignalBuffered,

    /// A delivery's payload did not decode into the handler's type
    SignalRejected,

    /// A duplicate of a one-shot signal an earlier invocation already consumed
    SignalDiscarded,

    /// An external operation was started
    ActivityScheduled,

    /// An external operation returned a result
    ActivityCompleted,

    /// An external operation returned an error
    ActivityFailed,

    /// A predicate suspension resumed
    ConditionSatisfied,
}

/// Ordered history of one workflow instance
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    events: Vec<HistoryEvent>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a history from previously recorded events
    pub fn from_events(events: Vec<HistoryEvent>) -> Self {
        Self { events }
    }

    pub(crate) fn push(&mut self, event: HistoryEvent) {
        self.events.push(event);
    }

    /// Sequence number the next event will get
    pub fn next_sequence(&self) -> u64 {
        self.events.last().map_or(1, |e| e.sequence + 1)
    }

    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<HistoryEvent> {
        self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of events of a given type
    pub fn count(&self, event_type: HistoryEventType) -> usize {
        self.events
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    /// Deliveries of a signal that reached a handler, in order
    pub fn delivered(&self, signal_name: &str) -> Vec<&HistoryEvent> {
        self.events
            .iter()
            .filter(|e| {
                e.event_type == HistoryEventType::SignalDelivered
                    && e.name.as_deref() == Some(signal_name)
            })
            .collect()
    }

    /// Index of the first event of a given type
    pub fn position(&self, event_type: HistoryEventType) -> Option<usize> {
        self.events.iter().position(|e| e.event_type == event_type)
    }
}
