//! Observability hook for lock and guard transitions.
//!
//! The lock and the call-once guard report each state transition as an
//! [`Event`] to an [`EventSink`]. The default sink, [`TracingSink`], turns
//! them into `tracing` events; callers can plug in their own sink to feed a
//! test harness, a metrics system, or an audit log.
//!
//! # Event Format
//!
//! - `ts`: timestamp when the transition happened
//! - `action`: what happened (acquired, broke_stale, operation_failed, ...)
//! - `subject`: the lock path or the operation name
//! - `details`: freeform JSON object with action-specific fields

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Transitions reported by locks and guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Lock directory created by this caller
    Acquired,
    /// A stale holder's lock directory was removed
    BrokeStale,
    /// Acquisition deadline passed
    TimedOut,
    /// Lock directory removed by its holder
    Released,
    /// A done marker was found; the operation was skipped
    AlreadyDone,
    /// A failed marker was found; the recorded failure was surfaced
    PriorFailure,
    /// The guarded operation is about to run
    OperationStarted,
    /// The guarded operation returned successfully
    OperationSucceeded,
    /// The guarded operation returned an error
    OperationFailed,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Acquired => write!(f, "acquired"),
            EventAction::BrokeStale => write!(f, "broke_stale"),
            EventAction::TimedOut => write!(f, "timed_out"),
            EventAction::Released => write!(f, "released"),
            EventAction::AlreadyDone => write!(f, "already_done"),
            EventAction::PriorFailure => write!(f, "prior_failure"),
            EventAction::OperationStarted => write!(f, "operation_started"),
            EventAction::OperationSucceeded => write!(f, "operation_succeeded"),
            EventAction::OperationFailed => write!(f, "operation_failed"),
        }
    }
}

/// A single reported transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// When the transition happened.
    pub ts: DateTime<Utc>,

    /// What happened.
    pub action: EventAction,

    /// Lock path or operation name the event is about.
    pub subject: String,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    /// Create a new event stamped with the current time.
    pub fn new(action: EventAction, subject: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            action,
            subject: subject.into(),
            details: Value::Object(serde_json::Map::new()),
        }
    }

    /// Set the details object for this event.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Receiver for lock and guard events.
///
/// Sinks are shared across threads and must not block for long; they run
/// inline with lock acquisition and release.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &Event);
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn EventSink>;

/// The default sink: forwards every event to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &Event) {
        let subject = event.subject.as_str();
        let details = &event.details;
        match event.action {
            EventAction::Acquired => {
                tracing::debug!(lock = subject, "acquired lock");
            }
            EventAction::Released => {
                tracing::debug!(lock = subject, "released lock");
            }
            EventAction::BrokeStale => {
                tracing::info!(lock = subject, holder = %details, "breaking stale lock");
            }
            EventAction::TimedOut => {
                tracing::warn!(lock = subject, %details, "timed out waiting for lock");
            }
            EventAction::AlreadyDone => {
                tracing::info!(operation = subject, "already complete");
            }
            EventAction::PriorFailure => {
                tracing::warn!(operation = subject, %details, "previous execution failed");
            }
            EventAction::OperationStarted => {
                tracing::info!(operation = subject, %details, "executing");
            }
            EventAction::OperationSucceeded => {
                tracing::info!(operation = subject, "complete");
            }
            EventAction::OperationFailed => {
                tracing::warn!(operation = subject, %details, "execution failed");
            }
        }
    }
}

/// The sink used when none is configured.
pub fn default_sink() -> SharedSink {
    Arc::new(TracingSink)
}

/// Sink that keeps every event in memory, for tests and embedding callers.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    /// Just the actions, in order.
    pub fn actions(&self) -> Vec<EventAction> {
        self.events().into_iter().map(|e| e.action).collect()
    }

    /// Number of recorded events with the given action.
    pub fn count(&self, action: EventAction) -> usize {
        self.events().iter().filter(|e| e.action == action).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(event.clone());
    }
}
