//! Activity tracking for chain executions.
//!
//! The engine reports every attempt, transition, print, and completion as
//! a typed event. Within one execution events arrive in causal order;
//! across executions no ordering is guaranteed. Trackers must be safe for
//! concurrent publication.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why control moved to another task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionReason {
    Match,
    Error,
}

impl std::fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Match => write!(f, "match"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One step in the execution timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ActivityEvent {
    TaskAttemptStarted {
        execution_id: Uuid,
        task_id: String,
        task_type: String,
        retry: u32,
    },
    TaskAttemptSucceeded {
        execution_id: Uuid,
        task_id: String,
        output: String,
    },
    TaskAttemptFailed {
        execution_id: Uuid,
        task_id: String,
        retry: u32,
        error: String,
    },
    TaskPrinted {
        execution_id: Uuid,
        task_id: String,
        message: String,
    },
    NextTask {
        execution_id: Uuid,
        from_task: String,
        to_task: String,
        reason: TransitionReason,
    },
    ChainCompleted {
        execution_id: Uuid,
        chain_id: String,
        final_output: String,
    },
}

impl ActivityEvent {
    pub fn execution_id(&self) -> Uuid {
        match self {
            Self::TaskAttemptStarted { execution_id, .. }
            | Self::TaskAttemptSucceeded { execution_id, .. }
            | Self::TaskAttemptFailed { execution_id, .. }
            | Self::TaskPrinted { execution_id, .. }
            | Self::NextTask { execution_id, .. }
            | Self::ChainCompleted { execution_id, .. } => *execution_id,
        }
    }
}

/// Sink for activity events.
#[async_trait]
pub trait ActivityTracker: Send + Sync {
    async fn publish(&self, event: ActivityEvent);
}

/// Tracker that drops every event.
pub struct NoopTracker;

#[async_trait]
impl ActivityTracker for NoopTracker {
    async fn publish(&self, _event: ActivityEvent) {}
}

/// Tracker that buffers events in memory.
///
/// Used by tests to assert on the timeline and by callers that want to
/// drain the event side-channel after an execution.
#[derive(Default)]
pub struct RecordingTracker {
    events: Mutex<Vec<ActivityEvent>>,
}

impl RecordingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events.lock().expect("tracker buffer poisoned").clone()
    }

    pub fn drain(&self) -> Vec<ActivityEvent> {
        std::mem::take(&mut *self.events.lock().expect("tracker buffer poisoned"))
    }
}

#[async_trait]
impl ActivityTracker for RecordingTracker {
    async fn publish(&self, event: ActivityEvent) {
        self.events.lock().expect("tracker buffer poisoned").push(event);
    }
}

/// Event envelope delivered to bus subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct TrackedEvent {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub event: ActivityEvent,
}

/// Broadcast tracker fanning events out to any number of subscribers.
///
/// Sequence numbers are assigned at publish time and increase monotonically
/// across all executions sharing the bus.
pub struct TrackerBus {
    sender: broadcast::Sender<TrackedEvent>,
    sequence: AtomicU64,
}

impl TrackerBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TrackedEvent> {
        self.sender.subscribe()
    }

    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TrackerBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl ActivityTracker for TrackerBus {
    async fn publish(&self, event: ActivityEvent) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        // Send errors just mean nobody is listening right now.
        let _ = self.sender.send(TrackedEvent {
            sequence,
            timestamp: Utc::now(),
            event,
        });
    }
}
