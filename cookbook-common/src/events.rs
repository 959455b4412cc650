//! Event types for the cookbook event system
//!
//! Provides the shared event definitions and the EventBus that replaces
//! implicit re-rendering: every component that needs to react to state
//! changes subscribes here instead of reading shared state directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Lifecycle stage of one image upload job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum UploadStage {
    /// Waiting for the gateway to issue a write credential
    RequestingCredential,
    /// Bytes are being written to object storage
    Uploading,
    /// Storage accepted the write; the record is being updated
    Reconciling,
    /// Job ended without touching the record
    Failed { reason: String },
    /// Record now references the uploaded image
    Done,
}

impl UploadStage {
    /// Whether the job has reached a final stage
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStage::Failed { .. } | UploadStage::Done)
    }
}

/// Cookbook event types
///
/// Events are broadcast via EventBus and serialize with a `type` tag so they can
/// be logged or forwarded as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RecipeEvent {
    /// The record store was mutated
    RecordsChanged {
        /// Store revision after the mutation
        revision: u64,
        /// Number of records after the mutation
        record_count: usize,
        /// Whether the mutation left unsaved changes
        dirty: bool,
        timestamp: DateTime<Utc>,
    },

    /// Records were loaded from the gateway
    RecordsLoaded {
        record_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// Loading records from the gateway failed
    LoadFailed {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Edit target set or cleared
    EditTargetChanged {
        record_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Delete confirmation opened or closed
    DeleteTargetChanged {
        record_id: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A save attempt was sent to the gateway
    SaveStarted {
        /// Batch number (increases per observed batch of changes)
        batch: u64,
        /// Attempt number within the batch, starting at 1
        attempt: u32,
        record_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// The gateway acknowledged a save batch
    SaveAcknowledged {
        batch: u64,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// A save batch failed after all attempts
    SaveFailed {
        batch: u64,
        attempts: u32,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// An upload job moved to a new stage
    UploadStateChanged {
        job_id: Uuid,
        record_id: String,
        stage: UploadStage,
        timestamp: DateTime<Utc>,
    },

    /// Number of outstanding network operations changed
    LoadingChanged {
        outstanding: usize,
        timestamp: DateTime<Utc>,
    },
}

impl RecipeEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            RecipeEvent::RecordsChanged { .. } => "RecordsChanged",
            RecipeEvent::RecordsLoaded { .. } => "RecordsLoaded",
            RecipeEvent::LoadFailed { .. } => "LoadFailed",
            RecipeEvent::EditTargetChanged { .. } => "EditTargetChanged",
            RecipeEvent::DeleteTargetChanged { .. } => "DeleteTargetChanged",
            RecipeEvent::SaveStarted { .. } => "SaveStarted",
            RecipeEvent::SaveAcknowledged { .. } => "SaveAcknowledged",
            RecipeEvent::SaveFailed { .. } => "SaveFailed",
            RecipeEvent::UploadStateChanged { .. } => "UploadStateChanged",
            RecipeEvent::LoadingChanged { .. } => "LoadingChanged",
        }
    }
}

/// Central event distribution bus
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Lagged message detection for slow subscribers
///
/// Publishing with no subscribers is allowed; results of in-flight work that
/// nobody listens for are simply dropped.
///
/// # Examples
///
/// ```
/// use cookbook_common::events::{EventBus, RecipeEvent};
///
/// let bus = EventBus::new(16);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(RecipeEvent::LoadingChanged {
///     outstanding: 1,
///     timestamp: chrono::Utc::now(),
/// });
///
/// let event = rx.try_recv().unwrap();
/// assert_eq!(event.event_type(), "LoadingChanged");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<RecipeEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RecipeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: RecipeEvent,
    ) -> Result<usize, broadcast::error::SendError<RecipeEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RecipeEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_err() {
        let bus = EventBus::new(4);
        let result = bus.emit(RecipeEvent::LoadingChanged {
            outstanding: 0,
            timestamp: Utc::now(),
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        for outstanding in 0..3 {
            bus.emit_lossy(RecipeEvent::LoadingChanged {
                outstanding,
                timestamp: Utc::now(),
            });
        }

        for expected in 0..3 {
            match rx.try_recv().unwrap() {
                RecipeEvent::LoadingChanged { outstanding, .. } => assert_eq!(outstanding, expected),
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = RecipeEvent::UploadStateChanged {
            job_id: Uuid::nil(),
            record_id: "r1".to_string(),
            stage: UploadStage::Failed {
                reason: "denied".to_string(),
            },
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "UploadStateChanged");
        assert_eq!(json["stage"]["stage"], "failed");
        assert_eq!(json["stage"]["reason"], "denied");
    }

    #[test]
    fn test_upload_stage_terminal() {
        assert!(!UploadStage::RequestingCredential.is_terminal());
        assert!(!UploadStage::Uploading.is_terminal());
        assert!(!UploadStage::Reconciling.is_terminal());
        assert!(UploadStage::Done.is_terminal());
        assert!(UploadStage::Failed { reason: String::new() }.is_terminal());
    }
}
