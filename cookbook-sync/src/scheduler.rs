//! Save Scheduler
//!
//! Turns the store's dirty signal into remote "save all recipes" calls.
//! However many mutations happened since the last observation, one
//! observation produces at most one [`SaveBatch`] carrying the full ordered
//! collection.
//!
//! At most one batch is in flight. Changes made while a batch is being
//! persisted stay dirty and go out in the next batch once the current one is
//! acknowledged, so the remote never receives an older collection after a
//! newer one. Transient failures are retried with a fixed delay; a final
//! failure re-marks the store dirty so the unsaved state is not forgotten.

use std::sync::Arc;
use std::time::Duration;

use cookbook_common::config::SaveConfig;
use cookbook_common::events::{EventBus, RecipeEvent};
use tracing::{debug, error, info, warn};

use crate::error::SyncError;
use crate::gateway::RecipeGateway;
use crate::record::Recipe;
use crate::store::RecordStore;

/// Retry policy for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePolicy {
    /// Attempts per batch including the first
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for SavePolicy {
    fn default() -> Self {
        SavePolicy::from(&SaveConfig::default())
    }
}

impl From<&SaveConfig> for SavePolicy {
    fn from(config: &SaveConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            retry_delay: cookbook_common::time::millis_to_duration(config.retry_delay_ms),
        }
    }
}

/// Snapshot of the store to persist
#[derive(Debug, Clone)]
pub struct SaveBatch {
    pub batch: u64,
    pub records: Vec<Recipe>,
}

/// What the gateway finally said about a batch
#[derive(Debug)]
pub enum SaveOutcome {
    Acknowledged { batch: u64, attempts: u32 },
    Failed { batch: u64, attempts: u32, error: SyncError },
}

/// How the scheduler classified an outcome
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveResolution {
    /// The in-flight batch is durable
    Acknowledged,
    /// Outcome of a batch that is not in flight; nothing to do
    Ignored,
    /// In-flight batch failed; local state remains unsaved
    Failed(String),
}

#[derive(Debug)]
pub struct SaveScheduler {
    policy: SavePolicy,
    last_issued: u64,
    in_flight: Option<u64>,
    acknowledged_through: u64,
    last_error: Option<String>,
}

impl SaveScheduler {
    pub fn new(policy: SavePolicy) -> Self {
        Self {
            policy,
            last_issued: 0,
            in_flight: None,
            acknowledged_through: 0,
            last_error: None,
        }
    }

    pub fn policy(&self) -> SavePolicy {
        self.policy
    }

    /// Observation point: consume the dirty signal into at most one batch
    ///
    /// While a batch is in flight nothing is issued and the dirty signal is
    /// left set for the observation after the acknowledgement.
    pub fn observe(&mut self, store: &mut RecordStore) -> Option<SaveBatch> {
        if let Some(batch) = self.in_flight {
            if store.is_dirty() {
                debug!(in_flight = batch, "Save deferred until in-flight batch settles");
            }
            return None;
        }
        if !store.take_dirty() {
            return None;
        }

        self.last_issued += 1;
        self.in_flight = Some(self.last_issued);
        debug!(batch = self.last_issued, records = store.len(), "Save batch armed");
        Some(SaveBatch {
            batch: self.last_issued,
            records: store.records().to_vec(),
        })
    }

    /// Record a batch outcome
    pub fn resolve(&mut self, outcome: SaveOutcome, store: &mut RecordStore) -> SaveResolution {
        let batch = match &outcome {
            SaveOutcome::Acknowledged { batch, .. } | SaveOutcome::Failed { batch, .. } => *batch,
        };
        if self.in_flight != Some(batch) {
            debug!(batch, in_flight = ?self.in_flight, "Outcome for batch not in flight ignored");
            return SaveResolution::Ignored;
        }
        self.in_flight = None;

        match outcome {
            SaveOutcome::Acknowledged { batch, attempts } => {
                self.acknowledged_through = batch;
                self.last_error = None;
                info!(batch, attempts, "Save acknowledged");
                SaveResolution::Acknowledged
            }
            SaveOutcome::Failed {
                batch,
                attempts,
                error,
            } => {
                let message = error.to_string();
                error!(batch, attempts, error = %message, "Save failed, changes remain unsaved");
                store.mark_dirty();
                self.last_error = Some(message.clone());
                SaveResolution::Failed(message)
            }
        }
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Error of the last failed batch, cleared once a batch succeeds
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_issued(&self) -> u64 {
        self.last_issued
    }

    pub fn acknowledged_through(&self) -> u64 {
        self.acknowledged_through
    }
}

/// Send one batch to the gateway, retrying transient failures
pub async fn persist(
    gateway: Arc<dyn RecipeGateway>,
    batch: SaveBatch,
    policy: SavePolicy,
    events: EventBus,
) -> SaveOutcome {
    let mut attempt = 0;
    loop {
        attempt += 1;
        events.emit_lossy(RecipeEvent::SaveStarted {
            batch: batch.batch,
            attempt,
            record_count: batch.records.len(),
            timestamp: cookbook_common::time::now(),
        });

        match gateway.save_recipes(&batch.records).await {
            Ok(()) => {
                events.emit_lossy(RecipeEvent::SaveAcknowledged {
                    batch: batch.batch,
                    attempts: attempt,
                    timestamp: cookbook_common::time::now(),
                });
                return SaveOutcome::Acknowledged {
                    batch: batch.batch,
                    attempts: attempt,
                };
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(batch = batch.batch, attempt, error = %e, "Save attempt failed, retrying");
                tokio::time::sleep(policy.retry_delay).await;
            }
            Err(e) => {
                events.emit_lossy(RecipeEvent::SaveFailed {
                    batch: batch.batch,
                    attempts: attempt,
                    message: e.to_string(),
                    timestamp: cookbook_common::time::now(),
                });
                return SaveOutcome::Failed {
                    batch: batch.batch,
                    attempts: attempt,
                    error: e,
                };
            }
        }
    }
}
