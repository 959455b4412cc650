//! RecipeBook controller
//!
//! Composes the record store, edit session, view state, projector, save
//! scheduler and upload pipeline. All state lives here and is mutated from
//! one place; remote work (load, save, upload) runs on spawned tasks whose
//! results come back over a channel and are applied one at a time by
//! [`RecipeBook::next_completion`].
//!
//! # Save observation
//!
//! Mutating operations only mark the store dirty. The dirty signal is
//! observed by [`RecipeBook::flush`], which [`RecipeBook::run_until_idle`]
//! and [`RecipeBook::next_completion`] call whenever a mutation happened
//! since the previous observation. Any number of mutations between two
//! observations produce a single save.
//!
//! Only one save is in flight at a time. Mutations made meanwhile are
//! observed again once that save is acknowledged.
//!
//! A save that finally fails leaves the store dirty but does not trigger an
//! observation by itself; the next mutation or [`RecipeBook::retry_save`]
//! does.

use std::sync::Arc;

use cookbook_common::config::TomlConfig;
use cookbook_common::events::{EventBus, RecipeEvent};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};
use crate::gateway::RecipeGateway;
use crate::projector::Projector;
use crate::record::{Recipe, RecipePatch};
use crate::scheduler::{self, SaveOutcome, SavePolicy, SaveResolution, SaveScheduler};
use crate::session::EditSession;
use crate::store::RecordStore;
use crate::upload::{CredentialIssuer, ObjectStore, UploadFile, UploadOutcome, UploadPipeline};
use crate::view::{SortKey, ViewState};

/// Construction options
#[derive(Debug, Clone)]
pub struct BookOptions {
    /// Current identity, stamped on created records and used by the
    /// owner-only filter
    pub owner: Option<String>,
    pub view: ViewState,
    pub save: SavePolicy,
    pub event_capacity: usize,
}

impl Default for BookOptions {
    fn default() -> Self {
        Self::from(&TomlConfig::default())
    }
}

impl From<&TomlConfig> for BookOptions {
    fn from(config: &TomlConfig) -> Self {
        Self {
            owner: config.owner.clone(),
            view: ViewState::default(),
            save: SavePolicy::from(&config.save),
            event_capacity: config.event_capacity.max(1),
        }
    }
}

/// Snapshot for status displays
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookStatus {
    /// Remote operations in flight; non-zero means "loading"
    pub outstanding: usize,
    pub dirty: bool,
    pub revision: u64,
    pub edit_target: Option<String>,
    pub delete_target: Option<String>,
    pub last_load_error: Option<String>,
    pub last_save_error: Option<String>,
    pub last_upload_error: Option<String>,
}

impl BookStatus {
    pub fn is_loading(&self) -> bool {
        self.outstanding > 0
    }
}

/// Result of remote work delivered back to the controller
enum Completion {
    Loaded(Result<Vec<Recipe>>),
    Saved(SaveOutcome),
    Uploaded(UploadOutcome),
}

pub struct RecipeBook {
    store: RecordStore,
    session: EditSession,
    view: ViewState,
    projector: Projector,
    scheduler: SaveScheduler,
    gateway: Arc<dyn RecipeGateway>,
    uploads: UploadPipeline,
    events: EventBus,
    owner: Option<String>,

    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    outstanding: usize,
    /// A mutation happened since the last save observation
    unobserved: bool,

    last_load_error: Option<String>,
    last_upload_error: Option<String>,
}

impl RecipeBook {
    /// # Arguments
    /// * `gateway` - Loads and saves the recipe collection
    /// * `issuer` - Issues upload credentials (usually the same gateway)
    /// * `storage` - Performs direct object writes
    pub fn new(
        gateway: Arc<dyn RecipeGateway>,
        issuer: Arc<dyn CredentialIssuer>,
        storage: Arc<dyn ObjectStore>,
        options: BookOptions,
    ) -> Self {
        let events = EventBus::new(options.event_capacity);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let mut book = Self {
            store: RecordStore::new(events.clone()),
            session: EditSession::new(),
            view: options.view,
            projector: Projector::new(),
            scheduler: SaveScheduler::new(options.save),
            gateway,
            uploads: UploadPipeline::new(issuer, storage, events.clone()),
            events,
            owner: options.owner,
            completions_tx,
            completions_rx,
            outstanding: 0,
            unobserved: false,
            last_load_error: None,
            last_upload_error: None,
        };
        book.refresh();
        book
    }

    // ========================================
    // Loading
    // ========================================

    /// Fetch the remote collection
    ///
    /// The result replaces the store's contents without scheduling a save.
    pub fn load(&mut self) {
        let gateway = Arc::clone(&self.gateway);
        let tx = self.completions_tx.clone();
        self.begin_remote();
        tokio::spawn(async move {
            let result = gateway.load_recipes().await;
            let _ = tx.send(Completion::Loaded(result));
        });
    }

    // ========================================
    // Records
    // ========================================

    /// Append a blank recipe and open it for editing
    ///
    /// Requires a signed-in owner; the record is stamped with it.
    pub fn create_recipe(&mut self) -> Result<String> {
        self.ensure_not_editing()?;
        let Some(owner) = self.owner.clone() else {
            return Err(SyncError::InvalidInput("Sign in to create recipes".to_string()));
        };

        let id = self.store.add_record(Some(owner), cookbook_common::time::now());
        self.unobserved = true;
        self.refresh();

        info!(record_id = %id, "Recipe created");
        self.begin_edit(&id)?;
        Ok(id)
    }

    /// Open a recipe for editing, switching away from any current target
    ///
    /// Display positions stay frozen until [`RecipeBook::end_edit`].
    pub fn begin_edit(&mut self, id: &str) -> Result<()> {
        if !self.store.contains(id) {
            return Err(SyncError::NotFound(id.to_string()));
        }
        self.session.begin_edit(id);
        self.emit_edit_target();
        self.refresh();
        Ok(())
    }

    /// Close the edit session and re-sort
    pub fn end_edit(&mut self) -> Option<String> {
        let ended = self.session.end_edit();
        if ended.is_some() {
            self.emit_edit_target();
            self.refresh();
        }
        ended
    }

    /// Apply a partial update to a recipe
    pub fn edit_recipe(&mut self, id: &str, patch: &RecipePatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        if !self.store.update_record(id, patch) {
            return Err(SyncError::NotFound(id.to_string()));
        }
        self.unobserved = true;
        self.refresh();
        Ok(())
    }

    // ========================================
    // Deletion flow
    // ========================================

    /// Ask for confirmation before deleting a recipe
    pub fn request_delete(&mut self, id: &str) {
        self.session.request_delete(id);
        self.emit_delete_target();
    }

    /// Dismiss the pending confirmation without side effects
    pub fn cancel_delete(&mut self) -> Option<String> {
        let cancelled = self.session.cancel_delete();
        if cancelled.is_some() {
            self.emit_delete_target();
        }
        cancelled
    }

    /// Delete the pending recipe and end any edit session
    ///
    /// Returns the removed record, or `None` when nothing was pending or the
    /// record no longer existed.
    pub fn confirm_delete(&mut self) -> Option<Recipe> {
        let was_editing = self.session.is_editing();
        let target = self.session.confirm_delete();

        self.emit_delete_target();
        if was_editing {
            self.emit_edit_target();
        }

        let removed = target.as_deref().and_then(|id| self.store.remove_record(id));
        match &removed {
            Some(recipe) => {
                info!(record_id = %recipe.id, "Recipe deleted");
                self.unobserved = true;
            }
            None => debug!(target = ?target, "Nothing to delete"),
        }
        self.refresh();
        removed
    }

    // ========================================
    // Uploads
    // ========================================

    /// Upload an image for a recipe
    ///
    /// The record's image is updated once storage accepts the write. Returns
    /// the job id used in [`RecipeEvent::UploadStateChanged`].
    pub fn upload_image(&mut self, id: &str, file: UploadFile) -> Result<Uuid> {
        if !self.store.contains(id) {
            return Err(SyncError::NotFound(id.to_string()));
        }

        let job = self.uploads.start(id, &file);
        let job_id = job.id;
        let pipeline = self.uploads.clone();
        let tx = self.completions_tx.clone();
        self.begin_remote();
        tokio::spawn(async move {
            let outcome = pipeline.run(job, file).await;
            let _ = tx.send(Completion::Uploaded(outcome));
        });
        Ok(job_id)
    }

    // ========================================
    // View
    // ========================================

    /// Sort button: the active key flips direction, another key is selected
    pub fn select_sort(&mut self, key: SortKey) -> Result<()> {
        self.ensure_not_editing()?;
        self.view.select_sort(key);
        self.refresh();
        Ok(())
    }

    /// Replace the whole view state, e.g. from a query string
    pub fn set_view(&mut self, view: ViewState) -> Result<()> {
        self.ensure_not_editing()?;
        self.view = view;
        self.refresh();
        Ok(())
    }

    pub fn set_only_mine(&mut self, only_mine: bool) -> Result<()> {
        self.ensure_not_editing()?;
        self.view.set_only_mine(only_mine);
        Ok(())
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Current view as a query string
    pub fn view_query(&self) -> String {
        self.view.to_query()
    }

    /// Records to render, in display order, after the visibility filter
    pub fn display(&self) -> Vec<&Recipe> {
        self.projector
            .visible(self.view.visibility, self.owner.as_deref())
            .collect()
    }

    // ========================================
    // Status
    // ========================================

    pub fn status(&self) -> BookStatus {
        BookStatus {
            outstanding: self.outstanding,
            dirty: self.store.is_dirty(),
            revision: self.store.revision(),
            edit_target: self.session.edit_target().map(str::to_string),
            delete_target: self.session.delete_target().map(str::to_string),
            last_load_error: self.last_load_error.clone(),
            last_save_error: self.scheduler.last_error().map(str::to_string),
            last_upload_error: self.last_upload_error.clone(),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    // ========================================
    // Save observation and completions
    // ========================================

    /// Observation point: issue one save if the store is dirty
    ///
    /// Returns whether a save was issued.
    pub fn flush(&mut self) -> bool {
        self.unobserved = false;
        let Some(batch) = self.scheduler.observe(&mut self.store) else {
            return false;
        };

        let gateway = Arc::clone(&self.gateway);
        let policy = self.scheduler.policy();
        let events = self.events.clone();
        let tx = self.completions_tx.clone();
        self.begin_remote();
        tokio::spawn(async move {
            let outcome = scheduler::persist(gateway, batch, policy, events).await;
            let _ = tx.send(Completion::Saved(outcome));
        });
        true
    }

    /// Re-issue a save after a failure left local changes unsaved
    pub fn retry_save(&mut self) -> bool {
        if !self.store.is_dirty() || self.scheduler.is_saving() {
            return false;
        }
        info!("Retrying save");
        self.flush()
    }

    /// Wait for one remote operation to finish and apply its result
    ///
    /// Returns `false` immediately when nothing is outstanding.
    pub async fn next_completion(&mut self) -> bool {
        if self.outstanding == 0 {
            return false;
        }
        let Some(completion) = self.completions_rx.recv().await else {
            return false;
        };

        self.end_remote();
        self.apply(completion);
        if self.unobserved {
            self.flush();
        }
        true
    }

    /// Observe pending changes, then drain every outstanding operation
    pub async fn run_until_idle(&mut self) {
        if self.unobserved {
            self.flush();
        }
        while self.next_completion().await {}
    }

    fn apply(&mut self, completion: Completion) {
        match completion {
            Completion::Loaded(Ok(records)) => {
                let count = records.len();
                match self.store.hydrate(records) {
                    Ok(()) => {
                        info!(records = count, "Recipes loaded");
                        self.last_load_error = None;
                        self.events.emit_lossy(RecipeEvent::RecordsLoaded {
                            record_count: count,
                            timestamp: cookbook_common::time::now(),
                        });
                        self.refresh();
                    }
                    Err(e) => self.load_failed(e),
                }
            }
            Completion::Loaded(Err(e)) => self.load_failed(e),
            Completion::Saved(outcome) => match self.scheduler.resolve(outcome, &mut self.store) {
                // Changes held back while the batch was in flight
                SaveResolution::Acknowledged if self.store.is_dirty() => self.unobserved = true,
                SaveResolution::Failed(message) => debug!(error = %message, "Save surfaced in status"),
                _ => {}
            },
            Completion::Uploaded(UploadOutcome::Reconcile { job, link }) => {
                let applied = self.store.update_record(&job.record_id, &RecipePatch::image(link));
                if applied {
                    self.unobserved = true;
                    self.last_upload_error = None;
                    self.refresh();
                } else {
                    self.last_upload_error = Some(format!("Recipe {} no longer exists", job.record_id));
                }
                self.uploads.finish(job, applied);
            }
            Completion::Uploaded(UploadOutcome::Failed { error, .. }) => {
                self.last_upload_error = Some(error);
            }
        }
    }

    fn load_failed(&mut self, error: SyncError) {
        warn!(error = %error, "Loading recipes failed");
        let message = error.to_string();
        self.events.emit_lossy(RecipeEvent::LoadFailed {
            message: message.clone(),
            timestamp: cookbook_common::time::now(),
        });
        self.last_load_error = Some(message);
    }

    // ========================================
    // Internals
    // ========================================

    fn refresh(&mut self) {
        self.projector
            .project(self.store.records(), &self.view, self.session.edit_target());
    }

    fn ensure_not_editing(&self) -> Result<()> {
        if self.session.is_editing() {
            Err(SyncError::EditInProgress)
        } else {
            Ok(())
        }
    }

    fn begin_remote(&mut self) {
        self.outstanding += 1;
        self.emit_loading();
    }

    fn end_remote(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.emit_loading();
    }

    fn emit_loading(&self) {
        self.events.emit_lossy(RecipeEvent::LoadingChanged {
            outstanding: self.outstanding,
            timestamp: cookbook_common::time::now(),
        });
    }

    fn emit_edit_target(&self) {
        self.events.emit_lossy(RecipeEvent::EditTargetChanged {
            record_id: self.session.edit_target().map(str::to_string),
            timestamp: cookbook_common::time::now(),
        });
    }

    fn emit_delete_target(&self) {
        self.events.emit_lossy(RecipeEvent::DeleteTargetChanged {
            record_id: self.session.delete_target().map(str::to_string),
            timestamp: cookbook_common::time::now(),
        });
    }
}
