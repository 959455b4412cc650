//! Record Store
//!
//! Ordered collection of recipe records, the only shared mutable state of the
//! synchronization engine. All changes go through the operations below so
//! every change bumps the revision, notifies subscribers and (except for
//! [`RecordStore::hydrate`]) marks the store dirty for the save scheduler.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use cookbook_common::events::{EventBus, RecipeEvent};
use cookbook_common::{ids, Error};
use tracing::debug;

use crate::error::Result;
use crate::record::{Recipe, RecipePatch};

pub struct RecordStore {
    records: Vec<Recipe>,
    dirty: bool,
    revision: u64,
    events: EventBus,
}

impl RecordStore {
    pub fn new(events: EventBus) -> Self {
        Self {
            records: Vec::new(),
            dirty: false,
            revision: 0,
            events,
        }
    }

    // ========================================
    // Mutations
    // ========================================

    /// Append a blank record with a fresh identifier
    ///
    /// The identifier is generated locally so an edit session can start
    /// before the record exists remotely.
    pub fn add_record(&mut self, creator: Option<String>, created: DateTime<Utc>) -> String {
        let mut id = ids::generate();
        while self.contains(&id) {
            id = ids::generate();
        }

        debug!(record_id = %id, "Adding record");
        self.records.push(Recipe::blank(id.clone(), creator, created));
        self.changed(true);
        id
    }

    /// Apply a partial update
    ///
    /// Returns `false` (and changes nothing) when no record has this id.
    pub fn update_record(&mut self, id: &str, patch: &RecipePatch) -> bool {
        let Some(recipe) = self.records.iter_mut().find(|r| r.id == id) else {
            debug!(record_id = %id, "Update for unknown record ignored");
            return false;
        };

        patch.apply(recipe);
        self.changed(true);
        true
    }

    /// Replace the whole collection
    pub fn replace_all(&mut self, records: Vec<Recipe>) -> Result<()> {
        check_ids(&records)?;
        self.records = records;
        self.changed(true);
        Ok(())
    }

    /// Remove a record
    ///
    /// Removing an unknown id is a no-op and returns `None`.
    pub fn remove_record(&mut self, id: &str) -> Option<Recipe> {
        let index = self.records.iter().position(|r| r.id == id)?;
        let removed = self.records.remove(index);
        self.changed(true);
        Some(removed)
    }

    /// Install records loaded from the gateway
    ///
    /// Same as [`RecordStore::replace_all`] but leaves the dirty flag alone:
    /// the remote already holds this state.
    pub fn hydrate(&mut self, records: Vec<Recipe>) -> Result<()> {
        check_ids(&records)?;
        self.records = records;
        let dirty = self.dirty;
        self.changed(dirty);
        Ok(())
    }

    // ========================================
    // Dirty signal
    // ========================================

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Consume the dirty signal, returning whether it was set
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    /// Set the dirty signal without changing records
    ///
    /// Used when a save batch failed and local state is still unsaved.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    // ========================================
    // Reads
    // ========================================

    pub fn records(&self) -> &[Recipe] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn changed(&mut self, dirty: bool) {
        self.dirty = dirty;
        self.revision += 1;
        self.events.emit_lossy(RecipeEvent::RecordsChanged {
            revision: self.revision,
            record_count: self.records.len(),
            dirty,
            timestamp: cookbook_common::time::now(),
        });
    }
}

fn check_ids(records: &[Recipe]) -> Result<()> {
    let mut seen = HashSet::with_capacity(records.len());
    for record in records {
        if !ids::is_valid(&record.id) {
            return Err(Error::InvalidInput(format!("Invalid recipe id {:?}", record.id)).into());
        }
        if !seen.insert(record.id.as_str()) {
            return Err(Error::InvalidInput(format!("Duplicate recipe id {}", record.id)).into());
        }
    }
    Ok(())
}
