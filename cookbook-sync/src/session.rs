//! Edit session and deletion flow
//!
//! At most one record is open for editing and at most one record awaits
//! delete confirmation. The two are tracked independently, but confirming a
//! deletion always ends the edit session as well, since the edited record may
//! be the one being removed.
//!
//! Deletion state machine:
//!
//! ```text
//! Idle --request(id)--> Pending(id) --cancel--> Idle
//!                                   --confirm-> Idle (record removed)
//! ```

use tracing::debug;

/// Delete confirmation state
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeleteConfirmation {
    #[default]
    Idle,
    Pending(String),
}

#[derive(Debug, Clone, Default)]
pub struct EditSession {
    edit_target: Option<String>,
    delete: DeleteConfirmation,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edit_target(&self) -> Option<&str> {
        self.edit_target.as_deref()
    }

    pub fn is_editing(&self) -> bool {
        self.edit_target.is_some()
    }

    /// Open a record for editing, replacing any previous target
    pub fn begin_edit(&mut self, id: impl Into<String>) {
        let id = id.into();
        debug!(record_id = %id, "Edit started");
        self.edit_target = Some(id);
    }

    /// Close the edit session, returning the record that was being edited
    pub fn end_edit(&mut self) -> Option<String> {
        self.edit_target.take()
    }

    pub fn delete_target(&self) -> Option<&str> {
        match &self.delete {
            DeleteConfirmation::Idle => None,
            DeleteConfirmation::Pending(id) => Some(id),
        }
    }

    pub fn delete_state(&self) -> &DeleteConfirmation {
        &self.delete
    }

    /// Ask for confirmation before deleting `id`
    ///
    /// A second request while one is pending retargets the confirmation.
    pub fn request_delete(&mut self, id: impl Into<String>) {
        self.delete = DeleteConfirmation::Pending(id.into());
    }

    /// Dismiss the confirmation without side effects
    pub fn cancel_delete(&mut self) -> Option<String> {
        match std::mem::take(&mut self.delete) {
            DeleteConfirmation::Idle => None,
            DeleteConfirmation::Pending(id) => Some(id),
        }
    }

    /// Confirm the pending deletion
    ///
    /// Returns the id to remove. Both the delete target and the edit target
    /// are cleared whichever record was pending.
    pub fn confirm_delete(&mut self) -> Option<String> {
        let target = self.cancel_delete();
        if let Some(edited) = self.edit_target.take() {
            debug!(record_id = %edited, "Edit ended by deletion");
        }
        target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_edit_target() {
        let mut session = EditSession::new();
        session.begin_edit("r1");
        session.begin_edit("r2");
        assert_eq!(session.edit_target(), Some("r2"));
        assert_eq!(session.end_edit().as_deref(), Some("r2"));
        assert!(!session.is_editing());
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut session = EditSession::new();
        session.request_delete("r1");
        assert_eq!(session.delete_state(), &DeleteConfirmation::Pending("r1".to_string()));

        assert_eq!(session.cancel_delete().as_deref(), Some("r1"));
        assert_eq!(session.delete_state(), &DeleteConfirmation::Idle);
    }

    #[test]
    fn test_cancel_keeps_edit_session() {
        let mut session = EditSession::new();
        session.begin_edit("r1");
        session.request_delete("r1");
        session.cancel_delete();
        assert_eq!(session.edit_target(), Some("r1"));
    }

    #[test]
    fn test_confirm_clears_edit_of_other_record() {
        let mut session = EditSession::new();
        session.begin_edit("r2");
        session.request_delete("r1");

        assert_eq!(session.confirm_delete().as_deref(), Some("r1"));
        assert_eq!(session.edit_target(), None);
        assert_eq!(session.delete_target(), None);
    }

    #[test]
    fn test_confirm_when_idle_still_ends_edit() {
        let mut session = EditSession::new();
        session.begin_edit("r1");
        assert_eq!(session.confirm_delete(), None);
        assert!(!session.is_editing());
    }
}
