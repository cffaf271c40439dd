//! Admin assignment editor — interactive working-copy state machine.
//!
//! The editor holds a working copy of the assignment set seeded from the
//! last loaded one. Checking a field onto a page goes through
//! [`AssignmentSet::move_field`], so a field is never on two pages even
//! mid-edit; unchecking may leave the copy incomplete, which is allowed
//! until submit. Submit validates against the registry and atomically
//! replaces the persisted set, leaving the working copy intact on any
//! failure so the admin can correct and retry.

use tracing::{info, warn};

use crate::assignment::engine::{self, AssignmentSet, Page};
use crate::refresh::RefreshBus;
use crate::registry::{FieldKey, all_fields};
use crate::store::Database;

/// Editor lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    /// Working copy equals the last loaded set.
    Viewing,
    /// Working copy differs from the loaded set.
    Dirty,
    /// A save is in flight.
    Submitting,
    /// The last submit failed; the message is user-facing.
    Error(String),
    /// The last submit succeeded.
    Saved,
}

/// The message shown when the store rejects a save.
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save configuration. Please try again.";

/// Interactive editor over a working copy of the assignment set.
pub struct AssignmentEditor {
    loaded: AssignmentSet,
    working: AssignmentSet,
    state: EditorState,
}

impl AssignmentEditor {
    /// Seed the editor from the currently persisted set.
    pub fn new(loaded: AssignmentSet) -> Self {
        Self {
            working: loaded.clone(),
            loaded,
            state: EditorState::Viewing,
        }
    }

    /// Load the persisted set and open an editor on it.
    pub async fn load(db: &dyn Database) -> Result<Self, crate::error::DatabaseError> {
        Ok(Self::new(db.load_assignments().await?))
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn working(&self) -> &AssignmentSet {
        &self.working
    }

    /// Check a field onto a page, moving it off any other page.
    pub fn toggle_on(&mut self, key: FieldKey, page: Page) {
        self.working.move_field(key, page);
        self.mark_edited();
    }

    /// Uncheck a field from the page it sits on. Only removes it if it is
    /// actually on `page`; a checkbox on another page is disabled anyway.
    pub fn toggle_off(&mut self, key: FieldKey, page: Page) {
        if self.working.page_of(key) == Some(page) {
            self.working.remove_field(key);
            self.mark_edited();
        }
    }

    /// The page whose checkbox for `key` is checked, if any.
    pub fn assigned_page(&self, key: FieldKey) -> Option<Page> {
        self.working.page_of(key)
    }

    /// Whether the checkbox for `key` on `page` renders disabled — true
    /// when the field is held by a different page. UI mirror of the
    /// exclusivity invariant, not a second source of truth.
    pub fn is_disabled(&self, key: FieldKey, page: Page) -> bool {
        matches!(self.assigned_page(key), Some(held) if held != page)
    }

    /// Validate the working copy and, if it holds all invariants, replace
    /// the persisted set and signal dependent views to refresh.
    ///
    /// On a violation or store failure the editor stays interactive with
    /// the working copy untouched.
    pub async fn submit(&mut self, db: &dyn Database, refresh: &RefreshBus) -> &EditorState {
        if let Err(violation) = engine::validate(&self.working, all_fields()) {
            warn!(violation = ?violation, "Assignment submit rejected");
            self.state = EditorState::Error(violation.to_string());
            return &self.state;
        }

        self.state = EditorState::Submitting;
        match db.replace_assignments(&self.working).await {
            Ok(()) => {
                info!(rows = self.working.len(), "Assignment set saved");
                self.loaded = self.working.clone();
                self.state = EditorState::Saved;
                refresh.publish_assignment_change();
            }
            Err(e) => {
                warn!(error = %e, "Assignment save failed");
                self.state = EditorState::Error(SAVE_FAILED_MESSAGE.to_string());
            }
        }
        &self.state
    }

    fn mark_edited(&mut self) {
        self.state = if self.working == self.loaded {
            EditorState::Viewing
        } else {
            EditorState::Dirty
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::error::DatabaseError;
    use crate::store::{LibSqlBackend, NewUser, OnboardingUpdate, Session, UserRecord};

    fn complete_set() -> AssignmentSet {
        AssignmentSet {
            one: vec![FieldKey::AboutMe, FieldKey::Birthdate],
            two: vec![FieldKey::Address, FieldKey::SkillLevel],
            three: vec![FieldKey::Onsite, FieldKey::Compensation],
        }
    }

    /// Store stub whose writes always fail (for the retry path).
    struct FailingDb;

    #[async_trait]
    impl Database for FailingDb {
        async fn load_assignments(&self) -> Result<AssignmentSet, DatabaseError> {
            Ok(AssignmentSet::default())
        }
        async fn replace_assignments(&self, _set: &AssignmentSet) -> Result<(), DatabaseError> {
            Err(DatabaseError::Query("disk on fire".into()))
        }
        async fn insert_user(&self, _user: &NewUser) -> Result<String, DatabaseError> {
            unimplemented!("not used in editor tests")
        }
        async fn get_user_by_email(
            &self,
            _email: &str,
        ) -> Result<Option<UserRecord>, DatabaseError> {
            unimplemented!("not used in editor tests")
        }
        async fn get_user(&self, _id: &str) -> Result<Option<UserRecord>, DatabaseError> {
            unimplemented!("not used in editor tests")
        }
        async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
            unimplemented!("not used in editor tests")
        }
        async fn update_user_onboarding(
            &self,
            _user_id: &str,
            _update: &OnboardingUpdate,
        ) -> Result<(), DatabaseError> {
            unimplemented!("not used in editor tests")
        }
        async fn insert_session(&self, _session: &Session) -> Result<(), DatabaseError> {
            unimplemented!("not used in editor tests")
        }
        async fn get_session(&self, _token: &str) -> Result<Option<Session>, DatabaseError> {
            unimplemented!("not used in editor tests")
        }
        async fn delete_session(&self, _token: &str) -> Result<bool, DatabaseError> {
            unimplemented!("not used in editor tests")
        }
        async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError> {
            unimplemented!("not used in editor tests")
        }
    }

    #[test]
    fn starts_viewing_and_toggles_to_dirty() {
        let mut editor = AssignmentEditor::new(complete_set());
        assert_eq!(*editor.state(), EditorState::Viewing);

        editor.toggle_on(FieldKey::AboutMe, Page::Two);
        assert_eq!(*editor.state(), EditorState::Dirty);

        // Moving it back lands it at the end of page one, so the grouping
        // matches even though the stored order changed.
        editor.toggle_on(FieldKey::AboutMe, Page::One);
        assert!(editor.working().same_grouping(&complete_set()));
    }

    #[test]
    fn checkbox_mirror_follows_working_copy() {
        let mut editor = AssignmentEditor::new(complete_set());
        assert_eq!(editor.assigned_page(FieldKey::Birthdate), Some(Page::One));
        assert!(editor.is_disabled(FieldKey::Birthdate, Page::Two));
        assert!(!editor.is_disabled(FieldKey::Birthdate, Page::One));

        // Checking on page two moves it: page one's checkbox is unchecked,
        // no save round-trip involved.
        editor.toggle_on(FieldKey::Birthdate, Page::Two);
        assert_eq!(editor.assigned_page(FieldKey::Birthdate), Some(Page::Two));
        assert!(!editor.working().page(Page::One).contains(&FieldKey::Birthdate));
        assert!(editor.is_disabled(FieldKey::Birthdate, Page::One));
    }

    #[test]
    fn toggle_off_only_affects_owning_page() {
        let mut editor = AssignmentEditor::new(complete_set());
        editor.toggle_off(FieldKey::Address, Page::One); // not on page one
        assert_eq!(editor.assigned_page(FieldKey::Address), Some(Page::Two));

        editor.toggle_off(FieldKey::Address, Page::Two);
        assert_eq!(editor.assigned_page(FieldKey::Address), None);
        assert_eq!(*editor.state(), EditorState::Dirty);
    }

    #[tokio::test]
    async fn submit_with_empty_page_errors_and_skips_store() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.replace_assignments(&complete_set()).await.unwrap();

        let mut editor = AssignmentEditor::load(&db).await.unwrap();
        // Empty page two by moving both its fields elsewhere.
        editor.toggle_on(FieldKey::Address, Page::One);
        editor.toggle_on(FieldKey::SkillLevel, Page::Three);
        assert!(editor.working().page(Page::Two).is_empty());

        let bus = RefreshBus::new();
        let state = editor.submit(&db, &bus).await;
        assert_eq!(
            *state,
            EditorState::Error(
                "Please select at least one field per page before saving.".to_string()
            )
        );

        // Store untouched: the persisted set is still the original.
        let persisted = db.load_assignments().await.unwrap();
        assert!(persisted.same_grouping(&complete_set()));
        // Working copy preserved for correction.
        assert!(editor.working().page(Page::Two).is_empty());
    }

    #[tokio::test]
    async fn submit_with_duplicate_errors_and_skips_store() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.replace_assignments(&complete_set()).await.unwrap();

        let mut editor = AssignmentEditor::load(&db).await.unwrap();
        // Force a duplicate directly on the working copy — the toggles
        // cannot produce one, which is the point of move_field.
        editor.working.three.push(FieldKey::Birthdate);

        let bus = RefreshBus::new();
        let state = editor.submit(&db, &bus).await;
        assert!(matches!(state, EditorState::Error(msg)
            if msg.contains("one page")));

        let persisted = db.load_assignments().await.unwrap();
        assert!(persisted.same_grouping(&complete_set()));
    }

    #[tokio::test]
    async fn successful_submit_saves_and_publishes_refresh() {
        let db = LibSqlBackend::new_memory().await.unwrap();
        db.replace_assignments(&complete_set()).await.unwrap();

        let mut editor = AssignmentEditor::load(&db).await.unwrap();
        editor.toggle_on(FieldKey::Birthdate, Page::Three);
        assert_eq!(*editor.state(), EditorState::Dirty);

        let bus = RefreshBus::new();
        let mut rx = bus.subscribe();
        let state = editor.submit(&db, &bus).await;
        assert_eq!(*state, EditorState::Saved);

        let persisted = db.load_assignments().await.unwrap();
        assert_eq!(persisted.page_of(FieldKey::Birthdate), Some(Page::Three));

        // All three dependent views get a refresh signal.
        let mut refreshed = 0;
        while rx.try_recv().is_ok() {
            refreshed += 1;
        }
        assert_eq!(refreshed, 3);
    }

    #[tokio::test]
    async fn store_failure_surfaces_retry_message_and_keeps_copy() {
        let mut editor = AssignmentEditor::new(complete_set());
        editor.toggle_on(FieldKey::Onsite, Page::One);
        let edited = editor.working().clone();

        let bus = RefreshBus::new();
        let state = editor.submit(&FailingDb, &bus).await;
        assert_eq!(*state, EditorState::Error(SAVE_FAILED_MESSAGE.to_string()));
        assert_eq!(*editor.working(), edited);

        // Still interactive: another edit flips back to Dirty.
        editor.toggle_on(FieldKey::Onsite, Page::Three);
        assert_eq!(*editor.state(), EditorState::Dirty);
    }
}
