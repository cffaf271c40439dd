//! Step form runtime — sequences the three onboarding steps.
//!
//! The runtime fetches the persisted assignment set once, then derives the
//! active step's fields from it. Each step validates only the fields
//! assigned to that step; validated values accumulate in an in-memory
//! draft that survives Back/Next navigation. Nothing is persisted until
//! the final submit, which flattens the draft into a single user-row write.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::assignment::engine::{AssignmentSet, Page, fields_for_page};
use crate::auth::Identity;
use crate::error::{DatabaseError, FieldError};
use crate::registry::{FieldKey, FieldSpec, validate_fields};
use crate::store::{Database, OnboardingUpdate};

/// Form lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    /// Assignments not yet fetched.
    Loading,
    /// Showing a step; Back/Next loop here.
    Ready(Page),
    /// The final write is in flight.
    Submitting,
    /// The onboarding record has been written.
    Complete,
}

/// Why a step advance was refused.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("form is not on an advanceable step")]
    NotReady,
    #[error("{} field value(s) failed validation", .errors.len())]
    Invalid { errors: Vec<FieldError> },
}

/// Why the final submit failed.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Not authenticated")]
    NotAuthenticated,
    #[error("form is not on the final step")]
    NotReady,
    #[error("{} field value(s) failed validation", .errors.len())]
    Invalid { errors: Vec<FieldError> },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// The multi-step onboarding form machine.
pub struct StepForm {
    assignments: AssignmentSet,
    draft: Map<String, Value>,
    state: FormState,
}

impl StepForm {
    /// A form that has not fetched assignments yet.
    pub fn new() -> Self {
        Self {
            assignments: AssignmentSet::default(),
            draft: Map::new(),
            state: FormState::Loading,
        }
    }

    /// Fetch the persisted assignment set and enter step 1.
    ///
    /// Called once; step navigation afterwards is purely local. The set
    /// only changes via admin action, at which point embedders reload in
    /// response to a refresh signal.
    pub async fn load(&mut self, db: &dyn Database) -> Result<(), DatabaseError> {
        self.assignments = db.load_assignments().await?;
        self.state = FormState::Ready(Page::One);
        debug!(rows = self.assignments.len(), "Step form loaded assignments");
        Ok(())
    }

    /// Start directly from a known assignment set.
    pub fn with_assignments(assignments: AssignmentSet) -> Self {
        Self {
            assignments,
            draft: Map::new(),
            state: FormState::Ready(Page::One),
        }
    }

    pub fn state(&self) -> &FormState {
        &self.state
    }

    /// The active step, when the form is showing one.
    pub fn step(&self) -> Option<Page> {
        match self.state {
            FormState::Ready(page) => Some(page),
            _ => None,
        }
    }

    /// The field specs rendered on the active step, in assignment order.
    pub fn fields(&self) -> Vec<&'static FieldSpec> {
        match self.step() {
            Some(page) => fields_for_page(&self.assignments, page),
            None => Vec::new(),
        }
    }

    /// Draft values for the active step's fields — what the form pre-fills
    /// when the user navigates back to a step they already completed.
    pub fn prefill(&self) -> Map<String, Value> {
        let mut values = Map::new();
        for spec in self.fields() {
            if let Some(value) = self.draft.get(spec.key.as_str()) {
                values.insert(spec.key.as_str().to_string(), value.clone());
            }
        }
        values
    }

    /// Validate the active step's values, merge them into the draft, and
    /// advance to the next step. Fields on other steps are neither required
    /// nor consulted here.
    pub fn next(&mut self, values: &Map<String, Value>) -> Result<(), StepError> {
        let FormState::Ready(page) = self.state else {
            return Err(StepError::NotReady);
        };
        let Some(next) = page.next() else {
            // Step 3 goes through submit, not next.
            return Err(StepError::NotReady);
        };

        let errors = self.validate_step(page, values);
        if !errors.is_empty() {
            return Err(StepError::Invalid { errors });
        }

        self.merge_step(page, values);
        self.state = FormState::Ready(next);
        debug!(step = %next, "Advanced to next step");
        Ok(())
    }

    /// Go back one step. The draft is untouched, so previously entered
    /// values reappear via [`StepForm::prefill`].
    pub fn back(&mut self) {
        if let FormState::Ready(page) = self.state {
            if let Some(prev) = page.prev() {
                self.state = FormState::Ready(prev);
                debug!(step = %prev, "Navigated back");
            }
        }
    }

    /// Validate and merge the final step's values, then write the whole
    /// draft to the user's onboarding record in one call.
    ///
    /// Fails closed without an identity. On any failure the form returns
    /// to step 3 with the draft intact for retry.
    pub async fn submit(
        &mut self,
        values: &Map<String, Value>,
        identity: Option<&Identity>,
        db: &dyn Database,
    ) -> Result<(), SubmitError> {
        if self.state != FormState::Ready(Page::Three) {
            return Err(SubmitError::NotReady);
        }

        let errors = self.validate_step(Page::Three, values);
        if !errors.is_empty() {
            return Err(SubmitError::Invalid { errors });
        }
        self.merge_step(Page::Three, values);

        let Some(identity) = identity else {
            return Err(SubmitError::NotAuthenticated);
        };

        self.state = FormState::Submitting;
        let update = draft_to_update(&self.draft);
        match db.update_user_onboarding(&identity.user_id, &update).await {
            Ok(()) => {
                info!(user_id = %identity.user_id, "Onboarding complete");
                self.state = FormState::Complete;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Final onboarding write failed");
                self.state = FormState::Ready(Page::Three);
                Err(e.into())
            }
        }
    }

    fn validate_step(&self, page: Page, values: &Map<String, Value>) -> Vec<FieldError> {
        validate_fields(fields_for_page(&self.assignments, page), values)
    }

    /// Merge only the given step's fields into the draft — values for other
    /// steps' fields (or unknown keys) in the payload are ignored.
    fn merge_step(&mut self, page: Page, values: &Map<String, Value>) {
        for spec in fields_for_page(&self.assignments, page) {
            if let Some(value) = values.get(spec.key.as_str()) {
                self.draft
                    .insert(spec.key.as_str().to_string(), value.clone());
            }
        }
    }
}

impl Default for StepForm {
    fn default() -> Self {
        Self::new()
    }
}

/// Flatten an accumulated draft into the columns of the user row.
///
/// The address group spreads into its four columns. Keys that don't match
/// a registry field are treated as not collected and dropped — a stale
/// draft never crashes the final write.
pub fn draft_to_update(draft: &Map<String, Value>) -> OnboardingUpdate {
    let mut update = OnboardingUpdate::default();
    let text = |v: &Value| v.as_str().map(str::to_string);

    for (key, value) in draft {
        match key.parse::<FieldKey>() {
            Ok(FieldKey::AboutMe) => update.about_me = text(value),
            Ok(FieldKey::Birthdate) => update.birthdate = text(value),
            Ok(FieldKey::SkillLevel) => update.skill_level = text(value),
            Ok(FieldKey::Onsite) => update.onsite = text(value),
            Ok(FieldKey::Compensation) => update.compensation = text(value),
            Ok(FieldKey::Address) => {
                if let Some(parts) = value.as_object() {
                    update.street_address =
                        parts.get("street_address").and_then(|v| text(v));
                    update.city = parts.get("city").and_then(|v| text(v));
                    update.state = parts.get("state").and_then(|v| text(v));
                    update.zip_code = parts.get("zipcode").and_then(|v| text(v));
                }
            }
            Err(_) => {
                warn!(key = %key, "Dropping unknown draft key from final write");
            }
        }
    }
    update
}
