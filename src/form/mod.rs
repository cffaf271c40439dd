//! Step form system — the multi-step onboarding runtime and its REST surface.

pub mod routes;
pub mod runtime;

pub use routes::{FormRouteState, form_routes};
pub use runtime::{FormState, StepError, StepForm, SubmitError, draft_to_update};
