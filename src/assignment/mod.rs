//! Assignment system — field-to-page mapping, admin editing, REST surface.
//!
//! The engine is pure logic over [`engine::AssignmentSet`]; the editor is
//! the interactive working-copy state machine the admin drives; the routes
//! expose read and validated-replace operations over HTTP.

pub mod editor;
pub mod engine;
pub mod routes;

pub use editor::{AssignmentEditor, EditorState};
pub use engine::{AssignmentSet, Page, Violation, fields_for_page, validate};
pub use routes::{AssignmentRouteState, assignment_routes};
