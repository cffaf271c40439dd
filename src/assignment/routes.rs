//! REST endpoints for reading and replacing the assignment set.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};
use tracing::{info, warn};

use super::engine;
use crate::assignment::engine::AssignmentSet;
use crate::refresh::RefreshBus;
use crate::registry::all_fields;
use crate::store::Database;

/// Shared state for assignment routes.
#[derive(Clone)]
pub struct AssignmentRouteState {
    pub db: Arc<dyn Database>,
    pub refresh: RefreshBus,
}

/// GET /api/assignments
///
/// The current persisted set as `{"1": [...], "2": [...], "3": [...]}`.
/// Consumed by the step form at load time; an unconfigured store returns
/// three empty pages.
async fn get_assignments(State(state): State<AssignmentRouteState>) -> impl IntoResponse {
    match state.db.load_assignments().await {
        Ok(set) => (StatusCode::OK, Json(serde_json::json!(set))),
        Err(e) => {
            warn!(error = %e, "Failed to load assignments");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to fetch assignments"})),
            )
        }
    }
}

/// PUT /api/admin/assignments
///
/// Validates the submitted set against the registry and atomically replaces
/// the persisted rows. A violation comes back as 422 with the user-facing
/// message and the store is not touched.
async fn put_assignments(
    State(state): State<AssignmentRouteState>,
    Json(set): Json<AssignmentSet>,
) -> impl IntoResponse {
    if let Err(violation) = engine::validate(&set, all_fields()) {
        warn!(violation = ?violation, "Assignment save rejected");
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": violation.to_string()})),
        );
    }

    match state.db.replace_assignments(&set).await {
        Ok(()) => {
            info!(rows = set.len(), "Assignment set replaced via API");
            state.refresh.publish_assignment_change();
            (StatusCode::OK, Json(serde_json::json!({"status": "saved"})))
        }
        Err(e) => {
            warn!(error = %e, "Assignment replace failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Failed to save configuration. Please try again."
                })),
            )
        }
    }
}

/// Build the assignment REST routes.
pub fn assignment_routes(state: AssignmentRouteState) -> Router {
    Router::new()
        .route("/api/assignments", get(get_assignments))
        .route("/api/admin/assignments", put(put_assignments))
        .with_state(state)
}
