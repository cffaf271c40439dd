//! REST endpoint for the final onboarding submit.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::runtime::draft_to_update;
use crate::auth::authenticate;
use crate::error::{AuthError, Error};
use crate::refresh::{RefreshBus, View};
use crate::registry::{all_fields, validate_fields};
use crate::store::Database;

/// Shared state for form routes.
#[derive(Clone)]
pub struct FormRouteState {
    pub db: Arc<dyn Database>,
    pub refresh: RefreshBus,
}

/// POST /api/onboarding
///
/// Accepts the accumulated flat field-value map and writes it to the
/// authenticated account's row. The whole registry is re-validated here
/// regardless of what the client checked per step.
async fn submit_onboarding(
    State(state): State<FormRouteState>,
    headers: HeaderMap,
    Json(values): Json<Map<String, Value>>,
) -> impl IntoResponse {
    let identity = match authenticate(&headers, state.db.as_ref()).await {
        Ok(identity) => identity,
        Err(Error::Auth(AuthError::NotAuthenticated)) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({"error": "Not authenticated"})),
            );
        }
        Err(e) => {
            warn!(error = %e, "Onboarding auth check failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Something went wrong. Please try again."})),
            );
        }
    };

    let errors = validate_fields(all_fields(), &values);
    if !errors.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"errors": errors})),
        );
    }

    let update = draft_to_update(&values);
    match state
        .db
        .update_user_onboarding(&identity.user_id, &update)
        .await
    {
        Ok(()) => {
            info!(user_id = %identity.user_id, "Onboarding submitted via API");
            state.refresh.publish(View::Data);
            (StatusCode::OK, Json(serde_json::json!({"success": true})))
        }
        Err(e) => {
            warn!(error = %e, "Onboarding write failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Something went wrong. Please try again."})),
            )
        }
    }
}

/// Build the form REST routes.
pub fn form_routes(state: FormRouteState) -> Router {
    Router::new()
        .route("/api/onboarding", post(submit_onboarding))
        .with_state(state)
}
