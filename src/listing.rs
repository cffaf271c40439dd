//! Admin data listing and the explicit cache-refresh signal.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::warn;

use crate::refresh::{RefreshBus, View};
use crate::store::Database;

/// Shared state for listing routes.
#[derive(Clone)]
pub struct ListingRouteState {
    pub db: Arc<dyn Database>,
    pub refresh: RefreshBus,
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "stepflow"
    }))
}

/// GET /api/users
///
/// Every account row with its collected field values, for the admin-facing
/// data table. Password hashes never serialize.
async fn list_users(State(state): State<ListingRouteState>) -> impl IntoResponse {
    match state.db.list_users().await {
        Ok(users) => (StatusCode::OK, Json(serde_json::json!({"users": users}))),
        Err(e) => {
            warn!(error = %e, "User listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": e.to_string()})),
            )
        }
    }
}

/// POST /api/refresh-data
///
/// Tells subscribers the data listing should refetch. The save-assignments
/// path publishes the same signal itself; this endpoint is the manual
/// "please refresh" button.
async fn refresh_data(State(state): State<ListingRouteState>) -> impl IntoResponse {
    state.refresh.publish(View::Data);
    Json(serde_json::json!({
        "success": true,
        "message": "Data page cache cleared successfully"
    }))
}

/// Build the listing REST routes.
pub fn listing_routes(state: ListingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/users", get(list_users))
        .route("/api/refresh-data", post(refresh_data))
        .with_state(state)
}
