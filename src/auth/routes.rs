//! REST endpoints for account registration, login, and logout.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Duration;
use serde::Deserialize;
use tracing::{info, warn};

use super::password::{hash_password, verify_password};
use super::session::{bearer_token, new_session};
use crate::error::AuthError;
use crate::store::{Database, NewUser};

/// Shared state for auth routes.
#[derive(Clone)]
pub struct AuthRouteState {
    pub db: Arc<dyn Database>,
    /// How long issued sessions stay valid.
    pub session_ttl: Duration,
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

/// POST /api/auth/register
///
/// Creates an account. Duplicate emails are rejected with the same message
/// the login page shows, so the flow stays friendly rather than leaky.
async fn register(
    State(state): State<AuthRouteState>,
    Json(body): Json<RegisterRequest>,
) -> impl IntoResponse {
    if body.email.is_empty() || !body.email.contains('@') {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "Please enter a valid email address"})),
        );
    }
    if body.password.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "Password is required"})),
        );
    }

    match state.db.get_user_by_email(&body.email).await {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(serde_json::json!({"error": AuthError::EmailTaken.to_string()})),
            );
        }
        Ok(None) => {}
        Err(e) => {
            warn!(error = %e, "Register lookup failed");
            return internal_error();
        }
    }

    let password_hash = match hash_password(&body.password) {
        Ok(hash) => hash,
        Err(e) => {
            warn!(error = %e, "Password hashing failed");
            return internal_error();
        }
    };

    let user = NewUser {
        first_name: body.first_name,
        last_name: body.last_name,
        email: body.email,
        password_hash,
    };
    match state.db.insert_user(&user).await {
        Ok(id) => {
            info!(user_id = %id, "Account created");
            (
                StatusCode::OK,
                Json(serde_json::json!({"success": "Account created successfully"})),
            )
        }
        Err(e) => {
            warn!(error = %e, "Register insert failed");
            internal_error()
        }
    }
}

/// POST /api/auth/login
///
/// Verifies credentials and issues a bearer session token. Unknown email
/// and wrong password return the identical response.
async fn login(
    State(state): State<AuthRouteState>,
    Json(body): Json<LoginRequest>,
) -> impl IntoResponse {
    let user = match state.db.get_user_by_email(&body.email).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Login lookup failed");
            return internal_error();
        }
    };

    let verified = user.as_ref().is_some_and(|u| {
        u.password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(&body.password, hash).unwrap_or(false))
    });

    let Some(user) = user.filter(|_| verified) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": AuthError::InvalidCredentials.to_string()})),
        );
    };

    let session = new_session(&user.id, state.session_ttl);
    if let Err(e) = state.db.insert_session(&session).await {
        warn!(error = %e, "Session insert failed");
        return internal_error();
    }

    info!(user_id = %user.id, "Login succeeded");
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "token": session.token,
            "user_id": user.id,
            "email": user.email,
            "expires_at": session.expires_at.to_rfc3339(),
        })),
    )
}

/// POST /api/auth/logout
///
/// Deletes the presented session. Idempotent — an unknown token still
/// reports signed out.
async fn logout(State(state): State<AuthRouteState>, headers: HeaderMap) -> impl IntoResponse {
    let Some(token) = bearer_token(&headers) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({"error": AuthError::NotAuthenticated.to_string()})),
        );
    };

    match state.db.delete_session(token).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "signed_out"})),
        ),
        Err(e) => {
            warn!(error = %e, "Logout failed");
            internal_error()
        }
    }
}

fn internal_error() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": "Something went wrong. Please try again."})),
    )
}

/// Build the auth REST routes.
pub fn auth_routes(state: AuthRouteState) -> Router {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .with_state(state)
}
