//! Bearer-token sessions — creation, lookup, and request authentication.

use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use rand::RngCore;
use tracing::debug;

use crate::error::{AuthError, Error};
use crate::store::{Database, Session};

/// The resolved identity of an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
}

/// Generate an opaque session token: 32 random bytes, hex-encoded.
pub fn new_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Build a fresh session row for a user with the given time-to-live.
pub fn new_session(user_id: &str, ttl: Duration) -> Session {
    let now = Utc::now();
    Session {
        token: new_token(),
        user_id: user_id.to_string(),
        created_at: now,
        expires_at: now + ttl,
    }
}

/// Extract the bearer token from an `Authorization` header, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the request's identity, failing closed.
///
/// A missing, unknown, or expired token is `AuthError::NotAuthenticated`;
/// only a store failure surfaces as a database error.
pub async fn authenticate(headers: &HeaderMap, db: &dyn Database) -> Result<Identity, Error> {
    let token = bearer_token(headers).ok_or(AuthError::NotAuthenticated)?;

    let session = db
        .get_session(token)
        .await?
        .ok_or(AuthError::NotAuthenticated)?;

    if session.is_expired(Utc::now()) {
        debug!(user_id = %session.user_id, "Rejecting expired session");
        // Best effort — the prune sweep catches anything this misses.
        let _ = db.delete_session(token).await;
        return Err(AuthError::NotAuthenticated.into());
    }

    let user = db
        .get_user(&session.user_id)
        .await?
        .ok_or(AuthError::NotAuthenticated)?;

    Ok(Identity {
        user_id: user.id,
        email: user.email,
    })
}
