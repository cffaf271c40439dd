//! Unified `Database` trait — single async interface for all persistence.
//!
//! Covers the three row families the service owns: the assignment set,
//! account rows, and bearer sessions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::assignment::engine::AssignmentSet;
use crate::error::DatabaseError;

/// A registered account row, including the onboarding values collected so
/// far. The password hash never serializes.
#[derive(Debug, Clone, Serialize)]
pub struct UserRecord {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub about_me: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub birthdate: Option<String>,
    pub skill_level: String,
    pub onsite: Option<String>,
    pub compensation: Option<String>,
    pub current_step: i64,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new account row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
}

/// The onboarding values written to a user row at final submit.
///
/// All fields are optional: the runtime omits anything it did not collect,
/// and the store writes NULL for omitted values rather than failing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OnboardingUpdate {
    pub about_me: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub birthdate: Option<String>,
    pub skill_level: Option<String>,
    pub onsite: Option<String>,
    pub compensation: Option<String>,
}

/// A bearer-token session row.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Backend-agnostic database trait covering assignments, users, and sessions.
#[async_trait]
pub trait Database: Send + Sync {
    // ── Assignments ─────────────────────────────────────────────────

    /// Read the persisted assignment set, grouped by page. An empty store
    /// yields a set with all three pages empty — it never fails on
    /// emptiness (engine validation flags that separately).
    async fn load_assignments(&self) -> Result<AssignmentSet, DatabaseError>;

    /// Atomically discard all assignment rows and write the rows implied by
    /// `set`. All-or-nothing: a failure partway must leave either the fully
    /// old or fully new rows visible to readers, never a mix.
    async fn replace_assignments(&self, set: &AssignmentSet) -> Result<(), DatabaseError>;

    // ── Users ───────────────────────────────────────────────────────

    /// Insert a new account row. Returns the generated user id.
    async fn insert_user(&self, user: &NewUser) -> Result<String, DatabaseError>;

    /// Look up an account by email.
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError>;

    /// Look up an account by id.
    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError>;

    /// All account rows, oldest first, for the admin data listing.
    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError>;

    /// Write the collected onboarding values to a user row in one statement
    /// and mark the flow complete.
    async fn update_user_onboarding(
        &self,
        user_id: &str,
        update: &OnboardingUpdate,
    ) -> Result<(), DatabaseError>;

    // ── Sessions ────────────────────────────────────────────────────

    /// Insert a new session row.
    async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError>;

    /// Look up a session by token (expiry is the caller's check).
    async fn get_session(&self, token: &str) -> Result<Option<Session>, DatabaseError>;

    /// Delete a session. Returns whether a row was removed.
    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError>;

    /// Delete all expired sessions. Returns the number removed.
    async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError>;
}
