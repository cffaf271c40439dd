//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases. Migrations run in the
//! constructors, so a freshly opened backend is always at the latest schema.

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Transaction, params};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::assignment::engine::{AssignmentSet, Page};
use crate::error::DatabaseError;
use crate::registry::FieldKey;
use crate::store::migrations;
use crate::store::traits::{Database, NewUser, OnboardingUpdate, Session, UserRecord};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        info!(path = %path.display(), "Database opened");
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        migrations::run_migrations(&conn).await?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

/// Convert `Option<String>` to a libsql Value.
fn opt_text(s: &Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.clone()),
        None => libsql::Value::Null,
    }
}

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, about_me, \
     street_address, city, state, zip_code, birthdate, skill_level, onsite, compensation, \
     current_step, is_completed, created_at, updated_at";

/// Map a libsql Row to a UserRecord. Column order matches USER_COLUMNS.
fn row_to_user(row: &libsql::Row) -> Result<UserRecord, libsql::Error> {
    let created_str: String = row.get(16)?;
    let updated_str: String = row.get(17)?;
    Ok(UserRecord {
        id: row.get(0)?,
        first_name: row.get(1).ok(),
        last_name: row.get(2).ok(),
        email: row.get(3)?,
        password_hash: row.get(4).ok(),
        about_me: row.get(5).ok(),
        street_address: row.get(6).ok(),
        city: row.get(7).ok(),
        state: row.get(8).ok(),
        zip_code: row.get(9).ok(),
        birthdate: row.get(10).ok(),
        skill_level: row.get(11)?,
        onsite: row.get(12).ok(),
        compensation: row.get(13).ok(),
        current_step: row.get(14)?,
        is_completed: row.get::<i64>(15)? != 0,
        created_at: parse_datetime(&created_str),
        updated_at: parse_datetime(&updated_str),
    })
}

/// Map a libsql Row to a Session.
fn row_to_session(row: &libsql::Row) -> Result<Session, libsql::Error> {
    let created_str: String = row.get(2)?;
    let expires_str: String = row.get(3)?;
    Ok(Session {
        token: row.get(0)?,
        user_id: row.get(1)?,
        created_at: parse_datetime(&created_str),
        expires_at: parse_datetime(&expires_str),
    })
}

/// Write the rows implied by `set` into a fresh assignment table. Runs
/// inside the caller's transaction.
async fn write_assignment_rows(
    tx: &Transaction,
    set: &AssignmentSet,
) -> Result<(), DatabaseError> {
    tx.execute("DELETE FROM onboarding_assignments", ())
        .await
        .map_err(|e| DatabaseError::Query(format!("replace_assignments delete: {e}")))?;

    for page in Page::ALL {
        for key in set.page(page) {
            tx.execute(
                "INSERT INTO onboarding_assignments (field_key, page) VALUES (?1, ?2)",
                params![key.as_str(), page.number() as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("replace_assignments insert: {e}")))?;
        }
    }
    Ok(())
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    // ── Assignments ─────────────────────────────────────────────────

    async fn load_assignments(&self) -> Result<AssignmentSet, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT field_key, page FROM onboarding_assignments ORDER BY rowid",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("load_assignments: {e}")))?;

        let mut set = AssignmentSet::default();
        while let Ok(Some(row)) = rows.next().await {
            let key_str: String = row.get(0).unwrap_or_default();
            let page_num: i64 = row.get(1).unwrap_or(0);
            let Ok(key) = FieldKey::from_str(&key_str) else {
                warn!(field_key = %key_str, "Skipping assignment row with unknown field key");
                continue;
            };
            let Some(page) = Page::from_number(page_num) else {
                warn!(page = page_num, "Skipping assignment row with out-of-range page");
                continue;
            };
            set.move_field(key, page);
        }
        Ok(set)
    }

    async fn replace_assignments(&self, set: &AssignmentSet) -> Result<(), DatabaseError> {
        let tx = self
            .conn()
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("replace_assignments begin: {e}")))?;

        if let Err(e) = write_assignment_rows(&tx, set).await {
            // Explicit rollback so a reader never sees the half-written set.
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, "Rollback after failed assignment replace also failed");
            }
            return Err(e);
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("replace_assignments commit: {e}")))?;

        debug!(rows = set.len(), "Assignment set replaced");
        Ok(())
    }

    // ── Users ───────────────────────────────────────────────────────

    async fn insert_user(&self, user: &NewUser) -> Result<String, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO users (id, first_name, last_name, email, password_hash, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    id.clone(),
                    user.first_name.clone(),
                    user.last_name.clone(),
                    user.email.clone(),
                    user.password_hash.clone(),
                    now,
                ],
            )
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if msg.contains("UNIQUE") {
                    DatabaseError::Constraint(format!("email already registered: {}", user.email))
                } else {
                    DatabaseError::Query(format!("insert_user: {e}"))
                }
            })?;

        debug!(user_id = %id, email = %user.email, "User inserted");
        Ok(id)
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_by_email: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user = row_to_user(&row)
                    .map_err(|e| DatabaseError::Query(format!("user row parse: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user_by_email: {e}"))),
        }
    }

    async fn get_user(&self, id: &str) -> Result<Option<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let user = row_to_user(&row)
                    .map_err(|e| DatabaseError::Query(format!("user row parse: {e}")))?;
                Ok(Some(user))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_user: {e}"))),
        }
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                &format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_users: {e}")))?;

        let mut users = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_user(&row) {
                Ok(user) => users.push(user),
                Err(e) => warn!("Skipping user row: {e}"),
            }
        }
        Ok(users)
    }

    async fn update_user_onboarding(
        &self,
        user_id: &str,
        update: &OnboardingUpdate,
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn()
            .execute(
                "UPDATE users SET about_me = ?1, street_address = ?2, city = ?3, state = ?4,
                    zip_code = ?5, birthdate = ?6,
                    skill_level = COALESCE(?7, skill_level),
                    onsite = ?8, compensation = ?9,
                    current_step = 3, is_completed = 1, updated_at = ?10
                 WHERE id = ?11",
                params![
                    opt_text(&update.about_me),
                    opt_text(&update.street_address),
                    opt_text(&update.city),
                    opt_text(&update.state),
                    opt_text(&update.zip_code),
                    opt_text(&update.birthdate),
                    opt_text(&update.skill_level),
                    opt_text(&update.onsite),
                    opt_text(&update.compensation),
                    now,
                    user_id,
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("update_user_onboarding: {e}")))?;

        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "user".into(),
                id: user_id.into(),
            });
        }

        debug!(user_id = %user_id, "Onboarding values written");
        Ok(())
    }

    // ── Sessions ────────────────────────────────────────────────────

    async fn insert_session(&self, session: &Session) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO sessions (token, user_id, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.token.clone(),
                    session.user_id.clone(),
                    session.created_at.to_rfc3339(),
                    session.expires_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_session: {e}")))?;
        Ok(())
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
                params![token],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_session: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let session = row_to_session(&row)
                    .map_err(|e| DatabaseError::Query(format!("session row parse: {e}")))?;
                Ok(Some(session))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_session: {e}"))),
        }
    }

    async fn delete_session(&self, token: &str) -> Result<bool, DatabaseError> {
        let count = self
            .conn()
            .execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_session: {e}")))?;
        Ok(count > 0)
    }

    async fn prune_expired_sessions(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("prune_expired_sessions: {e}")))?;

        if count > 0 {
            info!(count, "Pruned expired sessions");
        }
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FieldKey;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn sample_set() -> AssignmentSet {
        AssignmentSet {
            one: vec![FieldKey::AboutMe, FieldKey::Birthdate],
            two: vec![FieldKey::Address, FieldKey::SkillLevel],
            three: vec![FieldKey::Onsite, FieldKey::Compensation],
        }
    }

    fn sample_user(email: &str) -> NewUser {
        NewUser {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: email.into(),
            password_hash: "$argon2id$stub".into(),
        }
    }

    #[tokio::test]
    async fn empty_store_loads_empty_set() {
        let db = backend().await;
        let set = db.load_assignments().await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn replace_then_load_roundtrip() {
        let db = backend().await;
        let set = sample_set();
        db.replace_assignments(&set).await.unwrap();

        let loaded = db.load_assignments().await.unwrap();
        assert!(loaded.same_grouping(&set));
    }

    #[tokio::test]
    async fn replace_discards_previous_rows() {
        let db = backend().await;
        db.replace_assignments(&sample_set()).await.unwrap();

        let mut moved = sample_set();
        moved.move_field(FieldKey::Birthdate, Page::Three);
        db.replace_assignments(&moved).await.unwrap();

        let loaded = db.load_assignments().await.unwrap();
        assert!(loaded.same_grouping(&moved));
        assert_eq!(loaded.len(), 6, "no leftover rows from the first set");
    }

    #[tokio::test]
    async fn insert_and_fetch_user() {
        let db = backend().await;
        let id = db.insert_user(&sample_user("ada@example.com")).await.unwrap();

        let by_email = db.get_user_by_email("ada@example.com").await.unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert_eq!(by_email.first_name.as_deref(), Some("Ada"));
        assert_eq!(by_email.skill_level, "Beginner");
        assert!(!by_email.is_completed);
        assert_eq!(by_email.current_step, 1);

        let by_id = db.get_user(&id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ada@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_a_constraint_error() {
        let db = backend().await;
        db.insert_user(&sample_user("dup@example.com")).await.unwrap();
        let err = db.insert_user(&sample_user("dup@example.com")).await;
        assert!(matches!(err, Err(DatabaseError::Constraint(_))));
    }

    #[tokio::test]
    async fn onboarding_update_writes_values_and_completes() {
        let db = backend().await;
        let id = db.insert_user(&sample_user("ada@example.com")).await.unwrap();

        let update = OnboardingUpdate {
            about_me: Some("I build analytical engines.".into()),
            street_address: Some("1 Main St".into()),
            city: Some("London".into()),
            state: Some("LN".into()),
            zip_code: Some("10001".into()),
            birthdate: Some("1815-12-10".into()),
            skill_level: Some("Expert".into()),
            onsite: Some("no".into()),
            compensation: Some("fair".into()),
        };
        db.update_user_onboarding(&id, &update).await.unwrap();

        let user = db.get_user(&id).await.unwrap().unwrap();
        assert_eq!(user.about_me.as_deref(), Some("I build analytical engines."));
        assert_eq!(user.skill_level, "Expert");
        assert_eq!(user.onsite.as_deref(), Some("no"));
        assert!(user.is_completed);
        assert_eq!(user.current_step, 3);
    }

    #[tokio::test]
    async fn onboarding_update_unknown_user_is_not_found() {
        let db = backend().await;
        let err = db
            .update_user_onboarding("nope", &OnboardingUpdate::default())
            .await;
        assert!(matches!(err, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let db = backend().await;
        let user_id = db.insert_user(&sample_user("s@example.com")).await.unwrap();

        let now = Utc::now();
        let session = Session {
            token: "tok-1".into(),
            user_id: user_id.clone(),
            created_at: now,
            expires_at: now + chrono::Duration::hours(1),
        };
        db.insert_session(&session).await.unwrap();

        let fetched = db.get_session("tok-1").await.unwrap().unwrap();
        assert_eq!(fetched.user_id, user_id);
        assert!(!fetched.is_expired(now));

        assert!(db.delete_session("tok-1").await.unwrap());
        assert!(!db.delete_session("tok-1").await.unwrap());
        assert!(db.get_session("tok-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prune_removes_only_expired_sessions() {
        let db = backend().await;
        let user_id = db.insert_user(&sample_user("p@example.com")).await.unwrap();
        let now = Utc::now();

        for (token, offset_hours) in [("live", 2i64), ("dead", -2i64)] {
            db.insert_session(&Session {
                token: token.into(),
                user_id: user_id.clone(),
                created_at: now,
                expires_at: now + chrono::Duration::hours(offset_hours),
            })
            .await
            .unwrap();
        }

        assert_eq!(db.prune_expired_sessions().await.unwrap(), 1);
        assert!(db.get_session("live").await.unwrap().is_some());
        assert!(db.get_session("dead").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_file_backend_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stepflow.db");

        {
            let db = LibSqlBackend::new_local(&path).await.unwrap();
            db.replace_assignments(&sample_set()).await.unwrap();
        }

        let db = LibSqlBackend::new_local(&path).await.unwrap();
        let loaded = db.load_assignments().await.unwrap();
        assert!(loaded.same_grouping(&sample_set()));
    }
}
