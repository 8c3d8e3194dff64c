//! libSQL backend: async `AdaptationStore` implementation.
//!
//! Supports local file and in-memory databases. Day-state sets are stored as
//! JSON arrays.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::adaptation::model::{OnboardingProfile, PlannerItem, UserDayState, non_blank};
use crate::error::DatabaseError;
use crate::store::migrations;
use crate::store::traits::AdaptationStore;

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
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::Pool(format!("Failed to create database directory: {e}"))
                })?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
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

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

const PROFILE_COLUMNS: &str = "user_id, name, start_date, skipped_days";

fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

/// Map a libsql Row to a profile. Column order matches PROFILE_COLUMNS.
fn row_to_profile(row: &libsql::Row) -> Result<OnboardingProfile, DatabaseError> {
    let user_id: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("profile row user_id: {e}")))?;
    let name: Option<String> = row.get(1).ok();
    let start_date: Option<String> = row.get(2).ok();
    let skipped: i64 = row.get(3).unwrap_or(0);
    Ok(OnboardingProfile {
        user_id,
        name,
        start_date,
        skipped_days: u32::try_from(skipped.max(0)).unwrap_or(u32::MAX),
    })
}

fn items_to_json(items: &std::collections::BTreeSet<u32>) -> Result<String, DatabaseError> {
    serde_json::to_string(items).map_err(|e| DatabaseError::Serialization(e.to_string()))
}

fn json_to_items(column: &str, raw: &str) -> Result<Vec<u32>, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::Serialization(format!("{column}: {e}")))
}

fn row_to_day_state(row: &libsql::Row, offset: i32) -> Result<UserDayState, DatabaseError> {
    let completed: String = row.get(offset).unwrap_or_else(|_| "[]".to_string());
    let postponed: String = row.get(offset + 1).unwrap_or_else(|_| "[]".to_string());
    Ok(UserDayState::from_parts(
        json_to_items("completed_items", &completed)?,
        json_to_items("postponed_items", &postponed)?,
    ))
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl AdaptationStore for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    // ── Profiles ────────────────────────────────────────────────────

    async fn get_profile(&self, user_id: &str) -> Result<Option<OnboardingProfile>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1"),
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_profile: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_profile(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_profile row: {e}"))),
        }
    }

    async fn upsert_profile(&self, profile: &OnboardingProfile) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO profiles (user_id, name, start_date, skipped_days, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT (user_id) DO UPDATE SET name = ?2, start_date = ?3, updated_at = ?5",
            params![
                profile.user_id.as_str(),
                opt_text(profile.name.as_deref()),
                opt_text(profile.start_date.as_deref()),
                i64::from(profile.skipped_days),
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_profile: {e}")))?;

        debug!(user_id = %profile.user_id, "Profile upserted");
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<OnboardingProfile>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                &format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at ASC, user_id ASC"),
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_profiles: {e}")))?;

        let mut profiles = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_profiles row: {e}")))?
        {
            profiles.push(row_to_profile(&row)?);
        }
        Ok(profiles)
    }

    async fn increment_skipped_days(&self, user_id: &str, delta: i64) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        let mut rows = conn
            .query(
                "INSERT INTO profiles (user_id, skipped_days, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT (user_id) DO UPDATE SET skipped_days = skipped_days + ?2, updated_at = ?3
                 RETURNING skipped_days",
                params![user_id, delta, now],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("increment_skipped_days: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("increment_skipped_days value: {e}"))),
            Ok(None) => Err(DatabaseError::Query(format!(
                "increment_skipped_days: no row returned for {user_id}"
            ))),
            Err(e) => Err(DatabaseError::Query(format!("increment_skipped_days row: {e}"))),
        }
    }

    // ── Program ─────────────────────────────────────────────────────

    async fn get_main_tasks(&self, day: i64) -> Result<Vec<String>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query("SELECT tasks FROM main_tasks WHERE day = ?1", params![day])
            .await
            .map_err(|e| DatabaseError::Query(format!("get_main_tasks: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row.get(0).unwrap_or_else(|_| "[]".to_string());
                serde_json::from_str(&raw)
                    .map_err(|e| DatabaseError::Serialization(format!("main_tasks: {e}")))
            }
            Ok(None) => Ok(Vec::new()),
            Err(e) => Err(DatabaseError::Query(format!("get_main_tasks row: {e}"))),
        }
    }

    async fn put_main_tasks(&self, day: i64, tasks: &[String]) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let raw =
            serde_json::to_string(tasks).map_err(|e| DatabaseError::Serialization(e.to_string()))?;
        conn.execute(
            "INSERT INTO main_tasks (day, tasks) VALUES (?1, ?2)
             ON CONFLICT (day) DO UPDATE SET tasks = ?2",
            params![day, raw],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("put_main_tasks: {e}")))?;
        Ok(())
    }

    async fn get_day_tasks(&self, day: i64) -> Result<Vec<PlannerItem>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT time_slot, description, contact FROM planner_items WHERE day = ?1 ORDER BY position ASC",
                params![day],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_day_tasks: {e}")))?;

        let mut items = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_day_tasks row: {e}")))?
        {
            let time_slot: String = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("planner time_slot: {e}")))?;
            let description: String = row
                .get(1)
                .map_err(|e| DatabaseError::Query(format!("planner description: {e}")))?;
            let contact = non_blank(row.get::<String>(2).ok());
            items.push(PlannerItem {
                time_slot,
                description,
                contact,
            });
        }
        Ok(items)
    }

    async fn put_day_tasks(&self, day: i64, items: &[PlannerItem]) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("put_day_tasks begin: {e}")))?;

        tx.execute("DELETE FROM planner_items WHERE day = ?1", params![day])
            .await
            .map_err(|e| DatabaseError::Query(format!("put_day_tasks clear: {e}")))?;

        for (position, item) in items.iter().enumerate() {
            tx.execute(
                "INSERT INTO planner_items (day, position, time_slot, description, contact) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    day,
                    position as i64 + 1,
                    item.time_slot.as_str(),
                    item.description.as_str(),
                    opt_text(item.contact.as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("put_day_tasks insert: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("put_day_tasks commit: {e}")))?;
        debug!(day, count = items.len(), "Planner items replaced");
        Ok(())
    }

    // ── User day state ──────────────────────────────────────────────

    async fn get_user_day_state(&self, user_id: &str, day: i64) -> Result<UserDayState, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT completed_items, postponed_items FROM user_day_states WHERE user_id = ?1 AND day = ?2",
                params![user_id, day],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_user_day_state: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_day_state(&row, 0),
            Ok(None) => Ok(UserDayState::default()),
            Err(e) => Err(DatabaseError::Query(format!("get_user_day_state row: {e}"))),
        }
    }

    async fn put_user_day_state(
        &self,
        user_id: &str,
        day: i64,
        state: &UserDayState,
    ) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO user_day_states (user_id, day, completed_items, postponed_items, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (user_id, day) DO UPDATE SET completed_items = ?3, postponed_items = ?4, updated_at = ?5",
            params![
                user_id,
                day,
                items_to_json(state.completed_items())?,
                items_to_json(state.postponed_items())?,
                now,
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("put_user_day_state: {e}")))?;

        debug!(user_id, day, "User day state saved");
        Ok(())
    }

    async fn list_user_day_states(&self, user_id: &str) -> Result<Vec<(i64, UserDayState)>, DatabaseError> {
        let conn = self.conn();
        let mut rows = conn
            .query(
                "SELECT day, completed_items, postponed_items FROM user_day_states WHERE user_id = ?1 ORDER BY day ASC",
                params![user_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_user_day_states: {e}")))?;

        let mut states = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_user_day_states row: {e}")))?
        {
            let day: i64 = row
                .get(0)
                .map_err(|e| DatabaseError::Query(format!("list_user_day_states day: {e}")))?;
            states.push((day, row_to_day_state(&row, 1)?));
        }
        Ok(states)
    }
}
