//! `AdaptationStore` trait, the single async interface for persistence.

use async_trait::async_trait;

use crate::adaptation::model::{OnboardingProfile, PlannerItem, UserDayState};
use crate::error::DatabaseError;

/// Backend-agnostic storage for profiles, program days, and user day state.
#[async_trait]
pub trait AdaptationStore: Send + Sync {
    /// Create or upgrade the schema.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Profiles ────────────────────────────────────────────────────

    /// Get a user's profile.
    async fn get_profile(&self, user_id: &str) -> Result<Option<OnboardingProfile>, DatabaseError>;

    /// Insert or replace a profile's name and start date.
    ///
    /// The stored skip counter of an existing profile is kept.
    async fn upsert_profile(&self, profile: &OnboardingProfile) -> Result<(), DatabaseError>;

    /// List all profiles in a stable order.
    async fn list_profiles(&self) -> Result<Vec<OnboardingProfile>, DatabaseError>;

    /// Atomically add `delta` to a user's skip counter, creating the record
    /// if absent. Returns the new value.
    ///
    /// No floor is applied here; callers check the bounds first.
    async fn increment_skipped_days(&self, user_id: &str, delta: i64) -> Result<i64, DatabaseError>;

    // ── Program ─────────────────────────────────────────────────────

    /// Main tasks of a program day, empty when the day has none.
    async fn get_main_tasks(&self, day: i64) -> Result<Vec<String>, DatabaseError>;

    /// Replace the main tasks of a program day.
    async fn put_main_tasks(&self, day: i64, tasks: &[String]) -> Result<(), DatabaseError>;

    /// Planner items of a program day in display order, empty when none.
    async fn get_day_tasks(&self, day: i64) -> Result<Vec<PlannerItem>, DatabaseError>;

    /// Replace the planner items of a program day.
    async fn put_day_tasks(&self, day: i64, items: &[PlannerItem]) -> Result<(), DatabaseError>;

    // ── User day state ──────────────────────────────────────────────

    /// A user's state for one day, empty when nothing was recorded.
    async fn get_user_day_state(&self, user_id: &str, day: i64) -> Result<UserDayState, DatabaseError>;

    /// Replace a user's state for one day.
    async fn put_user_day_state(
        &self,
        user_id: &str,
        day: i64,
        state: &UserDayState,
    ) -> Result<(), DatabaseError>;

    /// All recorded day states of a user, ordered by day.
    async fn list_user_day_states(&self, user_id: &str) -> Result<Vec<(i64, UserDayState)>, DatabaseError>;
}
