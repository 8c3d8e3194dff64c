//! In-memory `AdaptationStore`, used as a test double and for dry runs.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::adaptation::model::{OnboardingProfile, PlannerItem, UserDayState};
use crate::error::DatabaseError;
use crate::store::traits::AdaptationStore;

#[derive(Default)]
struct Tables {
    profiles: BTreeMap<String, OnboardingProfile>,
    skipped: HashMap<String, i64>,
    main_tasks: HashMap<i64, Vec<String>>,
    planner: HashMap<i64, Vec<PlannerItem>>,
    day_states: BTreeMap<(String, i64), UserDayState>,
}

/// Store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clamp_counter(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl AdaptationStore for MemoryStore {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<OnboardingProfile>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.profiles.get(user_id).cloned().map(|mut p| {
            p.skipped_days = clamp_counter(tables.skipped.get(user_id).copied().unwrap_or(0));
            p
        }))
    }

    async fn upsert_profile(&self, profile: &OnboardingProfile) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        tables
            .skipped
            .entry(profile.user_id.clone())
            .or_insert(i64::from(profile.skipped_days));
        tables
            .profiles
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<OnboardingProfile>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .values()
            .cloned()
            .map(|mut p| {
                p.skipped_days = clamp_counter(tables.skipped.get(&p.user_id).copied().unwrap_or(0));
                p
            })
            .collect())
    }

    async fn increment_skipped_days(&self, user_id: &str, delta: i64) -> Result<i64, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables
            .profiles
            .entry(user_id.to_string())
            .or_insert_with(|| OnboardingProfile::new(user_id));
        let counter = tables.skipped.entry(user_id.to_string()).or_insert(0);
        *counter += delta;
        Ok(*counter)
    }

    async fn get_main_tasks(&self, day: i64) -> Result<Vec<String>, DatabaseError> {
        Ok(self
            .tables
            .read()
            .await
            .main_tasks
            .get(&day)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_main_tasks(&self, day: i64, tasks: &[String]) -> Result<(), DatabaseError> {
        self.tables
            .write()
            .await
            .main_tasks
            .insert(day, tasks.to_vec());
        Ok(())
    }

    async fn get_day_tasks(&self, day: i64) -> Result<Vec<PlannerItem>, DatabaseError> {
        Ok(self
            .tables
            .read()
            .await
            .planner
            .get(&day)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_day_tasks(&self, day: i64, items: &[PlannerItem]) -> Result<(), DatabaseError> {
        self.tables.write().await.planner.insert(day, items.to_vec());
        Ok(())
    }

    async fn get_user_day_state(&self, user_id: &str, day: i64) -> Result<UserDayState, DatabaseError> {
        Ok(self
            .tables
            .read()
            .await
            .day_states
            .get(&(user_id.to_string(), day))
            .cloned()
            .unwrap_or_default())
    }

    async fn put_user_day_state(
        &self,
        user_id: &str,
        day: i64,
        state: &UserDayState,
    ) -> Result<(), DatabaseError> {
        self.tables
            .write()
            .await
            .day_states
            .insert((user_id.to_string(), day), state.clone());
        Ok(())
    }

    async fn list_user_day_states(&self, user_id: &str) -> Result<Vec<(i64, UserDayState)>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .day_states
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|((_, day), state)| (*day, state.clone()))
            .collect())
    }
}
