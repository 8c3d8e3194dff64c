//! AdaptationService resolves the user's day and applies planner and skip
//! operations against the store.
//!
//! Every read-modify-write runs under a keyed lock: `(user, day)` for planner
//! state and `user` for the skip counter.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::clock::Clock;
use super::day::{self, Reason, Resolution};
use super::locks::KeyedLocks;
use super::model::{OnboardingProfile, UserDayState};
use super::tracker::{self, PlannerView};
use crate::error::PlannerError;
use crate::store::AdaptationStore;

/// Content for the resolved day, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Today<T> {
    Day { day: i64, content: T },
    NotApplicable { reason: Reason },
}

impl<T> Today<T> {
    pub fn content(&self) -> Option<&T> {
        match self {
            Self::Day { content, .. } => Some(content),
            Self::NotApplicable { .. } => None,
        }
    }
}

/// Skip counter after a skip or return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipOutcome {
    pub skipped_days: u32,
}

/// Completed planner items on one program day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayProgress {
    pub day: i64,
    pub completed: usize,
}

/// One user's completion series across the days worked so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProgress {
    pub label: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub points: Vec<DayProgress>,
}

/// Coordinates day resolution, planner state, and skips for all users.
pub struct AdaptationService {
    store: Arc<dyn AdaptationStore>,
    clock: Arc<dyn Clock>,
    day_locks: KeyedLocks<(String, i64)>,
    profile_locks: KeyedLocks<String>,
}

impl AdaptationService {
    pub fn new(store: Arc<dyn AdaptationStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            day_locks: KeyedLocks::new(),
            profile_locks: KeyedLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn AdaptationStore> {
        &self.store
    }

    /// Today's date in the program calendar.
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    // ── Profiles ────────────────────────────────────────────────────

    /// Whether a profile exists for the user.
    pub async fn user_exists(&self, user_id: &str) -> Result<bool, PlannerError> {
        Ok(self.store.get_profile(user_id).await?.is_some())
    }

    /// Create or update a user's profile. The skip counter is kept.
    pub async fn provision(
        &self,
        user_id: &str,
        name: Option<String>,
        start_date: Option<&str>,
    ) -> Result<OnboardingProfile, PlannerError> {
        let start_date = match start_date.map(str::trim).filter(|s| !s.is_empty()) {
            Some(text) => {
                let parsed = day::parse_start_date(text).ok_or_else(|| {
                    PlannerError::InvalidStartDate {
                        value: text.to_string(),
                    }
                })?;
                Some(day::format_start_date(parsed))
            }
            None => None,
        };

        let _guard = self.profile_locks.lock(user_id.to_string()).await;
        let mut profile = OnboardingProfile::new(user_id);
        profile.name = name;
        profile.start_date = start_date;
        self.store.upsert_profile(&profile).await?;

        let stored = self.require_profile(user_id).await?;
        info!(user_id, start_date = ?stored.start_date, "Profile provisioned");
        Ok(stored)
    }

    async fn require_profile(&self, user_id: &str) -> Result<OnboardingProfile, PlannerError> {
        self.store
            .get_profile(user_id)
            .await?
            .ok_or_else(|| PlannerError::UserNotFound {
                user_id: user_id.to_string(),
            })
    }

    fn start_date_of(profile: &OnboardingProfile) -> Result<Option<NaiveDate>, PlannerError> {
        profile.parsed_start_date().map_err(|value| {
            PlannerError::CorruptStartDate {
                user_id: profile.user_id.clone(),
                value,
            }
        })
    }

    // ── Day resolution ──────────────────────────────────────────────

    /// Resolve the user's adaptation day for today.
    pub async fn resolve_day(&self, user_id: &str) -> Result<Resolution, PlannerError> {
        let profile = self.require_profile(user_id).await?;
        let start = Self::start_date_of(&profile)?;
        let resolution = Resolution::from(day::resolve(start, profile.skipped_days, self.today()));
        debug!(user_id, ?resolution, "Adaptation day resolved");
        Ok(resolution)
    }

    /// Main tasks of today's adaptation day.
    pub async fn main_tasks(&self, user_id: &str) -> Result<Today<Vec<String>>, PlannerError> {
        match self.resolve_day(user_id).await? {
            Resolution::NotApplicable { reason } => Ok(Today::NotApplicable { reason }),
            Resolution::Day { day } => {
                let tasks = self.store.get_main_tasks(day).await?;
                Ok(Today::Day { day, content: tasks })
            }
        }
    }

    /// Planner view of today's adaptation day.
    pub async fn planner(&self, user_id: &str) -> Result<Today<PlannerView>, PlannerError> {
        match self.resolve_day(user_id).await? {
            Resolution::NotApplicable { reason } => Ok(Today::NotApplicable { reason }),
            Resolution::Day { day } => {
                let view = self.render_day(user_id, day).await?;
                Ok(Today::Day { day, content: view })
            }
        }
    }

    /// Planner view of a specific day, regardless of today's date.
    pub async fn planner_for_day(&self, user_id: &str, day: i64) -> Result<PlannerView, PlannerError> {
        self.require_profile(user_id).await?;
        self.render_day(user_id, day).await
    }

    async fn render_day(&self, user_id: &str, day: i64) -> Result<PlannerView, PlannerError> {
        let items = self.store.get_day_tasks(day).await?;
        let state = self.store.get_user_day_state(user_id, day).await?;
        Ok(tracker::render(day, &items, &state))
    }

    // ── Planner transitions ─────────────────────────────────────────

    /// Toggle completion of item `index` on `day`, returning the new view.
    pub async fn toggle_complete(
        &self,
        user_id: &str,
        day: i64,
        index: u32,
    ) -> Result<PlannerView, PlannerError> {
        let status = self
            .update_day_state(user_id, day, index, |state| Ok(state.toggle_complete(index)))
            .await?;
        info!(user_id, day, index, ?status, "Planner item toggled");
        self.render_day(user_id, day).await
    }

    /// Postpone item `index` on `day`, returning the new view.
    pub async fn postpone(
        &self,
        user_id: &str,
        day: i64,
        index: u32,
    ) -> Result<PlannerView, PlannerError> {
        let changed = self
            .update_day_state(user_id, day, index, |state| state.mark_postponed(day, index))
            .await?;
        if changed {
            info!(user_id, day, index, "Planner item postponed");
        } else {
            debug!(user_id, day, index, "Planner item already postponed");
        }
        self.render_day(user_id, day).await
    }

    /// Read, mutate, and write back one user's day state under its lock.
    async fn update_day_state<R, F>(
        &self,
        user_id: &str,
        day: i64,
        index: u32,
        apply: F,
    ) -> Result<R, PlannerError>
    where
        F: FnOnce(&mut UserDayState) -> Result<R, PlannerError>,
    {
        self.require_profile(user_id).await?;
        let items = self.store.get_day_tasks(day).await?;
        tracker::validate_index(day, index, items.len())?;

        let _guard = self.day_locks.lock((user_id.to_string(), day)).await;
        let mut state = self.store.get_user_day_state(user_id, day).await?;
        let result = apply(&mut state)?;
        self.store.put_user_day_state(user_id, day, &state).await?;
        Ok(result)
    }

    // ── Skips ───────────────────────────────────────────────────────

    /// Skip one adaptation day.
    ///
    /// Rejected when the user has already skipped as many days as they have
    /// worked since their start date.
    pub async fn skip_day(&self, user_id: &str) -> Result<SkipOutcome, PlannerError> {
        let _guard = self.profile_locks.lock(user_id.to_string()).await;
        let profile = self.require_profile(user_id).await?;
        let start = Self::start_date_of(&profile)?
            .ok_or(PlannerError::NotApplicable(Reason::NoStartDate))?;

        let working_days = day::working_days_elapsed(start, self.today());
        if i64::from(profile.skipped_days) >= working_days {
            warn!(
                user_id,
                skipped = profile.skipped_days,
                working_days,
                "Skip rejected: limit reached"
            );
            return Err(PlannerError::SkipLimitExceeded {
                skipped: profile.skipped_days,
                working_days,
            });
        }

        let skipped = self.store.increment_skipped_days(user_id, 1).await?;
        info!(user_id, skipped, "Adaptation day skipped");
        Ok(SkipOutcome {
            skipped_days: clamp_counter(skipped),
        })
    }

    /// Return one previously skipped day.
    pub async fn return_day(&self, user_id: &str) -> Result<SkipOutcome, PlannerError> {
        let _guard = self.profile_locks.lock(user_id.to_string()).await;
        let profile = self.require_profile(user_id).await?;
        if profile.skipped_days == 0 {
            warn!(user_id, "Return rejected: no skipped days");
            return Err(PlannerError::NoSkippedDaysToReturn);
        }

        let skipped = self.store.increment_skipped_days(user_id, -1).await?;
        info!(user_id, skipped, "Skipped day returned");
        Ok(SkipOutcome {
            skipped_days: clamp_counter(skipped),
        })
    }

    // ── Progress ────────────────────────────────────────────────────

    /// Completed planner items per day for every user with a start date.
    ///
    /// Each series covers days `1..=working days elapsed`; days without
    /// recorded state count as zero. Weekends get no points, unlike a
    /// calendar-day count (`today - start + 1`): a Friday start viewed on
    /// the following Monday yields days 1 and 2, not four entries.
    pub async fn progress_overview(&self) -> Result<Vec<UserProgress>, PlannerError> {
        let today = self.today();
        let profiles = self.store.list_profiles().await?;

        let tracked: Vec<(OnboardingProfile, NaiveDate)> = profiles
            .into_iter()
            .filter_map(|p| match p.parsed_start_date() {
                Ok(Some(start)) => Some((p, start)),
                Ok(None) => None,
                Err(value) => {
                    warn!(user_id = %p.user_id, value = %value, "Skipping profile with malformed start date");
                    None
                }
            })
            .collect();

        let states = try_join_all(
            tracked
                .iter()
                .map(|(p, _)| self.store.list_user_day_states(&p.user_id)),
        )
        .await?;

        let overview = tracked
            .into_iter()
            .zip(states)
            .enumerate()
            .map(|(n, ((profile, start), states))| {
                let completed: HashMap<i64, usize> = states
                    .into_iter()
                    .map(|(day, state)| (day, state.completed_items().len()))
                    .collect();
                let last_day = day::working_days_elapsed(start, today);
                let points = (1..=last_day)
                    .map(|day| DayProgress {
                        day,
                        completed: completed.get(&day).copied().unwrap_or(0),
                    })
                    .collect();
                UserProgress {
                    label: format!("Employee {}", n + 1),
                    user_id: profile.user_id,
                    name: profile.name,
                    points,
                }
            })
            .collect::<Vec<_>>();

        debug!(users = overview.len(), "Progress overview built");
        Ok(overview)
    }
}

fn clamp_counter(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}
