//! Adaptation data models: profiles, program items, and per-day user state.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::day::parse_start_date;

/// A user's onboarding record.
///
/// `start_date` is kept in its stored `DD.MM.YYYY` text form; use
/// [`OnboardingProfile::parsed_start_date`] to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingProfile {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default)]
    pub skipped_days: u32,
}

impl OnboardingProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: None,
            start_date: None,
            skipped_days: 0,
        }
    }

    /// Builder: set display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set the stored start date text.
    pub fn with_start_date(mut self, start_date: impl Into<String>) -> Self {
        self.start_date = Some(start_date.into());
        self
    }

    /// Builder: set the skip counter.
    pub fn with_skipped_days(mut self, skipped_days: u32) -> Self {
        self.skipped_days = skipped_days;
        self
    }

    /// Interpret the stored start date.
    ///
    /// `Ok(None)` when no date is on file; `Err` carries the text that
    /// failed to parse.
    pub fn parsed_start_date(&self) -> Result<Option<NaiveDate>, String> {
        match self.start_date.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_start_date(text)
                .map(Some)
                .ok_or_else(|| text.to_string()),
        }
    }
}

/// A scheduled activity within one program day.
///
/// Items are identified by their 1-based position in the day's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerItem {
    #[serde(alias = "time")]
    pub time_slot: String,
    #[serde(alias = "task")]
    pub description: String,
    #[serde(
        default,
        deserialize_with = "deserialize_contact",
        skip_serializing_if = "Option::is_none"
    )]
    pub contact: Option<String>,
}

/// A blank contact means no contact.
pub(crate) fn non_blank(contact: Option<String>) -> Option<String> {
    contact.filter(|c| !c.trim().is_empty())
}

fn deserialize_contact<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(non_blank)
}

impl PlannerItem {
    pub fn new(time_slot: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            time_slot: time_slot.into(),
            description: description.into(),
            contact: None,
        }
    }

    /// Builder: set contact person.
    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contact = non_blank(Some(contact.into()));
        self
    }
}

/// A user's completed and postponed planner items for one day.
///
/// The two sets are disjoint. Fields are private so the only ways to change
/// them are the transitions in the tracker, and records read from storage
/// are normalised on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DayStateRecord")]
pub struct UserDayState {
    completed_items: BTreeSet<u32>,
    postponed_items: BTreeSet<u32>,
}

impl UserDayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw sets. An index present in both is kept as completed.
    pub fn from_parts(
        completed: impl IntoIterator<Item = u32>,
        postponed: impl IntoIterator<Item = u32>,
    ) -> Self {
        let completed_items: BTreeSet<u32> = completed.into_iter().collect();
        let postponed_items = postponed
            .into_iter()
            .filter(|i| !completed_items.contains(i))
            .collect();
        Self {
            completed_items,
            postponed_items,
        }
    }

    pub fn completed_items(&self) -> &BTreeSet<u32> {
        &self.completed_items
    }

    pub fn postponed_items(&self) -> &BTreeSet<u32> {
        &self.postponed_items
    }

    pub fn is_completed(&self, index: u32) -> bool {
        self.completed_items.contains(&index)
    }

    pub fn is_postponed(&self, index: u32) -> bool {
        self.postponed_items.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.completed_items.is_empty() && self.postponed_items.is_empty()
    }

    pub(super) fn sets_mut(&mut self) -> (&mut BTreeSet<u32>, &mut BTreeSet<u32>) {
        (&mut self.completed_items, &mut self.postponed_items)
    }
}

/// Wire/storage shape of [`UserDayState`], accepting the legacy field names.
#[derive(Debug, Default, Deserialize)]
struct DayStateRecord {
    #[serde(default, alias = "completed_tasks")]
    completed_items: Vec<u32>,
    #[serde(default, alias = "postponed_tasks")]
    postponed_items: Vec<u32>,
}

impl From<DayStateRecord> for UserDayState {
    fn from(record: DayStateRecord) -> Self {
        Self::from_parts(record.completed_items, record.postponed_items)
    }
}
