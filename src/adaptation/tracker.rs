//! Planner task state: per-item status, transitions, and the rendered view.

use serde::{Deserialize, Serialize};

use super::model::{PlannerItem, UserDayState};
use crate::error::PlannerError;

/// Observable status of a planner item for one user and day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Completed,
    Postponed,
}

/// An action the user may take on a rendered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Complete,
    MarkIncomplete,
    Postpone,
}

impl ItemStatus {
    /// Actions offered for an item in this status.
    ///
    /// Postponement is never offered on a completed item, and a postponed
    /// item can only be completed.
    pub fn available_actions(self) -> Vec<ItemAction> {
        match self {
            Self::Pending => vec![ItemAction::Complete, ItemAction::Postpone],
            Self::Completed => vec![ItemAction::MarkIncomplete],
            Self::Postponed => vec![ItemAction::Complete],
        }
    }
}

impl UserDayState {
    /// Status of item `index`.
    pub fn status_of(&self, index: u32) -> ItemStatus {
        if self.is_completed(index) {
            ItemStatus::Completed
        } else if self.is_postponed(index) {
            ItemStatus::Postponed
        } else {
            ItemStatus::Pending
        }
    }

    /// Flip the completion of item `index`, returning its new status.
    ///
    /// Completing an item always clears its postponed flag.
    pub fn toggle_complete(&mut self, index: u32) -> ItemStatus {
        let (completed, postponed) = self.sets_mut();
        if completed.remove(&index) {
            return ItemStatus::Pending;
        }
        completed.insert(index);
        postponed.remove(&index);
        ItemStatus::Completed
    }

    /// Postpone item `index`. Returns `false` if it was already postponed.
    ///
    /// A completed item cannot be postponed.
    pub fn mark_postponed(&mut self, day: i64, index: u32) -> Result<bool, PlannerError> {
        if self.is_completed(index) {
            return Err(PlannerError::AlreadyCompleted { day, index });
        }
        let (_, postponed) = self.sets_mut();
        Ok(postponed.insert(index))
    }
}

/// Check that `index` addresses one of `count` items of `day`.
pub fn validate_index(day: i64, index: u32, count: usize) -> Result<(), PlannerError> {
    if index == 0 || index as usize > count {
        return Err(PlannerError::InvalidItemIndex { day, index, count });
    }
    Ok(())
}

/// One rendered planner item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerEntry {
    pub display_index: u32,
    pub time_slot: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub status: ItemStatus,
    pub actions: Vec<ItemAction>,
}

/// A day's planner as presented to the user.
///
/// `entries` holds pending and completed items in program order; postponed
/// items follow in their own section, also in program order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerView {
    pub day: i64,
    pub entries: Vec<PlannerEntry>,
    pub postponed: Vec<PlannerEntry>,
    pub is_empty: bool,
}

impl PlannerView {
    /// All entries in display order: primary section, then postponed.
    pub fn ordered(&self) -> impl Iterator<Item = &PlannerEntry> {
        self.entries.iter().chain(self.postponed.iter())
    }

    /// Number of completed items in the view.
    pub fn completed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == ItemStatus::Completed)
            .count()
    }
}

/// Render the planner for `day` in one pass over the program items.
pub fn render(day: i64, items: &[PlannerItem], state: &UserDayState) -> PlannerView {
    let mut entries = Vec::with_capacity(items.len());
    let mut postponed = Vec::new();

    for (position, item) in items.iter().enumerate() {
        let display_index = position as u32 + 1;
        let status = state.status_of(display_index);
        let entry = PlannerEntry {
            display_index,
            time_slot: item.time_slot.clone(),
            description: item.description.clone(),
            contact: item.contact.clone(),
            status,
            actions: status.available_actions(),
        };
        match status {
            ItemStatus::Postponed => postponed.push(entry),
            ItemStatus::Pending | ItemStatus::Completed => entries.push(entry),
        }
    }

    let is_empty = entries.is_empty() && postponed.is_empty();
    PlannerView {
        day,
        entries,
        postponed,
        is_empty,
    }
}
