//! Error types for the adaptation planner.

use crate::adaptation::day::Reason;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Program error: {0}")]
    Program(#[from] ProgramError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors raised by planner operations.
///
/// Only some of these are faults. Business-rule rejections and "not
/// applicable today" outcomes are expected and are reported back to the
/// user as plain information.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("No data on file for user {user_id}, contact an administrator")]
    UserNotFound { user_id: String },

    #[error("Start date {value:?} is not in DD.MM.YYYY form")]
    InvalidStartDate { value: String },

    #[error("Stored start date {value:?} of user {user_id} is unreadable")]
    CorruptStartDate { user_id: String, value: String },

    #[error("{0}")]
    NotApplicable(Reason),

    #[error("Skipped days ({skipped}) cannot exceed working days since start ({working_days})")]
    SkipLimitExceeded { skipped: u32, working_days: i64 },

    #[error("There are no skipped days to return")]
    NoSkippedDaysToReturn,

    #[error("Item {index} is out of range for day {day} ({count} items)")]
    InvalidItemIndex { day: i64, index: u32, count: usize },

    #[error("Item {index} of day {day} is already completed and cannot be postponed")]
    AlreadyCompleted { day: i64, index: u32 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl PlannerError {
    /// Whether this is an internal fault rather than an expected outcome.
    pub fn is_fault(&self) -> bool {
        matches!(
            self,
            Self::CorruptStartDate { .. }
                | Self::InvalidItemIndex { .. }
                | Self::AlreadyCompleted { .. }
                | Self::Database(_)
        )
    }

    /// Stable machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound { .. } => "user_not_found",
            Self::InvalidStartDate { .. } => "invalid_start_date",
            Self::CorruptStartDate { .. } => "corrupt_start_date",
            Self::NotApplicable(Reason::NoStartDate) => "no_start_date",
            Self::NotApplicable(Reason::WeekendToday) => "weekend_today",
            Self::SkipLimitExceeded { .. } => "skip_limit_exceeded",
            Self::NoSkippedDaysToReturn => "no_skipped_days_to_return",
            Self::InvalidItemIndex { .. } => "invalid_item_index",
            Self::AlreadyCompleted { .. } => "already_completed",
            Self::Database(_) => "database",
        }
    }
}

/// Errors loading or importing a program definition.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse program: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Program day {day} is invalid: days start at 1")]
    InvalidDay { day: i64 },

    #[error("Program day {day} is defined more than once")]
    DuplicateDay { day: i64 },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
