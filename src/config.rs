//! Configuration types.

use std::path::PathBuf;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::ConfigError;

/// Default UTC offset of the program's civil calendar (Moscow time).
const DEFAULT_UTC_OFFSET_HOURS: i32 = 3;

/// Application configuration, read from `ADAPT_*` environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Port for the REST server.
    pub http_port: u16,
    /// Program definition imported at startup, if any.
    pub program_path: Option<PathBuf>,
    /// Offset that defines "today" for day resolution.
    pub calendar_offset: FixedOffset,
    /// Directory for rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/adaptation.db"),
            http_port: 8080,
            program_path: None,
            calendar_offset: offset_from_hours(DEFAULT_UTC_OFFSET_HOURS)
                .unwrap_or_else(|| Utc.fix()),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let db_path = lookup("ADAPT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let http_port = match lookup("ADAPT_HTTP_PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "ADAPT_HTTP_PORT".into(),
                message: format!("{raw:?}: {e}"),
            })?,
            None => defaults.http_port,
        };

        let calendar_offset = match lookup("ADAPT_UTC_OFFSET_HOURS") {
            Some(raw) => {
                let hours: i32 = raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                    key: "ADAPT_UTC_OFFSET_HOURS".into(),
                    message: format!("{raw:?}: {e}"),
                })?;
                offset_from_hours(hours).ok_or_else(|| ConfigError::InvalidValue {
                    key: "ADAPT_UTC_OFFSET_HOURS".into(),
                    message: format!("{hours} is outside -12..=14"),
                })?
            }
            None => defaults.calendar_offset,
        };

        let program_path = lookup("ADAPT_PROGRAM_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let log_dir = lookup("ADAPT_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            db_path,
            http_port,
            program_path,
            calendar_offset,
            log_dir,
        })
    }
}

fn offset_from_hours(hours: i32) -> Option<FixedOffset> {
    if !(-12..=14).contains(&hours) {
        return None;
    }
    FixedOffset::east_opt(hours * 3600)
}
