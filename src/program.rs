//! Program definition: main tasks and planner items per onboarding day.
//!
//! The program is authored as a JSON file and imported into the store at
//! startup. Days not listed keep whatever the store already holds.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adaptation::model::PlannerItem;
use crate::error::ProgramError;
use crate::store::AdaptationStore;

/// One onboarding day of the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDay {
    pub day: i64,
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub planner: Vec<PlannerItem>,
}

/// The full program as read from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDefinition {
    #[serde(default)]
    pub days: Vec<ProgramDay>,
}

impl ProgramDefinition {
    /// Parse and validate a program from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ProgramError> {
        let program: Self = serde_json::from_str(text)?;
        program.validate()?;
        Ok(program)
    }

    /// Read a program file.
    pub async fn load(path: &Path) -> Result<Self, ProgramError> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_json(&text)
    }

    /// Days start at 1 and appear once.
    pub fn validate(&self) -> Result<(), ProgramError> {
        let mut seen = HashSet::new();
        for entry in &self.days {
            if entry.day < 1 {
                return Err(ProgramError::InvalidDay { day: entry.day });
            }
            if !seen.insert(entry.day) {
                return Err(ProgramError::DuplicateDay { day: entry.day });
            }
        }
        Ok(())
    }

    /// Write every listed day into the store, replacing its previous content.
    pub async fn import(&self, store: &dyn AdaptationStore) -> Result<(), ProgramError> {
        self.validate()?;
        for entry in &self.days {
            store.put_main_tasks(entry.day, &entry.tasks).await?;
            store.put_day_tasks(entry.day, &entry.planner).await?;
        }
        info!(days = self.days.len(), "Program imported");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::adaptation::model::UserDayState;
    use crate::adaptation::tracker::render;
    use crate::store::MemoryStore;

    const SAMPLE: &str = r#"{
        "days": [
            {
                "day": 1,
                "tasks": ["Meet the team", "Read the handbook"],
                "planner": [
                    {"time_slot": "09:00", "description": "Welcome", "contact": "HR"},
                    {"time": "11:00", "task": "Laptop setup"}
                ]
            },
            {"day": 2, "tasks": ["Shadow a colleague"]}
        ]
    }"#;

    #[test]
    fn parses_both_field_spellings() {
        let program = ProgramDefinition::from_json(SAMPLE).unwrap();
        assert_eq!(program.days.len(), 2);

        let day1 = &program.days[0];
        assert_eq!(day1.planner[0].time_slot, "09:00");
        assert_eq!(day1.planner[0].contact.as_deref(), Some("HR"));
        assert_eq!(day1.planner[1].description, "Laptop setup");
        assert_eq!(day1.planner[1].contact, None);

        assert!(program.days[1].planner.is_empty());
    }

    #[test]
    fn blank_contact_renders_without_contact() {
        let program = ProgramDefinition::from_json(
            r#"{"days": [{"day": 1, "planner": [{"time": "9", "task": "x", "contact": ""}]}]}"#,
        )
        .unwrap();
        let items = &program.days[0].planner;
        assert_eq!(items[0].contact, None);

        let view = render(1, items, &UserDayState::default());
        assert_eq!(view.entries[0].contact, None);
    }

    #[test]
    fn rejects_day_zero() {
        let err = ProgramDefinition::from_json(r#"{"days": [{"day": 0}]}"#).unwrap_err();
        assert!(matches!(err, ProgramError::InvalidDay { day: 0 }));
    }

    #[test]
    fn rejects_duplicate_day() {
        let err =
            ProgramDefinition::from_json(r#"{"days": [{"day": 3}, {"day": 3}]}"#).unwrap_err();
        assert!(matches!(err, ProgramError::DuplicateDay { day: 3 }));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ProgramDefinition::from_json("{\"days\": [").unwrap_err();
        assert!(matches!(err, ProgramError::Parse(_)));
    }

    #[tokio::test]
    async fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let program = ProgramDefinition::load(file.path()).await.unwrap();
        assert_eq!(program.days[0].tasks.len(), 2);
    }

    #[tokio::test]
    async fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProgramDefinition::load(&dir.path().join("absent.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgramError::Io(_)));
    }

    #[tokio::test]
    async fn import_populates_store() {
        let store = MemoryStore::new();
        let program = ProgramDefinition::from_json(SAMPLE).unwrap();
        program.import(&store).await.unwrap();

        assert_eq!(
            store.get_main_tasks(1).await.unwrap(),
            vec!["Meet the team".to_string(), "Read the handbook".to_string()]
        );
        assert_eq!(store.get_day_tasks(1).await.unwrap().len(), 2);
        assert_eq!(store.get_main_tasks(2).await.unwrap().len(), 1);
        assert!(store.get_day_tasks(2).await.unwrap().is_empty());
        assert!(store.get_main_tasks(3).await.unwrap().is_empty());
    }
}
