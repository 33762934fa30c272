use crate::domain::models::{Stats, TimerState};
use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    connection.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// The single persisted record shared by every surface. Writers always write
/// the whole record; partial updates would clobber fields owned by another
/// mutation path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub timer_state: TimerState,
    pub current_tasks: Vec<String>,
    pub stats: Stats,
}

pub trait StateRepository: Send + Sync {
    fn load(&self) -> Result<Option<PersistedState>, InfraError>;
    fn save(&self, state: &PersistedState) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteStateRepository {
    db_path: PathBuf,
}

impl SqliteStateRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl StateRepository for SqliteStateRepository {
    fn load(&self) -> Result<Option<PersistedState>, InfraError> {
        let connection = self.connect()?;
        let row: Option<(String, String, String)> = connection
            .query_row(
                "SELECT timer_state, current_tasks, stats FROM app_state WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let Some((timer_raw, tasks_raw, stats_raw)) = row else {
            return Ok(None);
        };

        Ok(Some(PersistedState {
            timer_state: serde_json::from_str(&timer_raw)?,
            current_tasks: serde_json::from_str(&tasks_raw)?,
            stats: serde_json::from_str(&stats_raw)?,
        }))
    }

    fn save(&self, state: &PersistedState) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO app_state (id, timer_state, current_tasks, stats, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
               timer_state = excluded.timer_state,
               current_tasks = excluded.current_tasks,
               stats = excluded.stats,
               updated_at = excluded.updated_at",
            params![
                serde_json::to_string(&state.timer_state)?,
                serde_json::to_string(&state.current_tasks)?,
                serde_json::to_string(&state.stats)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    state: Mutex<Option<PersistedState>>,
}

impl StateRepository for InMemoryStateRepository {
    fn load(&self) -> Result<Option<PersistedState>, InfraError> {
        let state = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("state lock poisoned: {error}")))?;
        Ok(state.clone())
    }

    fn save(&self, state: &PersistedState) -> Result<(), InfraError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("state lock poisoned: {error}")))?;
        *guard = Some(state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_state() -> PersistedState {
        let mut stats = Stats::new(NaiveDate::from_ymd_opt(2026, 2, 16).expect("valid date"));
        stats.blocked_today = 3;
        PersistedState {
            timer_state: TimerState::default(),
            current_tasks: vec!["study calculus".to_string(), "write essay".to_string()],
            stats,
        }
    }

    #[test]
    fn sqlite_repository_roundtrips_full_record() {
        let dir = std::env::temp_dir().join(format!(
            "focusflow-state-repo-{}-{}",
            std::process::id(),
            line!()
        ));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        let db_path = dir.join("focusflow.sqlite");
        initialize_database(&db_path).expect("initialize database");

        let repository = SqliteStateRepository::new(&db_path);
        assert_eq!(repository.load().expect("load empty"), None);

        let state = sample_state();
        repository.save(&state).expect("save state");
        let loaded = repository.load().expect("load state");
        assert_eq!(loaded, Some(state.clone()));

        let mut updated = state;
        updated.stats.blocked_today = 4;
        repository.save(&updated).expect("save updated state");
        assert_eq!(repository.load().expect("reload"), Some(updated));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn in_memory_repository_roundtrips() {
        let repository = InMemoryStateRepository::default();
        assert_eq!(repository.load().expect("load empty"), None);
        let state = sample_state();
        repository.save(&state).expect("save state");
        assert_eq!(repository.load().expect("load"), Some(state));
    }
}
