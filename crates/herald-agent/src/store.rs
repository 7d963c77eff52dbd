use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use herald_core::state::SCHEMA_VERSION;
use herald_core::{HeraldError, Result, WorkflowState};

/// Persistent home of the workflow state, backed by SQLite.
///
/// Holds a single row: the latest state serialized as JSON. Each save is one
/// transaction, so a reader sees either the old record or the new one.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open or create the state database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                HeraldError::Database(format!("Failed to create state directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| HeraldError::Database(format!("Failed to open state store: {}", e)))?;
        Self::init(conn, true)
    }

    /// An in-memory store, for tests and one-shot runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HeraldError::Database(format!("Failed to open state store: {}", e)))?;
        Self::init(conn, false)
    }

    fn init(conn: Connection, wal: bool) -> Result<Self> {
        if wal {
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
                .map_err(|e| HeraldError::Database(format!("Failed to set pragmas: {}", e)))?;
        }

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS workflow_state (
                 id INTEGER PRIMARY KEY CHECK (id = 1),
                 schema_version INTEGER NOT NULL,
                 revision INTEGER NOT NULL,
                 state_json TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
        )
        .map_err(|e| HeraldError::Database(format!("Failed to initialize state schema: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Load the persisted state, or `None` before the first save.
    pub fn load(&self) -> Result<Option<WorkflowState>> {
        let conn = self.lock()?;
        let row: Option<(u32, String)> = conn
            .query_row(
                "SELECT schema_version, state_json FROM workflow_state WHERE id = 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| HeraldError::Database(format!("Failed to load state: {}", e)))?;

        let Some((version, json)) = row else {
            return Ok(None);
        };
        if version > SCHEMA_VERSION {
            return Err(HeraldError::Database(format!(
                "State was written by a newer schema (v{}, supported v{})",
                version, SCHEMA_VERSION
            )));
        }

        let state: WorkflowState = serde_json::from_str(&json)?;
        Ok(Some(state))
    }

    /// Replace the persisted state.
    pub fn save(&self, state: &WorkflowState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let mut conn = self.lock()?;

        let tx = conn
            .transaction()
            .map_err(|e| HeraldError::Database(format!("Failed to begin transaction: {}", e)))?;
        tx.execute(
            "INSERT INTO workflow_state (id, schema_version, revision, state_json, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 schema_version = excluded.schema_version,
                 revision = excluded.revision,
                 state_json = excluded.state_json,
                 updated_at = excluded.updated_at",
            params![
                state.schema_version,
                state.revision as i64,
                json,
                Local::now().to_rfc3339(),
            ],
        )
        .map_err(|e| HeraldError::Database(format!("Failed to save state: {}", e)))?;
        tx.commit()
            .map_err(|e| HeraldError::Database(format!("Failed to commit state: {}", e)))?;

        debug!(revision = state.revision, "State saved");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| HeraldError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::types::{HumanFeedback, PostState, PostStatus};
    use herald_test_utils::{at, sample_article, sample_preferences};

    fn populated() -> WorkflowState {
        let mut state = WorkflowState::with_preferences(sample_preferences());
        state.content = Some(sample_article());
        state.status = PostStatus::posted("https://www.linkedin.com/feed/update/urn:li:share:1/", at(9, 1));
        state.human_feedback = Some(HumanFeedback::approve("ok"));
        state.current_time = Some(at(9, 0));
        state.revision = 7;
        state
    }

    #[test]
    fn test_empty_store_loads_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let store = StateStore::open_in_memory().unwrap();
        let state = populated();
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));
    }

    #[test]
    fn test_save_overwrites() {
        let store = StateStore::open_in_memory().unwrap();
        store.save(&populated()).unwrap();

        let mut next = populated();
        next.status = PostStatus::new(PostState::Pending);
        next.revision = 8;
        store.save(&next).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.revision, 8);
        assert!(loaded.status.is(PostState::Pending));
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");

        {
            let store = StateStore::open(&path).unwrap();
            store.save(&populated()).unwrap();
        }

        let store = StateStore::open(&path).unwrap();
        assert_eq!(store.load().unwrap(), Some(populated()));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let store = StateStore::open_in_memory().unwrap();
        let mut state = populated();
        state.schema_version = SCHEMA_VERSION + 1;
        store.save(&state).unwrap();

        assert!(matches!(store.load(), Err(HeraldError::Database(_))));
    }

    #[test]
    fn test_stored_preferences_without_topics_are_rejected() {
        let store = StateStore::open_in_memory().unwrap();
        store.save(&populated()).unwrap();

        let json = serde_json::to_string(&populated())
            .unwrap()
            .replace(r#""topics":["AI"]"#, r#""topics":[]"#);
        store
            .lock()
            .unwrap()
            .execute("UPDATE workflow_state SET state_json = ?1 WHERE id = 1", params![json])
            .unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, HeraldError::Json(_)));
        assert!(err.to_string().contains("at least one topic"));
    }
}
