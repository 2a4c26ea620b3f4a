use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use crate::error::{ClaudioError, Result};

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// One `hook_events` row ready to insert, with its lookups in chain order.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub timestamp: i64,
    pub session_id: String,
    pub tool_name: Option<String>,
    pub selected_path: String,
    pub fallback_level: i64,
    pub context: serde_json::Value,
    pub lookups: Vec<PathLookup>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathLookup {
    pub path: String,
    pub sequence: i64,
    pub found: bool,
}

/// A persisted `hook_events` row.
#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    pub id: i64,
    pub timestamp: i64,
    pub session_id: String,
    pub tool_name: Option<String>,
    pub selected_path: String,
    pub fallback_level: i64,
    pub context: serde_json::Value,
}

/// SQLite store for sound lookups, shared by the hook (writer) and the CLI
/// (reader). Concurrent hook invocations serialize on the WAL write lock.
pub struct SoundDb {
    conn: Connection,
    path: PathBuf,
}

impl SoundDb {
    /// Open (or create) the database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ClaudioError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(&path)
            .map_err(|e| ClaudioError::Storage(format!("failed to open SQLite database: {e}")))?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory database (tests and previews).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            ClaudioError::Storage(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// `<cache>/claudio/sounds.db`, if the platform has a cache directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join("claudio").join("sounds.db"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        // In-memory databases report "memory" here; that's fine.
        let _mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| ClaudioError::Storage(format!("failed to set WAL mode: {e}")))?;

        conn.execute_batch(
            "PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| ClaudioError::Storage(format!("failed to set pragmas: {e}")))?;

        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| ClaudioError::Storage(format!("failed to set busy timeout: {e}")))?;

        let db = Self { conn, path };
        db.migrate()?;
        Ok(db)
    }

    /// Current `user_version`.
    pub fn schema_version(&self) -> Result<i64> {
        self.conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| ClaudioError::Storage(format!("failed to read user_version: {e}")))
    }

    fn migrate(&self) -> Result<()> {
        match self.schema_version()? {
            0 => self.create_tables(),
            SCHEMA_VERSION => Ok(()),
            newer => Err(ClaudioError::Storage(format!(
                "database schema version {newer} is newer than supported version {SCHEMA_VERSION}"
            ))),
        }
    }

    fn create_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(&format!(
                "
                BEGIN;

                CREATE TABLE IF NOT EXISTS hook_events (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    timestamp INTEGER NOT NULL,
                    session_id TEXT NOT NULL,
                    tool_name TEXT,
                    selected_path TEXT NOT NULL,
                    fallback_level INTEGER NOT NULL CHECK (fallback_level > 0),
                    context JSON NOT NULL
                );

                CREATE TABLE IF NOT EXISTS path_lookups (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_id INTEGER NOT NULL REFERENCES hook_events(id) ON DELETE CASCADE,
                    path TEXT NOT NULL,
                    sequence INTEGER NOT NULL CHECK (sequence > 0),
                    found INTEGER NOT NULL CHECK (found IN (0, 1)),
                    UNIQUE(event_id, sequence),
                    UNIQUE(event_id, path)
                );

                CREATE INDEX IF NOT EXISTS idx_hook_events_timestamp ON hook_events(timestamp DESC);
                CREATE INDEX IF NOT EXISTS idx_hook_events_tool_name ON hook_events(tool_name);
                CREATE INDEX IF NOT EXISTS idx_hook_events_session_id ON hook_events(session_id);
                CREATE INDEX IF NOT EXISTS idx_path_lookups_event_id ON path_lookups(event_id);
                CREATE INDEX IF NOT EXISTS idx_path_lookups_missing ON path_lookups(path) WHERE found = 0;

                PRAGMA user_version = {SCHEMA_VERSION};

                COMMIT;
                "
            ))
            .map_err(|e| ClaudioError::Storage(format!("failed to create tables: {e}")))
    }

    /// Insert an event and all of its lookups in one transaction.
    pub fn insert_event(&mut self, event: &NewEvent) -> Result<i64> {
        let context = serde_json::to_string(&event.context)?;
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO hook_events
                (timestamp, session_id, tool_name, selected_path, fallback_level, context)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.timestamp,
                event.session_id,
                event.tool_name,
                event.selected_path,
                event.fallback_level,
                context,
            ],
        )?;
        let event_id = tx.last_insert_rowid();

        {
            let mut stmt = tx.prepare(
                "INSERT INTO path_lookups (event_id, path, sequence, found)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for lookup in &event.lookups {
                stmt.execute(params![event_id, lookup.path, lookup.sequence, lookup.found])?;
            }
        }

        tx.commit()?;
        Ok(event_id)
    }

    pub fn get_event(&self, id: i64) -> Result<Option<StoredEvent>> {
        self.conn
            .query_row(
                "SELECT id, timestamp, session_id, tool_name, selected_path, fallback_level, context
                 FROM hook_events WHERE id = ?1",
                [id],
                row_to_event,
            )
            .optional()
            .map_err(ClaudioError::from)
    }

    /// Most recent events first.
    pub fn recent_events(&self, limit: usize) -> Result<Vec<StoredEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, timestamp, session_id, tool_name, selected_path, fallback_level, context
             FROM hook_events ORDER BY timestamp DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], row_to_event)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ClaudioError::from)
    }

    /// Lookups for one event, ordered by sequence.
    pub fn lookups_for_event(&self, event_id: i64) -> Result<Vec<PathLookup>> {
        let mut stmt = self.conn.prepare(
            "SELECT path, sequence, found FROM path_lookups
             WHERE event_id = ?1 ORDER BY sequence",
        )?;
        let rows = stmt.query_map([event_id], |row| {
            Ok(PathLookup {
                path: row.get(0)?,
                sequence: row.get(1)?,
                found: row.get(2)?,
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ClaudioError::from)
    }

    pub fn event_count(&self) -> Result<i64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM hook_events", [], |row| row.get(0))
            .map_err(ClaudioError::from)
    }

    /// Delete events older than `before` (unix seconds). Lookups cascade.
    pub fn prune_before(&self, before: i64) -> Result<usize> {
        self.conn
            .execute("DELETE FROM hook_events WHERE timestamp < ?1", [before])
            .map_err(ClaudioError::from)
    }
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredEvent> {
    let raw: String = row.get(6)?;
    let context = serde_json::from_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(StoredEvent {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        session_id: row.get(2)?,
        tool_name: row.get(3)?,
        selected_path: row.get(4)?,
        fallback_level: row.get(5)?,
        context,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(lookups: &[(&str, bool)]) -> NewEvent {
        let lookups: Vec<PathLookup> = lookups
            .iter()
            .enumerate()
            .map(|(i, (path, found))| PathLookup {
                path: path.to_string(),
                sequence: i as i64 + 1,
                found: *found,
            })
            .collect();
        let winner = lookups.iter().find(|l| l.found).unwrap_or(&lookups[lookups.len() - 1]);
        NewEvent {
            timestamp: 1_700_000_000,
            session_id: "s1".into(),
            tool_name: Some("git".into()),
            selected_path: winner.path.clone(),
            fallback_level: winner.sequence,
            context: json!({"category": 0, "tool_name": "git"}),
            lookups,
        }
    }

    #[test]
    fn open_in_memory_creates_tables() {
        let db = SoundDb::open_in_memory().unwrap();
        let tables: Vec<String> = db
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert!(tables.contains(&"hook_events".to_string()));
        assert!(tables.contains(&"path_lookups".to_string()));
        assert_eq!(db.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn indexes_exist() {
        let db = SoundDb::open_in_memory().unwrap();
        let count: i64 = db
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn pragmas_applied() {
        let db = SoundDb::open_in_memory().unwrap();
        let fk: i64 = db.conn.query_row("PRAGMA foreign_keys", [], |r| r.get(0)).unwrap();
        let temp: i64 = db.conn.query_row("PRAGMA temp_store", [], |r| r.get(0)).unwrap();
        assert_eq!(fk, 1);
        assert_eq!(temp, 2);
    }

    #[test]
    fn insert_and_read_back() {
        let mut db = SoundDb::open_in_memory().unwrap();
        let id = db
            .insert_event(&event(&[
                ("loading/git-commit-start.wav", false),
                ("loading/git.wav", true),
                ("default.wav", true),
            ]))
            .unwrap();

        let stored = db.get_event(id).unwrap().unwrap();
        assert_eq!(stored.selected_path, "loading/git.wav");
        assert_eq!(stored.fallback_level, 2);
        assert_eq!(stored.context["tool_name"], "git");

        let lookups = db.lookups_for_event(id).unwrap();
        assert_eq!(
            lookups.iter().map(|l| l.sequence).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(!lookups[0].found);
        assert!(lookups[1].found);
    }

    #[test]
    fn duplicate_path_rolls_back_whole_event() {
        let mut db = SoundDb::open_in_memory().unwrap();
        let err = db
            .insert_event(&event(&[("default.wav", true), ("default.wav", true)]))
            .unwrap_err();
        assert!(matches!(err, ClaudioError::Storage(_)));
        assert_eq!(db.event_count().unwrap(), 0);
    }

    #[test]
    fn zero_fallback_level_rejected() {
        let mut db = SoundDb::open_in_memory().unwrap();
        let mut bad = event(&[("default.wav", true)]);
        bad.fallback_level = 0;
        assert!(db.insert_event(&bad).is_err());
    }

    #[test]
    fn lookups_cascade_on_delete() {
        let mut db = SoundDb::open_in_memory().unwrap();
        db.insert_event(&event(&[("default.wav", true)])).unwrap();
        assert_eq!(db.prune_before(i64::MAX).unwrap(), 1);
        let remaining: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM path_lookups", [], |r| r.get(0))
            .unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn orphan_lookup_rejected() {
        let db = SoundDb::open_in_memory().unwrap();
        let result = db.conn.execute(
            "INSERT INTO path_lookups (event_id, path, sequence, found) VALUES (99, 'x', 1, 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn open_file_based_db_and_reopen() {
        let dir = std::env::temp_dir().join(format!("claudio-db-{}", uuid::Uuid::now_v7()));
        let path = dir.join("nested").join("sounds.db");
        {
            let mut db = SoundDb::open(&path).unwrap();
            db.insert_event(&event(&[("default.wav", true)])).unwrap();
        }
        let db = SoundDb::open(&path).unwrap();
        assert_eq!(db.event_count().unwrap(), 1);
        assert_eq!(db.recent_events(10).unwrap().len(), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn newer_schema_version_refused() {
        let dir = std::env::temp_dir().join(format!("claudio-db-{}", uuid::Uuid::now_v7()));
        let path = dir.join("sounds.db");
        {
            let db = SoundDb::open(&path).unwrap();
            db.conn.execute_batch("PRAGMA user_version = 7;").unwrap();
        }
        let err = SoundDb::open(&path).err().unwrap();
        assert!(err.to_string().contains("newer"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn default_path_under_cache() {
        if let Some(path) = SoundDb::default_path() {
            assert!(path.ends_with("claudio/sounds.db"));
        }
    }
}
