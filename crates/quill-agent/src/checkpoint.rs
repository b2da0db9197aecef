use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use quill_core::error::{QuillError, Result};
use quill_core::types::ThreadId;

use crate::graph::NodeName;
use crate::state::WorkState;

/// Where a thread's execution stands between calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Node to run next, if any.
    pub next: Option<NodeName>,
    /// Set when execution stopped at an interrupt point.
    pub suspended: bool,
    /// Node whose completion produced this checkpoint.
    pub last_node: Option<NodeName>,
}

impl Cursor {
    pub fn finished(last_node: NodeName) -> Self {
        Self {
            next: None,
            suspended: false,
            last_node: Some(last_node),
        }
    }
}

/// A durable snapshot taken after every node.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    pub thread_id: ThreadId,
    /// Node executions so far on this thread.
    pub step: usize,
    pub state: WorkState,
    pub cursor: Cursor,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(thread_id: ThreadId, step: usize, state: WorkState, cursor: Cursor) -> Self {
        Self {
            thread_id,
            step,
            state,
            cursor,
            timestamp: Utc::now(),
        }
    }
}

/// Latest-snapshot storage keyed by thread.
pub trait Checkpointer: Send + Sync + 'static {
    /// Replace the thread's checkpoint.
    fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>>;

    /// Drop the thread's checkpoint. Returns whether one existed.
    fn delete(&self, thread_id: &ThreadId) -> Result<bool>;
}

/// Persistent checkpoint store backed by SQLite.
pub struct SqliteCheckpointer {
    conn: Mutex<Connection>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> QuillError + '_ {
    move |e| QuillError::Database(format!("{}: {}", context, e))
}

impl SqliteCheckpointer {
    /// Open or create the checkpoint database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(db_err("Failed to open checkpoint store"))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;

             CREATE TABLE IF NOT EXISTS checkpoints (
                 thread_id TEXT PRIMARY KEY,
                 step INTEGER NOT NULL,
                 state_json TEXT NOT NULL,
                 cursor_json TEXT NOT NULL,
                 timestamp TEXT NOT NULL
             );",
        )
        .map_err(db_err("Failed to initialize checkpoint schema"))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| QuillError::Database(e.to_string()))
    }
}

impl Checkpointer for SqliteCheckpointer {
    fn save(&self, cp: &Checkpoint) -> Result<()> {
        let state_json = serde_json::to_string(&cp.state)?;
        let cursor_json = serde_json::to_string(&cp.cursor)?;

        self.conn()?
            .execute(
                "INSERT INTO checkpoints (thread_id, step, state_json, cursor_json, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(thread_id) DO UPDATE SET
                     step = excluded.step,
                     state_json = excluded.state_json,
                     cursor_json = excluded.cursor_json,
                     timestamp = excluded.timestamp",
                params![
                    cp.thread_id.as_str(),
                    cp.step as i64,
                    state_json,
                    cursor_json,
                    cp.timestamp.to_rfc3339(),
                ],
            )
            .map_err(db_err("Failed to save checkpoint"))?;

        Ok(())
    }

    fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT step, state_json, cursor_json, timestamp
                 FROM checkpoints
                 WHERE thread_id = ?1",
                params![thread_id.as_str()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(db_err("Failed to load checkpoint"))?;

        let Some((step, state_json, cursor_json, ts)) = row else {
            return Ok(None);
        };

        Ok(Some(Checkpoint {
            thread_id: thread_id.clone(),
            step: step as usize,
            state: serde_json::from_str(&state_json)?,
            cursor: serde_json::from_str(&cursor_json)?,
            timestamp: DateTime::parse_from_rfc3339(&ts)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    fn delete(&self, thread_id: &ThreadId) -> Result<bool> {
        let deleted = self
            .conn()?
            .execute(
                "DELETE FROM checkpoints WHERE thread_id = ?1",
                params![thread_id.as_str()],
            )
            .map_err(db_err("Failed to delete checkpoint"))?;
        Ok(deleted > 0)
    }
}

/// Process-local checkpoints, lost on exit.
#[derive(Default)]
pub struct MemoryCheckpointer {
    threads: Mutex<HashMap<ThreadId, Checkpoint>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    fn threads(&self) -> Result<std::sync::MutexGuard<'_, HashMap<ThreadId, Checkpoint>>> {
        self.threads
            .lock()
            .map_err(|e| QuillError::Database(e.to_string()))
    }
}

impl Checkpointer for MemoryCheckpointer {
    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        self.threads()?
            .insert(checkpoint.thread_id.clone(), checkpoint.clone());
        Ok(())
    }

    fn load(&self, thread_id: &ThreadId) -> Result<Option<Checkpoint>> {
        Ok(self.threads()?.get(thread_id).cloned())
    }

    fn delete(&self, thread_id: &ThreadId) -> Result<bool> {
        Ok(self.threads()?.remove(thread_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::canvas::Resource;
    use quill_core::types::ChatMessage;

    fn sample(thread: &str, step: usize) -> Checkpoint {
        let mut state = WorkState::default();
        state.messages.push(ChatMessage::user("hello"));
        state.resources.push(Resource::new("https://a.dev", "A", ""));
        state.pending_deletions = vec!["https://a.dev".into()];
        Checkpoint::new(
            ThreadId::from_str(thread),
            step,
            state,
            Cursor {
                next: Some(NodeName::PerformDelete),
                suspended: true,
                last_node: Some(NodeName::Delete),
            },
        )
    }

    fn exercise(store: &dyn Checkpointer) {
        let thread = ThreadId::from_str("t1");
        assert!(store.load(&thread).unwrap().is_none());

        store.save(&sample("t1", 2)).unwrap();
        let loaded = store.load(&thread).unwrap().unwrap();
        assert_eq!(loaded.step, 2);
        assert_eq!(loaded.state.messages[0].text(), "hello");
        assert_eq!(loaded.state.pending_deletions, vec!["https://a.dev".to_string()]);
        assert!(loaded.cursor.suspended);
        assert_eq!(loaded.cursor.next, Some(NodeName::PerformDelete));

        let mut later = sample("t1", 3);
        later.cursor = Cursor::finished(NodeName::Chat);
        store.save(&later).unwrap();
        let loaded = store.load(&thread).unwrap().unwrap();
        assert_eq!(loaded.step, 3);
        assert!(!loaded.cursor.suspended);

        store.save(&sample("t2", 1)).unwrap();
        assert!(store.delete(&thread).unwrap());
        assert!(!store.delete(&thread).unwrap());
        assert!(store.load(&thread).unwrap().is_none());
        assert!(store.load(&ThreadId::from_str("t2")).unwrap().is_some());
    }

    #[test]
    fn sqlite_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteCheckpointer::open(&dir.path().join("nested/checkpoints.db")).unwrap();
        exercise(&store);
    }

    #[test]
    fn sqlite_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoints.db");
        SqliteCheckpointer::open(&path)
            .unwrap()
            .save(&sample("persist", 4))
            .unwrap();

        let reopened = SqliteCheckpointer::open(&path).unwrap();
        let loaded = reopened.load(&ThreadId::from_str("persist")).unwrap().unwrap();
        assert_eq!(loaded.step, 4);
        assert_eq!(loaded.state.resources.len(), 1);
    }

    #[test]
    fn memory_store_round_trip() {
        exercise(&MemoryCheckpointer::new());
    }
}
