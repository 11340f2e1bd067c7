use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use rusqlite::{Connection, params};

use crate::model::MessageCategory;

/// Message ids already reported by earlier win-checks, kept in SQLite.
pub struct SeenMessages {
    conn: Mutex<Connection>,
}

impl SeenMessages {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS seen_messages (
                account TEXT NOT NULL,
                category TEXT NOT NULL,
                message_id TEXT NOT NULL,
                seen_at TEXT NOT NULL DEFAULT (datetime('now')),
                PRIMARY KEY (account, category, message_id)
            );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("seen-message store lock poisoned"))
    }

    pub fn contains(&self, account: &str, category: MessageCategory, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(
            "SELECT 1 FROM seen_messages
             WHERE account = ?1 AND category = ?2 AND message_id = ?3",
        )?;
        Ok(stmt.exists(params![account, category.as_str(), id])?)
    }

    /// Returns `true` if the id was not recorded before.
    pub fn mark(&self, account: &str, category: MessageCategory, id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO seen_messages (account, category, message_id)
             VALUES (?1, ?2, ?3)",
            params![account, category.as_str(), id],
        )?;
        Ok(inserted > 0)
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM seen_messages", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_then_contains() {
        let seen = SeenMessages::in_memory().unwrap();
        assert!(!seen.contains("main", MessageCategory::Reply, "42").unwrap());
        assert!(seen.mark("main", MessageCategory::Reply, "42").unwrap());
        assert!(seen.contains("main", MessageCategory::Reply, "42").unwrap());
    }

    #[test]
    fn marking_twice_is_noop() {
        let seen = SeenMessages::in_memory().unwrap();
        assert!(seen.mark("main", MessageCategory::Direct, "1:7").unwrap());
        assert!(!seen.mark("main", MessageCategory::Direct, "1:7").unwrap());
        assert_eq!(seen.len().unwrap(), 1);
    }

    #[test]
    fn ids_are_scoped_by_account_and_category() {
        let seen = SeenMessages::in_memory().unwrap();
        seen.mark("main", MessageCategory::Mention, "9").unwrap();
        assert!(!seen.contains("alt", MessageCategory::Mention, "9").unwrap());
        assert!(!seen.contains("main", MessageCategory::Reply, "9").unwrap());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("seen.db");
        {
            let seen = SeenMessages::open(&path).unwrap();
            seen.mark("main", MessageCategory::Reply, "5").unwrap();
        }
        let seen = SeenMessages::open(&path).unwrap();
        assert!(seen.contains("main", MessageCategory::Reply, "5").unwrap());
    }
}
