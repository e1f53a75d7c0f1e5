/*!
 * Durable storage handle for the two ledgers
 *
 * One explicit SQLite connection, constructed at bootstrap and passed by
 * dependency injection into every component. The schema is append-only:
 * both ledger tables carry triggers that abort UPDATE and DELETE, so a
 * "correction" can only ever appear as a new row.
 */

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, Transaction};

use crate::error::Result;

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        entity_type TEXT NOT NULL,
        entity_id INTEGER NOT NULL,
        action TEXT NOT NULL,
        previous_value TEXT,
        new_value TEXT NOT NULL,
        actor TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        digest TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS hash_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        origin_table TEXT NOT NULL,
        record_id INTEGER NOT NULL,
        digest TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_events_entity
    ON events(entity_type, entity_id);

    CREATE INDEX IF NOT EXISTS idx_hash_records_key
    ON hash_records(origin_table, record_id);

    CREATE TRIGGER IF NOT EXISTS events_append_only_update
    BEFORE UPDATE ON events
    BEGIN SELECT RAISE(ABORT, 'events are append-only'); END;

    CREATE TRIGGER IF NOT EXISTS events_append_only_delete
    BEFORE DELETE ON events
    BEGIN SELECT RAISE(ABORT, 'events are append-only'); END;

    CREATE TRIGGER IF NOT EXISTS hash_records_append_only_update
    BEFORE UPDATE ON hash_records
    BEGIN SELECT RAISE(ABORT, 'hash_records are append-only'); END;

    CREATE TRIGGER IF NOT EXISTS hash_records_append_only_delete
    BEFORE DELETE ON hash_records
    BEGIN SELECT RAISE(ABORT, 'hash_records are append-only'); END;
";

/// Explicit storage handle wrapping one SQLite connection.
///
/// Appends serialize on the connection lock; readers never observe a
/// half-written row because every write commits through a transaction.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open or create the ledger database at the given path.
    pub fn open(path: impl AsRef<Path>, busy_timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        Self::initialize(conn)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run a read-only closure against the connection.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }

    /// Run a closure inside a transaction; commit on Ok, roll back on Err.
    pub(crate) fn write<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_schema() {
        let store = Store::open_in_memory().unwrap();
        let count: i64 = store
            .read(|conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
                     AND name IN ('events', 'hash_records')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.sqlite");
        let _store = Store::open(&path, 1_000).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_rows_cannot_be_updated() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|tx| {
                tx.execute(
                    "INSERT INTO events (entity_type, entity_id, action, new_value, actor, timestamp, digest)
                     VALUES ('invoice', 1, 'CREATE', '{}', 'system', 't0', 'd0')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let result = store.write(|tx| {
            tx.execute("UPDATE events SET digest = 'tampered' WHERE id = 1", [])?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_rows_cannot_be_deleted() {
        let store = Store::open_in_memory().unwrap();
        store
            .write(|tx| {
                tx.execute(
                    "INSERT INTO hash_records (origin_table, record_id, digest, timestamp)
                     VALUES ('invoice', 1, 'd0', 't0')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();

        let result = store.write(|tx| {
            tx.execute("DELETE FROM hash_records WHERE id = 1", [])?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_write_rolls_back_on_error() {
        let store = Store::open_in_memory().unwrap();
        let result: Result<()> = store.write(|tx| {
            tx.execute(
                "INSERT INTO hash_records (origin_table, record_id, digest, timestamp)
                 VALUES ('invoice', 1, 'd0', 't0')",
                [],
            )?;
            Err(crate::error::CustodiaError::Config("boom".into()))
        });
        assert!(result.is_err());

        let count: i64 = store
            .read(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM hash_records", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 0);
    }
}
