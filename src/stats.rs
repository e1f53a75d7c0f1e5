/*!
 * Aggregate statistics over both ledgers
 */

use std::sync::Arc;

use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::store::Store;

/// Number of top actors carried in the stats.
const TOP_ACTORS: usize = 10;

/// One grouped count, most frequent first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountByKey {
    pub key: String,
    pub count: u64,
}

/// Snapshot of ledger volume and composition.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub total_events: u64,
    pub total_hashes: u64,
    pub by_entity_type: Vec<CountByKey>,
    pub by_action: Vec<CountByKey>,
    pub top_actors: Vec<CountByKey>,
    pub by_origin_table: Vec<CountByKey>,
}

fn grouped(conn: &Connection, sql: &str) -> Result<Vec<CountByKey>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = Vec::new();
    for row in stmt.query_map([], |row| {
        Ok(CountByKey {
            key: row.get(0)?,
            count: row.get::<_, i64>(1)? as u64,
        })
    })? {
        rows.push(row?);
    }
    Ok(rows)
}

/// Read-only aggregation over both ledgers.
pub struct Statistics {
    store: Arc<Store>,
}

impl Statistics {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    pub fn stats(&self) -> Result<LedgerStats> {
        self.store.read(|conn| {
            let total_events: i64 =
                conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
            let total_hashes: i64 =
                conn.query_row("SELECT COUNT(*) FROM hash_records", [], |row| row.get(0))?;

            Ok(LedgerStats {
                total_events: total_events as u64,
                total_hashes: total_hashes as u64,
                by_entity_type: grouped(
                    conn,
                    "SELECT entity_type, COUNT(*) FROM events
                     GROUP BY entity_type ORDER BY COUNT(*) DESC, entity_type",
                )?,
                by_action: grouped(
                    conn,
                    "SELECT action, COUNT(*) FROM events
                     GROUP BY action ORDER BY COUNT(*) DESC, action",
                )?,
                top_actors: grouped(
                    conn,
                    &format!(
                        "SELECT actor, COUNT(*) FROM events
                         GROUP BY actor ORDER BY COUNT(*) DESC, actor LIMIT {}",
                        TOP_ACTORS
                    ),
                )?,
                by_origin_table: grouped(
                    conn,
                    "SELECT origin_table, COUNT(*) FROM hash_records
                     GROUP BY origin_table ORDER BY COUNT(*) DESC, origin_table",
                )?,
            })
        })
    }
}
