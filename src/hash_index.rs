/*!
 * Hash Index: the second, independent witness of every mutation digest
 *
 * Keyed by (origin_table, record_id) with append-only versioning: a record
 * that mutates N times has N rows here, and "current" is the one with the
 * highest id. No foreign key ties this table to the event ledger; their
 * agreement is checked at verification time, not enforced at write time.
 */

use std::sync::Arc;

use rusqlite::{params, OptionalExtension, Transaction};
use serde::Serialize;
use tracing::debug;

use custodia_core_canonical::digest;

use crate::error::{CustodiaError, Result};
use crate::store::Store;

/// One stored digest version, as read back from the index.
#[derive(Debug, Clone, Serialize)]
pub struct HashRecord {
    pub id: i64,
    pub origin_table: String,
    pub record_id: i64,
    pub digest: String,
    pub timestamp: String,
}

/// Listing row with the digest truncated for display.
#[derive(Debug, Clone, Serialize)]
pub struct HashSummary {
    pub id: i64,
    pub origin_table: String,
    pub record_id: i64,
    pub short_digest: String,
    pub timestamp: String,
}

/// Append one hash row inside an open transaction.
pub(crate) fn insert_hash(
    tx: &Transaction,
    origin_table: &str,
    record_id: i64,
    record_digest: &str,
    timestamp: &str,
) -> Result<i64> {
    tx.execute(
        "INSERT INTO hash_records (origin_table, record_id, digest, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![origin_table, record_id, record_digest, timestamp],
    )?;
    Ok(tx.last_insert_rowid())
}

/// Append-only digest registry with a small query surface.
pub struct HashIndex {
    store: Arc<Store>,
}

impl HashIndex {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Append a digest version for a record. The digest must already have
    /// the 64-char lowercase hex shape; a malformed one writes nothing.
    pub fn record_hash(
        &self,
        origin_table: &str,
        record_id: i64,
        record_digest: &str,
    ) -> Result<i64> {
        if !digest::is_valid(record_digest) {
            return Err(CustodiaError::InvalidDigest(record_digest.to_string()));
        }
        let timestamp = crate::ledger::now_timestamp();
        let id = self
            .store
            .write(|tx| insert_hash(tx, origin_table, record_id, record_digest, &timestamp))?;
        debug!(
            hash_record_id = id,
            origin_table, record_id, "hash version appended"
        );
        Ok(id)
    }

    /// Most recent digest versions, newest first, optionally filtered by
    /// origin table.
    pub fn list_recent(
        &self,
        limit: usize,
        origin_table: Option<&str>,
    ) -> Result<Vec<HashSummary>> {
        self.store.read(|conn| {
            let collect = |row: &rusqlite::Row<'_>| -> rusqlite::Result<HashSummary> {
                let full: String = row.get(3)?;
                Ok(HashSummary {
                    id: row.get(0)?,
                    origin_table: row.get(1)?,
                    record_id: row.get(2)?,
                    short_digest: digest::short(&full, digest::SHORT_LEN).to_string(),
                    timestamp: row.get(4)?,
                })
            };
            let mut rows = Vec::new();
            match origin_table {
                Some(filter) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, origin_table, record_id, digest, timestamp
                         FROM hash_records WHERE origin_table = ?1
                         ORDER BY id DESC LIMIT ?2",
                    )?;
                    for row in stmt.query_map(params![filter, limit as i64], collect)? {
                        rows.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, origin_table, record_id, digest, timestamp
                         FROM hash_records ORDER BY id DESC LIMIT ?1",
                    )?;
                    for row in stmt.query_map(params![limit as i64], collect)? {
                        rows.push(row?);
                    }
                }
            }
            Ok(rows)
        })
    }

    /// Current digest for a record, i.e. the highest-id version. Absence
    /// is an ordinary outcome, not an error.
    pub fn latest_for(&self, origin_table: &str, record_id: i64) -> Result<Option<String>> {
        self.store.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT digest FROM hash_records
                     WHERE origin_table = ?1 AND record_id = ?2
                     ORDER BY id DESC LIMIT 1",
                    params![origin_table, record_id],
                    |row| row.get(0),
                )
                .optional()?)
        })
    }

    /// All stored versions for a record, oldest first.
    pub fn versions_of(&self, origin_table: &str, record_id: i64) -> Result<Vec<HashRecord>> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, origin_table, record_id, digest, timestamp
                 FROM hash_records
                 WHERE origin_table = ?1 AND record_id = ?2
                 ORDER BY id ASC",
            )?;
            let mut rows = Vec::new();
            for row in stmt.query_map(params![origin_table, record_id], |row| {
                Ok(HashRecord {
                    id: row.get(0)?,
                    origin_table: row.get(1)?,
                    record_id: row.get(2)?,
                    digest: row.get(3)?,
                    timestamp: row.get(4)?,
                })
            })? {
                rows.push(row?);
            }
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const D1: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const D2: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn index() -> HashIndex {
        HashIndex::new(Arc::new(Store::open_in_memory().unwrap()))
    }

    #[test]
    fn test_record_and_latest() {
        let index = index();
        index.record_hash("invoices", 1, D1).unwrap();
        assert_eq!(index.latest_for("invoices", 1).unwrap(), Some(D1.into()));
    }

    #[test]
    fn test_latest_is_highest_version() {
        let index = index();
        index.record_hash("invoices", 1, D1).unwrap();
        index.record_hash("invoices", 1, D2).unwrap();
        assert_eq!(index.latest_for("invoices", 1).unwrap(), Some(D2.into()));

        let versions = index.versions_of("invoices", 1).unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].digest, D1);
        assert_eq!(versions[1].digest, D2);
    }

    #[test]
    fn test_latest_for_absent_key_is_none() {
        assert_eq!(index().latest_for("invoices", 99).unwrap(), None);
    }

    #[test]
    fn test_malformed_digest_rejected_without_write() {
        let index = index();
        let err = index.record_hash("invoices", 1, "not-a-digest").unwrap_err();
        assert!(matches!(err, CustodiaError::InvalidDigest(_)));

        // Uppercase hex is malformed too
        let upper = D1.to_uppercase();
        assert!(index.record_hash("invoices", 1, &upper).is_err());

        assert_eq!(index.latest_for("invoices", 1).unwrap(), None);
    }

    #[test]
    fn test_list_recent_newest_first_with_filter() {
        let index = index();
        index.record_hash("invoices", 1, D1).unwrap();
        index.record_hash("clients", 2, D2).unwrap();
        index.record_hash("invoices", 3, D2).unwrap();

        let all = index.list_recent(10, None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].id > all[1].id);
        assert_eq!(all[0].short_digest.len(), 16);

        let invoices = index.list_recent(10, Some("invoices")).unwrap();
        assert_eq!(invoices.len(), 2);
        assert!(invoices.iter().all(|s| s.origin_table == "invoices"));
    }
}
