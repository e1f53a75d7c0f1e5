/*!
 * Audit Orchestrator: full-corpus integrity scan
 *
 * Walks every distinct (origin_table, record_id) key the hash index knows
 * about, cross-checks each against the event ledger, and aggregates the
 * verdicts. One bad key degrades to no_data and the scan keeps going; a
 * full audit never aborts halfway because a single record is unreadable.
 *
 * Keys are fetched in bounded batches and every per-key check re-acquires
 * the connection lock, so appends from other threads interleave with a
 * running audit instead of blocking behind it.
 */

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::Result;
use crate::store::Store;
use crate::verify::{cross_check_on, Verdict};

/// Keys fetched per lock acquisition.
const KEY_BATCH: usize = 256;

/// Cooperative cancellation flag, checked between keys during a scan.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; the running audit stops at the next key.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// One diverged record, carried in the report for follow-up.
#[derive(Debug, Clone, Serialize)]
pub struct MismatchDetail {
    pub origin_table: String,
    pub record_id: i64,
    pub digest_from_event: Option<String>,
    pub digest_from_index: Option<String>,
}

/// Aggregate outcome of a full audit.
///
/// Counts always cover every key visited; only the mismatch detail list
/// is capped. A report with `cancelled` set covers the keys visited up to
/// the cancellation point.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub total_checked: u64,
    pub ok_count: u64,
    pub mismatch_count: u64,
    pub no_data_count: u64,
    pub mismatches: Vec<MismatchDetail>,
    pub cancelled: bool,
}

impl IntegrityReport {
    /// True when every checked key verified clean.
    pub fn is_clean(&self) -> bool {
        self.mismatch_count == 0 && self.no_data_count == 0
    }
}

/// Fetch the next batch of distinct keys after the given cursor.
///
/// Columns come back as raw storage values: a tampered row may hold a
/// non-integer record_id, and the scan must still be able to step past it.
fn fetch_key_batch(
    conn: &Connection,
    after: Option<&(SqlValue, SqlValue)>,
    limit: usize,
) -> Result<Vec<(SqlValue, SqlValue)>> {
    let collect = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(SqlValue, SqlValue)> {
        Ok((row.get(0)?, row.get(1)?))
    };
    let mut rows = Vec::new();
    match after {
        Some((table, id)) => {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT origin_table, record_id FROM hash_records
                 WHERE (origin_table, record_id) > (?1, ?2)
                 ORDER BY origin_table, record_id LIMIT ?3",
            )?;
            for row in stmt.query_map(params![table, id, limit as i64], collect)? {
                rows.push(row?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT origin_table, record_id FROM hash_records
                 ORDER BY origin_table, record_id LIMIT ?1",
            )?;
            for row in stmt.query_map(params![limit as i64], collect)? {
                rows.push(row?);
            }
        }
    }
    Ok(rows)
}

/// Runs full integrity scans over both ledgers.
pub struct Auditor {
    store: Arc<Store>,
    detail_limit: usize,
}

impl Auditor {
    pub fn new(store: Arc<Store>, detail_limit: usize) -> Self {
        Self {
            store,
            detail_limit,
        }
    }

    /// Cross-check every distinct key in the hash index.
    ///
    /// Keys stream through keyset pagination; the set is never
    /// materialized wholesale and the connection lock is released between
    /// checks. Each check is an indexed point lookup, so the scan is O(N)
    /// in the number of distinct keys.
    pub fn run_full_audit(&self, cancel: &CancelToken) -> Result<IntegrityReport> {
        let mut report = IntegrityReport {
            total_checked: 0,
            ok_count: 0,
            mismatch_count: 0,
            no_data_count: 0,
            mismatches: Vec::new(),
            cancelled: false,
        };
        let mut cursor: Option<(SqlValue, SqlValue)> = None;

        'scan: loop {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let batch = self
                .store
                .read(|conn| fetch_key_batch(conn, cursor.as_ref(), KEY_BATCH))?;
            let Some(last) = batch.last().cloned() else {
                break;
            };
            let exhausted = batch.len() < KEY_BATCH;

            for key in batch {
                if cancel.is_cancelled() {
                    report.cancelled = true;
                    break 'scan;
                }
                report.total_checked += 1;

                let (origin_table, record_id) = match key {
                    (SqlValue::Text(ref table), SqlValue::Integer(id)) => (table.clone(), id),
                    ref other => {
                        warn!(
                            key = ?other,
                            "malformed hash index key, counted as no_data"
                        );
                        report.no_data_count += 1;
                        continue;
                    }
                };

                match self
                    .store
                    .read(|conn| cross_check_on(conn, &origin_table, record_id))
                {
                    Ok(check) => match check.verdict {
                        Verdict::Ok => report.ok_count += 1,
                        Verdict::Mismatch => {
                            report.mismatch_count += 1;
                            if report.mismatches.len() < self.detail_limit {
                                report.mismatches.push(MismatchDetail {
                                    origin_table,
                                    record_id,
                                    digest_from_event: check.digest_from_event,
                                    digest_from_index: check.digest_from_index,
                                });
                            }
                        }
                        Verdict::NoData => report.no_data_count += 1,
                    },
                    Err(err) => {
                        warn!(
                            origin_table,
                            record_id,
                            error = %err,
                            "record unreadable during audit, counted as no_data"
                        );
                        report.no_data_count += 1;
                    }
                }
            }

            if exhausted {
                break;
            }
            cursor = Some(last);
        }

        info!(
            total = report.total_checked,
            ok = report.ok_count,
            mismatch = report.mismatch_count,
            no_data = report.no_data_count,
            cancelled = report.cancelled,
            "full audit finished"
        );
        Ok(report)
    }
}
