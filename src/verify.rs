/*!
 * Integrity Verifier: cross-checks the two ledgers and, when the caller
 * holds ground truth, recomputes digests from scratch
 *
 * A mismatch is a verdict, never an error. Absence on either side is a
 * verdict too (`NoData`), and is never reported as ok.
 */

use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

use custodia_core_canonical::{canonicalize, digest, payload_from, Payload};

use crate::error::Result;
use crate::ledger::Action;
use crate::store::Store;

/// Three-way verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Both witnesses present and byte-for-byte equal
    Ok,
    /// Both present, digests differ
    Mismatch,
    /// Either witness absent
    NoData,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Ok => "ok",
            Verdict::Mismatch => "mismatch",
            Verdict::NoData => "no_data",
        }
    }
}

/// Result of comparing the stored digests of the two ledgers.
#[derive(Debug, Clone, Serialize)]
pub struct CrossCheck {
    pub verdict: Verdict,
    pub digest_from_event: Option<String>,
    pub digest_from_index: Option<String>,
}

/// Result of recomputing a digest from caller-supplied ground truth.
///
/// `computed_digest` is absent only when no recording context exists to
/// recompute against (see [`Verifier::verify_record_latest`]).
#[derive(Debug, Clone, Serialize)]
pub struct RecordCheck {
    pub verdict: Verdict,
    pub computed_digest: Option<String>,
    pub stored_digest: Option<String>,
}

/// Compare the latest stored digests for one record on an open connection.
pub(crate) fn cross_check_on(
    conn: &Connection,
    origin_table: &str,
    record_id: i64,
) -> Result<CrossCheck> {
    let from_event: Option<String> = conn
        .query_row(
            "SELECT digest FROM events
             WHERE entity_type = ?1 AND entity_id = ?2
             ORDER BY id DESC LIMIT 1",
            params![origin_table, record_id],
            |row| row.get(0),
        )
        .optional()?;
    let from_index: Option<String> = conn
        .query_row(
            "SELECT digest FROM hash_records
             WHERE origin_table = ?1 AND record_id = ?2
             ORDER BY id DESC LIMIT 1",
            params![origin_table, record_id],
            |row| row.get(0),
        )
        .optional()?;

    let verdict = match (&from_event, &from_index) {
        (Some(a), Some(b)) if a == b => Verdict::Ok,
        (Some(_), Some(_)) => Verdict::Mismatch,
        _ => Verdict::NoData,
    };
    Ok(CrossCheck {
        verdict,
        digest_from_event: from_event,
        digest_from_index: from_index,
    })
}

/// Read-only verification over both ledgers.
pub struct Verifier {
    store: Arc<Store>,
}

impl Verifier {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Compare the latest stored digest of each ledger for one record.
    ///
    /// This detects divergence between the witnesses; it cannot detect
    /// both ledgers being tampered with consistently. For that, use
    /// [`Verifier::verify_record`] with ground truth.
    pub fn verify_cross(&self, origin_table: &str, record_id: i64) -> Result<CrossCheck> {
        self.store
            .read(|conn| cross_check_on(conn, origin_table, record_id))
    }

    /// Recompute the digest from the caller's current view of the record
    /// and compare it against the latest hash-index digest.
    ///
    /// This is the strong path: it catches a payload that was altered
    /// after recording, even if both stored digests still agree.
    pub fn verify_record(
        &self,
        origin_table: &str,
        record_id: i64,
        current_values: &Payload,
        action: &Action,
        actor: &str,
        timestamp: &str,
    ) -> Result<RecordCheck> {
        let payload = payload_from([
            ("action", Value::String(action.as_str().to_string())),
            ("actor", Value::String(actor.to_string())),
            ("entity_id", Value::from(record_id)),
            ("entity_type", Value::String(origin_table.to_string())),
            ("timestamp", Value::String(timestamp.to_string())),
            ("values", Value::Object(current_values.clone())),
        ]);
        let computed = digest::compute(&canonicalize(&payload)?);

        let stored: Option<String> = self.store.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT digest FROM hash_records
                     WHERE origin_table = ?1 AND record_id = ?2
                     ORDER BY id DESC LIMIT 1",
                    params![origin_table, record_id],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        let verdict = match &stored {
            Some(d) if *d == computed => Verdict::Ok,
            Some(_) => Verdict::Mismatch,
            None => Verdict::NoData,
        };
        Ok(RecordCheck {
            verdict,
            computed_digest: Some(computed),
            stored_digest: stored,
        })
    }

    /// Like [`Verifier::verify_record`], but pulls the action, actor and
    /// timestamp from the latest recorded event for the key, so callers
    /// holding only the current field values can invoke the strong path.
    ///
    /// `NoData` when no event exists to supply that context.
    pub fn verify_record_latest(
        &self,
        origin_table: &str,
        record_id: i64,
        current_values: &Payload,
    ) -> Result<RecordCheck> {
        let context = self.store.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT action, actor, timestamp FROM events
                     WHERE entity_type = ?1 AND entity_id = ?2
                     ORDER BY id DESC LIMIT 1",
                    params![origin_table, record_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?)
        })?;

        match context {
            Some((action, actor, timestamp)) => {
                let action = action.parse().unwrap_or(Action::Custom(action));
                self.verify_record(
                    origin_table,
                    record_id,
                    current_values,
                    &action,
                    &actor,
                    &timestamp,
                )
            }
            None => Ok(RecordCheck {
                verdict: Verdict::NoData,
                computed_digest: None,
                stored_digest: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash_index::HashIndex;
    use crate::ledger::{EventLedger, Mutation};
    use crate::recorder::MutationRecorder;
    use serde_json::json;

    fn setup() -> (Arc<Store>, Verifier) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let verifier = Verifier::new(store.clone());
        (store, verifier)
    }

    fn payload() -> Payload {
        payload_from([("uuid", json!("U1")), ("total", json!("100.00"))])
    }

    #[test]
    fn test_cross_ok_after_recorded_mutation() {
        let (store, verifier) = setup();
        MutationRecorder::new(store)
            .record(&Mutation::new("invoices", 1, Action::Create, payload()))
            .unwrap();

        let check = verifier.verify_cross("invoices", 1).unwrap();
        assert_eq!(check.verdict, Verdict::Ok);
        assert_eq!(check.digest_from_event, check.digest_from_index);
    }

    #[test]
    fn test_cross_no_data_when_either_side_absent() {
        let (store, verifier) = setup();

        // Nothing recorded at all
        let check = verifier.verify_cross("invoices", 9).unwrap();
        assert_eq!(check.verdict, Verdict::NoData);

        // Event only, no index entry
        EventLedger::new(store.clone())
            .record_event(&Mutation::new("invoices", 9, Action::Create, payload()))
            .unwrap();
        let check = verifier.verify_cross("invoices", 9).unwrap();
        assert_eq!(check.verdict, Verdict::NoData);
        assert!(check.digest_from_event.is_some());
        assert!(check.digest_from_index.is_none());

        // Index only, no event
        HashIndex::new(store)
            .record_hash("clients", 3, &"c".repeat(64))
            .unwrap();
        let check = verifier.verify_cross("clients", 3).unwrap();
        assert_eq!(check.verdict, Verdict::NoData);
    }

    #[test]
    fn test_cross_mismatch_on_diverged_latest_entries() {
        let (store, verifier) = setup();
        MutationRecorder::new(store.clone())
            .record(&Mutation::new("invoices", 1, Action::Create, payload()))
            .unwrap();

        // A later index version that no event backs
        HashIndex::new(store)
            .record_hash("invoices", 1, &"deadbeef".repeat(8))
            .unwrap();

        let check = verifier.verify_cross("invoices", 1).unwrap();
        assert_eq!(check.verdict, Verdict::Mismatch);
        assert_eq!(check.digest_from_index, Some("deadbeef".repeat(8)));
    }

    #[test]
    fn test_cross_compares_latest_versions_only() {
        let (store, verifier) = setup();
        let recorder = MutationRecorder::new(store);
        recorder
            .record(&Mutation::new("invoices", 1, Action::Create, payload()))
            .unwrap();
        recorder
            .record(&Mutation::new(
                "invoices",
                1,
                Action::Update,
                payload_from([("uuid", json!("U1")), ("total", json!("120.00"))]),
            ))
            .unwrap();

        // Older versions differ between themselves; only the latest pair counts
        let check = verifier.verify_cross("invoices", 1).unwrap();
        assert_eq!(check.verdict, Verdict::Ok);
    }

    #[test]
    fn test_verify_record_ok_with_ground_truth() {
        let (store, verifier) = setup();
        let ts = "2026-02-01T12:00:00.000000Z";
        let mutation = Mutation::new("invoices", 5, Action::Create, payload())
            .actor("ana")
            .timestamp(ts);
        MutationRecorder::new(store).record(&mutation).unwrap();

        let check = verifier
            .verify_record("invoices", 5, &payload(), &Action::Create, "ana", ts)
            .unwrap();
        assert_eq!(check.verdict, Verdict::Ok);
    }

    #[test]
    fn test_verify_record_detects_consistent_tampering() {
        let (store, verifier) = setup();
        let ts = "2026-02-01T12:00:00.000000Z";

        // Both ledgers agree on a digest of the original payload
        MutationRecorder::new(store)
            .record(
                &Mutation::new("invoices", 5, Action::Create, payload())
                    .actor("ana")
                    .timestamp(ts),
            )
            .unwrap();

        // The live row was altered afterwards; cross-check still passes,
        // but recomputation from ground truth does not.
        let tampered = payload_from([("uuid", json!("U1")), ("total", json!("999.00"))]);
        assert_eq!(
            verifier.verify_cross("invoices", 5).unwrap().verdict,
            Verdict::Ok
        );
        let check = verifier
            .verify_record("invoices", 5, &tampered, &Action::Create, "ana", ts)
            .unwrap();
        assert_eq!(check.verdict, Verdict::Mismatch);
        assert!(check.stored_digest.is_some());
    }

    #[test]
    fn test_verify_record_no_data_when_index_empty() {
        let (_store, verifier) = setup();
        let check = verifier
            .verify_record(
                "invoices",
                1,
                &payload(),
                &Action::Create,
                "ana",
                "2026-02-01T00:00:00Z",
            )
            .unwrap();
        assert_eq!(check.verdict, Verdict::NoData);
        assert_eq!(check.computed_digest.unwrap().len(), 64);
    }

    #[test]
    fn test_verify_record_latest_uses_stored_context() {
        let (store, verifier) = setup();
        MutationRecorder::new(store)
            .record(
                &Mutation::new("invoices", 6, Action::Create, payload())
                    .actor("ana")
                    .timestamp("2026-02-03T08:00:00.000000Z"),
            )
            .unwrap();

        // Caller supplies only current values; context comes from the
        // latest event row
        let check = verifier
            .verify_record_latest("invoices", 6, &payload())
            .unwrap();
        assert_eq!(check.verdict, Verdict::Ok);

        let tampered = payload_from([("uuid", json!("U1")), ("total", json!("1.00"))]);
        let check = verifier
            .verify_record_latest("invoices", 6, &tampered)
            .unwrap();
        assert_eq!(check.verdict, Verdict::Mismatch);
        assert!(check.computed_digest.is_some());
    }

    #[test]
    fn test_verify_record_latest_no_event_context() {
        let (_store, verifier) = setup();
        let check = verifier
            .verify_record_latest("invoices", 404, &payload())
            .unwrap();
        assert_eq!(check.verdict, Verdict::NoData);
        assert!(check.computed_digest.is_none());
        assert!(check.stored_digest.is_none());
    }
}
