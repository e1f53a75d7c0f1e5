/*!
 * Mutation Recorder: the single write path for domain repositories
 *
 * One call appends the event and its hash-index counterpart in a single
 * transaction. Either both ledgers gain a row or neither does, so a crash
 * can never leave one witness ahead of the other.
 */

use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::hash_index::insert_hash;
use crate::ledger::{digest_for, insert_event, now_timestamp, Mutation};
use crate::store::Store;

/// Outcome of an atomic dual append.
#[derive(Debug, Clone)]
pub struct RecordedMutation {
    pub event_id: i64,
    pub hash_record_id: i64,
    pub digest: String,
}

/// Narrow write interface combining the event ledger and the hash index.
pub struct MutationRecorder {
    store: Arc<Store>,
}

impl MutationRecorder {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Record one mutation in both ledgers atomically.
    ///
    /// The hash-index key is the mutation's entity type and id; the digest
    /// written to both rows is the same value, computed once over the
    /// canonical payload before any write begins.
    pub fn record(&self, mutation: &Mutation) -> Result<RecordedMutation> {
        let timestamp = mutation.timestamp.clone().unwrap_or_else(now_timestamp);
        let event_digest = digest_for(mutation, &timestamp)?;

        let (event_id, hash_record_id) = self.store.write(|tx| {
            let event_id = insert_event(tx, mutation, &timestamp, &event_digest)?;
            let hash_record_id = insert_hash(
                tx,
                &mutation.entity_type,
                mutation.entity_id,
                &event_digest,
                &timestamp,
            )?;
            Ok((event_id, hash_record_id))
        })?;

        info!(
            event_id,
            hash_record_id,
            entity_type = %mutation.entity_type,
            entity_id = mutation.entity_id,
            action = %mutation.action,
            actor = %mutation.actor,
            "mutation recorded"
        );
        Ok(RecordedMutation {
            event_id,
            hash_record_id,
            digest: event_digest,
        })
    }
}
