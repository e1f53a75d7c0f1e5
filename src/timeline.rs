/*!
 * History Reconstructor: line-of-custody views over the event ledger
 *
 * Builds an ascending timeline for one entity with a derived field diff
 * per step, and a full detail view for a single event.
 */

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use custodia_core_canonical::{digest, Payload};

use crate::error::Result;
use crate::ledger::{Action, Event, EventLedger};
use crate::store::Store;

/// Before/after pair for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub before: Value,
    pub after: Value,
}

/// One step in an entity's timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub event_id: i64,
    pub action: Action,
    pub actor: String,
    pub timestamp: String,
    pub short_digest: String,
    /// Fields that differ between the previous and new payloads
    pub changed: BTreeMap<String, FieldChange>,
}

/// Full structured view of one event, diff included.
#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub action: Action,
    pub actor: String,
    pub timestamp: String,
    pub digest: String,
    pub previous_value: Option<Payload>,
    pub new_value: Payload,
    pub changed: BTreeMap<String, FieldChange>,
}

/// Field-level diff between two payload snapshots.
///
/// A field absent on one side diffs against `null`, matching how absent
/// optionals are canonicalized.
fn diff_payloads(previous: Option<&Payload>, new: &Payload) -> BTreeMap<String, FieldChange> {
    let mut changed = BTreeMap::new();
    let empty = Payload::new();
    let previous = previous.unwrap_or(&empty);

    for (field, after) in new {
        let before = previous.get(field).cloned().unwrap_or(Value::Null);
        if before != *after {
            changed.insert(
                field.clone(),
                FieldChange {
                    before,
                    after: after.clone(),
                },
            );
        }
    }
    for (field, before) in previous {
        if !new.contains_key(field) {
            changed.insert(
                field.clone(),
                FieldChange {
                    before: before.clone(),
                    after: Value::Null,
                },
            );
        }
    }
    changed
}

fn entry_from(event: &Event) -> TimelineEntry {
    TimelineEntry {
        event_id: event.id,
        action: event.action.clone(),
        actor: event.actor.clone(),
        timestamp: event.timestamp.clone(),
        short_digest: digest::short(&event.digest, digest::SHORT_LEN).to_string(),
        changed: diff_payloads(event.previous_value.as_ref(), &event.new_value),
    }
}

/// Read-only reconstruction over the event ledger.
pub struct Timeline {
    ledger: EventLedger,
}

impl Timeline {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            ledger: EventLedger::new(store),
        }
    }

    /// Ascending timeline for one entity, oldest step first.
    pub fn timeline(&self, entity_type: &str, entity_id: i64) -> Result<Vec<TimelineEntry>> {
        let events = self.ledger.history_of(entity_type, entity_id)?;
        Ok(events.iter().map(entry_from).collect())
    }

    /// Full detail for one event, `NotFound` if absent.
    pub fn detail(&self, event_id: i64) -> Result<EventDetail> {
        let event = self.ledger.get(event_id)?;
        let changed = diff_payloads(event.previous_value.as_ref(), &event.new_value);
        Ok(EventDetail {
            id: event.id,
            entity_type: event.entity_type,
            entity_id: event.entity_id,
            action: event.action,
            actor: event.actor,
            timestamp: event.timestamp,
            digest: event.digest,
            previous_value: event.previous_value,
            new_value: event.new_value,
            changed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CustodiaError;
    use crate::ledger::Mutation;
    use custodia_core_canonical::payload_from;
    use serde_json::json;

    fn setup() -> (EventLedger, Timeline) {
        let store = Arc::new(Store::open_in_memory().unwrap());
        (EventLedger::new(store.clone()), Timeline::new(store))
    }

    #[test]
    fn test_timeline_ascending_with_diffs() {
        let (ledger, timeline) = setup();
        ledger
            .record_event(&Mutation::new(
                "invoice",
                1,
                Action::Create,
                payload_from([("total", json!("100.00")), ("status", json!("draft"))]),
            ))
            .unwrap();
        ledger
            .record_event(
                &Mutation::new(
                    "invoice",
                    1,
                    Action::Update,
                    payload_from([("total", json!("100.00")), ("status", json!("stamped"))]),
                )
                .previous_value(payload_from([
                    ("total", json!("100.00")),
                    ("status", json!("draft")),
                ])),
            )
            .unwrap();

        let entries = timeline.timeline("invoice", 1).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].event_id < entries[1].event_id);

        // Creation diffs against nothing: every field counts as changed
        assert_eq!(entries[0].changed.len(), 2);
        assert_eq!(entries[0].changed["total"].before, Value::Null);

        // Update diffs field by field
        assert_eq!(entries[1].changed.len(), 1);
        assert_eq!(entries[1].changed["status"].before, json!("draft"));
        assert_eq!(entries[1].changed["status"].after, json!("stamped"));
    }

    #[test]
    fn test_diff_reports_removed_fields() {
        let changed = diff_payloads(
            Some(&payload_from([("a", json!(1)), ("b", json!(2))])),
            &payload_from([("a", json!(1))]),
        );
        assert_eq!(changed.len(), 1);
        assert_eq!(changed["b"].before, json!(2));
        assert_eq!(changed["b"].after, Value::Null);
    }

    #[test]
    fn test_detail_carries_full_digest_and_payloads() {
        let (ledger, timeline) = setup();
        let outcome = ledger
            .record_event(
                &Mutation::new(
                    "invoice",
                    2,
                    Action::Update,
                    payload_from([("total", json!("50.00"))]),
                )
                .previous_value(payload_from([("total", json!("40.00"))]))
                .actor("ana"),
            )
            .unwrap();

        let detail = timeline.detail(outcome.event_id).unwrap();
        assert_eq!(detail.digest, outcome.digest);
        assert_eq!(detail.digest.len(), 64);
        assert_eq!(detail.actor, "ana");
        assert_eq!(
            detail.previous_value.as_ref().unwrap()["total"],
            json!("40.00")
        );
        assert_eq!(detail.changed["total"].after, json!("50.00"));
    }

    #[test]
    fn test_detail_missing_is_not_found() {
        let (_ledger, timeline) = setup();
        assert!(matches!(
            timeline.detail(123).unwrap_err(),
            CustodiaError::NotFound { .. }
        ));
    }

    #[test]
    fn test_timeline_for_unknown_entity_is_empty() {
        let (_ledger, timeline) = setup();
        assert!(timeline.timeline("ghost", 1).unwrap().is_empty());
    }
}
