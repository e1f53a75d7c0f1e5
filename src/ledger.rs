/*!
 * Event Ledger: the append-only chronological record of mutations
 *
 * Every insert canonicalizes its payload and digests it before any row is
 * written. The digest covers the exact timestamp that gets persisted, so a
 * stored event can always be re-derived from its own columns.
 */

use std::str::FromStr;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension, Transaction};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use custodia_core_canonical::{canonical_string, canonicalize, digest, payload_from, Payload};

use crate::error::{CustodiaError, Result};
use crate::store::Store;

/// What happened to the entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    Delete,
    /// Domain-specific action label (uppercased by convention)
    Custom(String),
}

impl Serialize for Action {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl Action {
    pub fn as_str(&self) -> &str {
        match self {
            Action::Create => "CREATE",
            Action::Update => "UPDATE",
            Action::Delete => "DELETE",
            Action::Custom(label) => label,
        }
    }
}

impl FromStr for Action {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "CREATE" => Action::Create,
            "UPDATE" => Action::Update,
            "DELETE" => Action::Delete,
            other => Action::Custom(other.to_string()),
        })
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One mutation to be appended to the ledger.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub entity_type: String,
    pub entity_id: i64,
    pub action: Action,
    pub new_value: Payload,
    pub previous_value: Option<Payload>,
    pub actor: String,
    /// Explicit timestamp; current UTC time when unset
    pub timestamp: Option<String>,
}

impl Mutation {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: i64,
        action: Action,
        new_value: Payload,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
            action,
            new_value,
            previous_value: None,
            actor: "system".to_string(),
            timestamp: None,
        }
    }

    /// Set the acting user
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    /// Attach the pre-mutation snapshot
    pub fn previous_value(mut self, previous: Payload) -> Self {
        self.previous_value = Some(previous);
        self
    }

    /// Pin the timestamp instead of taking the current time
    pub fn timestamp(mut self, ts: impl Into<String>) -> Self {
        self.timestamp = Some(ts.into());
        self
    }
}

/// A fully stored event, as read back from the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub action: Action,
    pub previous_value: Option<Payload>,
    pub new_value: Payload,
    pub actor: String,
    pub timestamp: String,
    pub digest: String,
}

/// Listing row: everything a dashboard needs, digest truncated for display.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: i64,
    pub action: Action,
    pub actor: String,
    pub timestamp: String,
    pub short_digest: String,
}

/// Outcome of an append: the new row id and the digest written with it.
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    pub event_id: i64,
    pub digest: String,
}

/// Compute the digest a mutation will carry at the given timestamp.
///
/// The payload is a six-field map over the exact values persisted; key
/// order is irrelevant here since canonicalization sorts.
pub(crate) fn digest_for(mutation: &Mutation, timestamp: &str) -> Result<String> {
    let payload = payload_from([
        ("action", Value::String(mutation.action.as_str().to_string())),
        ("actor", Value::String(mutation.actor.clone())),
        ("entity_id", Value::from(mutation.entity_id)),
        ("entity_type", Value::String(mutation.entity_type.clone())),
        ("timestamp", Value::String(timestamp.to_string())),
        ("values", Value::Object(mutation.new_value.clone())),
    ]);
    let bytes = canonicalize(&payload)?;
    Ok(digest::compute(&bytes))
}

/// Current UTC time in RFC 3339 with microseconds.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Append one event row inside an open transaction.
pub(crate) fn insert_event(
    tx: &Transaction,
    mutation: &Mutation,
    timestamp: &str,
    event_digest: &str,
) -> Result<i64> {
    let previous = match &mutation.previous_value {
        Some(map) => Some(canonical_string(&Value::Object(map.clone()))?),
        None => None,
    };
    let new_value = canonical_string(&Value::Object(mutation.new_value.clone()))?;
    tx.execute(
        "INSERT INTO events
         (entity_type, entity_id, action, previous_value, new_value, actor, timestamp, digest)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            mutation.entity_type,
            mutation.entity_id,
            mutation.action.as_str(),
            previous,
            new_value,
            mutation.actor,
            timestamp,
            event_digest,
        ],
    )?;
    Ok(tx.last_insert_rowid())
}

fn parse_payload(text: &str) -> Result<Payload> {
    match serde_json::from_str::<Value>(text)? {
        Value::Object(map) => Ok(map),
        other => Err(CustodiaError::Decode(serde::de::Error::custom(format!(
            "expected object payload, got {}",
            other
        )))),
    }
}

type EventRow = (
    i64,
    String,
    i64,
    String,
    Option<String>,
    String,
    String,
    String,
    String,
);

fn event_from_row(row: EventRow) -> Result<Event> {
    let (id, entity_type, entity_id, action, previous, new_value, actor, timestamp, event_digest) =
        row;
    let previous_value = match previous {
        Some(text) => Some(parse_payload(&text)?),
        None => None,
    };
    Ok(Event {
        id,
        entity_type,
        entity_id,
        action: action.parse().unwrap_or(Action::Custom(action)),
        previous_value,
        new_value: parse_payload(&new_value)?,
        actor,
        timestamp,
        digest: event_digest,
    })
}

/// Append-only event log with a small query surface.
pub struct EventLedger {
    store: Arc<Store>,
}

impl EventLedger {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Append one event. Canonicalization and digest computation happen
    /// first; a failure there writes nothing.
    pub fn record_event(&self, mutation: &Mutation) -> Result<AppendOutcome> {
        let timestamp = mutation.timestamp.clone().unwrap_or_else(now_timestamp);
        let event_digest = digest_for(mutation, &timestamp)?;

        let event_id = self
            .store
            .write(|tx| insert_event(tx, mutation, &timestamp, &event_digest))?;

        debug!(
            event_id,
            entity_type = %mutation.entity_type,
            entity_id = mutation.entity_id,
            action = %mutation.action,
            "event appended"
        );
        Ok(AppendOutcome {
            event_id,
            digest: event_digest,
        })
    }

    /// Fetch one event by id.
    pub fn get(&self, event_id: i64) -> Result<Event> {
        let row = self.store.read(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, entity_type, entity_id, action, previous_value,
                            new_value, actor, timestamp, digest
                     FROM events WHERE id = ?1",
                    params![event_id],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                            row.get(7)?,
                            row.get(8)?,
                        ))
                    },
                )
                .optional()?)
        })?;
        match row {
            Some(row) => event_from_row(row),
            None => Err(CustodiaError::not_found("event", event_id)),
        }
    }

    /// Most recent events, newest first, optionally filtered by entity type.
    pub fn list_recent(
        &self,
        limit: usize,
        entity_type: Option<&str>,
    ) -> Result<Vec<EventSummary>> {
        self.store.read(|conn| {
            let mut rows = Vec::new();
            let collect = |row: &rusqlite::Row<'_>| -> rusqlite::Result<EventSummary> {
                let action: String = row.get(3)?;
                let full: String = row.get(6)?;
                Ok(EventSummary {
                    id: row.get(0)?,
                    entity_type: row.get(1)?,
                    entity_id: row.get(2)?,
                    action: action.parse().unwrap_or(Action::Custom(action)),
                    actor: row.get(4)?,
                    timestamp: row.get(5)?,
                    short_digest: digest::short(&full, digest::SHORT_LEN).to_string(),
                })
            };
            match entity_type {
                Some(filter) => {
                    let mut stmt = conn.prepare(
                        "SELECT id, entity_type, entity_id, action, actor, timestamp, digest
                         FROM events WHERE entity_type = ?1
                         ORDER BY id DESC LIMIT ?2",
                    )?;
                    for row in stmt.query_map(params![filter, limit as i64], collect)? {
                        rows.push(row?);
                    }
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT id, entity_type, entity_id, action, actor, timestamp, digest
                         FROM events ORDER BY id DESC LIMIT ?1",
                    )?;
                    for row in stmt.query_map(params![limit as i64], collect)? {
                        rows.push(row?);
                    }
                }
            }
            Ok(rows)
        })
    }

    /// Case-insensitive substring search over entity type, actor and action.
    pub fn search(&self, text: &str, limit: usize) -> Result<Vec<EventSummary>> {
        let pattern = format!("%{}%", text);
        self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, entity_type, entity_id, action, actor, timestamp, digest
                 FROM events
                 WHERE entity_type LIKE ?1 OR actor LIKE ?1 OR action LIKE ?1
                 ORDER BY id DESC LIMIT ?2",
            )?;
            let mut rows = Vec::new();
            for row in stmt.query_map(params![pattern, limit as i64], |row| {
                let action: String = row.get(3)?;
                let full: String = row.get(6)?;
                Ok(EventSummary {
                    id: row.get(0)?,
                    entity_type: row.get(1)?,
                    entity_id: row.get(2)?,
                    action: action.parse().unwrap_or(Action::Custom(action)),
                    actor: row.get(4)?,
                    timestamp: row.get(5)?,
                    short_digest: digest::short(&full, digest::SHORT_LEN).to_string(),
                })
            })? {
                rows.push(row?);
            }
            Ok(rows)
        })
    }

    /// Full line of custody for one entity, oldest first.
    pub fn history_of(&self, entity_type: &str, entity_id: i64) -> Result<Vec<Event>> {
        let raw: Vec<EventRow> = self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, entity_type, entity_id, action, previous_value,
                        new_value, actor, timestamp, digest
                 FROM events
                 WHERE entity_type = ?1 AND entity_id = ?2
                 ORDER BY id ASC",
            )?;
            let mut rows = Vec::new();
            for row in stmt.query_map(params![entity_type, entity_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                ))
            })? {
                rows.push(row?);
            }
            Ok(rows)
        })?;
        raw.into_iter().map(event_from_row).collect()
    }
}
