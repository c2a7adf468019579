//! Record model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{SyncEvent, SyncStatus};
use crate::error::{Error, Result};

/// Entity-specific fields, opaque to the sync layer
pub type Fields = Map<String, Value>;

/// Keys owned by the sync layer; never taken from caller data
pub const RESERVED_FIELDS: [&str; 4] = ["id", "sync_status", "created_date", "updated_date"];

/// Identifier of a record within its collection
///
/// Client-side ids are UUID v7 (time-sortable), remote-issued ids are kept
/// verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Generate a new client-side id
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Parse a caller-supplied id, rejecting blank values
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidInput("record id cannot be empty".into()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Read an id out of a JSON value (remote APIs may use numeric ids)
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(text) => Self::parse(text).ok(),
            Value::Number(number) => Some(Self(number.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A single persisted entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within the collection
    pub id: RecordId,
    /// Confirmation state relative to the remote backend
    pub sync_status: SyncStatus,
    /// Creation timestamp (Unix ms)
    pub created_date: i64,
    /// Last update timestamp (Unix ms)
    pub updated_date: i64,
    /// Entity-specific fields (title, content, parent references, ...)
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Synthesize a local, not yet confirmed record from caller data.
    ///
    /// Keeps a caller-supplied `id` and timestamps when present; everything
    /// else is generated.
    pub fn new_local(data: Fields, now: i64) -> Self {
        let id = data
            .get("id")
            .and_then(RecordId::from_json)
            .unwrap_or_else(RecordId::generate);
        let created_date = data
            .get("created_date")
            .and_then(parse_timestamp)
            .unwrap_or(now);
        let updated_date = data
            .get("updated_date")
            .and_then(parse_timestamp)
            .unwrap_or(now)
            .max(created_date);

        Self {
            id,
            sync_status: SyncStatus::Pending,
            created_date,
            updated_date,
            fields: sanitize_fields(data),
        }
    }

    /// Parse a record returned by the remote backend; it is `synced` by definition.
    pub fn from_remote(value: Value, now: i64) -> Option<Self> {
        let Value::Object(data) = value else {
            return None;
        };
        let id = data.get("id").and_then(RecordId::from_json)?;
        let created_date = data
            .get("created_date")
            .and_then(parse_timestamp)
            .unwrap_or(now);
        let updated_date = data
            .get("updated_date")
            .and_then(parse_timestamp)
            .unwrap_or(created_date);

        Some(Self {
            id,
            sync_status: SyncStatus::Synced,
            created_date,
            updated_date,
            fields: sanitize_fields(data),
        })
    }

    /// Merge `changes` into the entity fields and stamp `updated_date`.
    ///
    /// `updated_date` never moves backwards, even if the clock does.
    pub fn apply_changes(&mut self, changes: &Fields, now: i64) {
        for (key, value) in changes {
            if !RESERVED_FIELDS.contains(&key.as_str()) {
                self.fields.insert(key.clone(), value.clone());
            }
        }
        self.updated_date = now.max(self.updated_date);
    }

    /// Move to the status implied by `event`
    pub fn transition(&mut self, event: SyncEvent) -> Result<()> {
        self.sync_status = self.sync_status.transition(event)?;
        Ok(())
    }

    #[must_use]
    pub fn with_status(mut self, status: SyncStatus) -> Self {
        self.sync_status = status;
        self
    }

    /// JSON body sent to the remote backend: the record without its local sync state
    pub fn remote_payload(&self) -> Value {
        let mut payload = Map::with_capacity(self.fields.len() + 3);
        payload.insert("id".into(), Value::String(self.id.to_string()));
        payload.insert("created_date".into(), Value::from(self.created_date));
        payload.insert("updated_date".into(), Value::from(self.updated_date));
        for (key, value) in &self.fields {
            payload.insert(key.clone(), value.clone());
        }
        Value::Object(payload)
    }

    /// Partial body for a remote update: entity fields plus `updated_date`.
    ///
    /// Never carries `created_date`, which the remote owns once a record exists.
    pub fn update_payload(&self) -> Value {
        let mut payload = self.fields.clone();
        payload.insert("updated_date".into(), Value::from(self.updated_date));
        Value::Object(payload)
    }

    /// Fill in what the remote knows and the local copy lacks: missing
    /// entity fields and the creation date. Local values win otherwise.
    pub fn overlay_onto(&mut self, remote: &Self) {
        for (key, value) in &remote.fields {
            self.fields
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        self.created_date = remote.created_date;
    }

    /// Look up a field by name, including the sync-layer fields
    pub fn field(&self, name: &str) -> Option<Value> {
        match name {
            "id" => Some(Value::String(self.id.to_string())),
            "sync_status" => Some(Value::String(self.sync_status.to_string())),
            "created_date" => Some(Value::from(self.created_date)),
            "updated_date" => Some(Value::from(self.updated_date)),
            other => self.fields.get(other).cloned(),
        }
    }
}

/// Drop keys owned by the sync layer from caller-supplied data
pub fn sanitize_fields(mut data: Fields) -> Fields {
    for key in RESERVED_FIELDS {
        data.remove(key);
    }
    data
}

/// Parse epoch milliseconds or an RFC 3339 / ISO-8601 string
#[allow(clippy::cast_possible_truncation)]
pub fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|millis| millis as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                chrono::DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|date_time| date_time.timestamp_millis())
                    .or_else(|| {
                        chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                            .ok()
                            .map(|naive| naive.and_utc().timestamp_millis())
                    })
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn record_id_generate_is_unique() {
        assert_ne!(RecordId::generate(), RecordId::generate());
    }

    #[test]
    fn record_id_rejects_blank() {
        assert!(RecordId::parse("  ").is_err());
        assert_eq!(RecordId::parse(" abc ").unwrap().as_str(), "abc");
    }

    #[test]
    fn new_local_generates_id_and_dates() {
        let record = Record::new_local(fields(json!({"title": "A"})), 1_000);
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert_eq!(record.created_date, 1_000);
        assert_eq!(record.updated_date, 1_000);
        assert_eq!(record.fields, fields(json!({"title": "A"})));
        assert!(Uuid::parse_str(record.id.as_str()).is_ok());
    }

    #[test]
    fn new_local_keeps_caller_id_and_strips_reserved_keys() {
        let record = Record::new_local(
            fields(json!({
                "id": "note-1",
                "sync_status": "synced",
                "created_date": "2024-01-02T03:04:05Z",
                "title": "A"
            })),
            9_999_999_999_999,
        );
        assert_eq!(record.id.as_str(), "note-1");
        assert_eq!(record.sync_status, SyncStatus::Pending);
        assert_eq!(record.created_date, 1_704_164_645_000);
        assert_eq!(record.updated_date, 9_999_999_999_999);
        assert_eq!(record.fields, fields(json!({"title": "A"})));
    }

    #[test]
    fn apply_changes_never_moves_updated_date_backwards() {
        let mut record = Record::new_local(fields(json!({"title": "A"})), 5_000);
        record.apply_changes(&fields(json!({"title": "B", "id": "evil"})), 4_000);
        assert_eq!(record.updated_date, 5_000);
        assert_eq!(record.fields.get("title"), Some(&json!("B")));
        assert_ne!(record.id.as_str(), "evil");
    }

    #[test]
    fn remote_payload_omits_sync_status() {
        let record = Record::new_local(fields(json!({"id": "n1", "title": "A"})), 10);
        assert_eq!(
            record.remote_payload(),
            json!({"id": "n1", "created_date": 10, "updated_date": 10, "title": "A"})
        );
    }

    #[test]
    fn update_payload_is_partial() {
        let record = Record::new_local(fields(json!({"id": "n1", "title": "A"})), 10);
        assert_eq!(
            record.update_payload(),
            json!({"updated_date": 10, "title": "A"})
        );
    }

    #[test]
    fn overlay_keeps_local_values_and_fills_gaps() {
        let mut local = Record::new_local(fields(json!({"id": "r1", "title": "B"})), 500);
        let remote = Record::from_remote(
            json!({"id": "r1", "title": "A", "body": "keep", "created_date": 10}),
            0,
        )
        .unwrap();

        local.overlay_onto(&remote);
        assert_eq!(local.fields, fields(json!({"title": "B", "body": "keep"})));
        assert_eq!(local.created_date, 10);
        assert_eq!(local.updated_date, 500);
        assert_eq!(local.sync_status, SyncStatus::Pending);
    }

    #[test]
    fn from_remote_accepts_numeric_ids_and_iso_dates() {
        let record = Record::from_remote(
            json!({
                "id": 42,
                "created_date": "2024-01-02T03:04:05.500",
                "title": "Remote"
            }),
            0,
        )
        .unwrap();
        assert_eq!(record.id.as_str(), "42");
        assert_eq!(record.sync_status, SyncStatus::Synced);
        assert_eq!(record.created_date, 1_704_164_645_500);
        assert_eq!(record.updated_date, record.created_date);
    }

    #[test]
    fn from_remote_requires_object_with_id() {
        assert!(Record::from_remote(json!(["nope"]), 0).is_none());
        assert!(Record::from_remote(json!({"title": "no id"}), 0).is_none());
    }

    #[test]
    fn serializes_flat() {
        let record = Record::new_local(fields(json!({"id": "n1", "title": "A"})), 10);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "id": "n1",
                "sync_status": "pending",
                "created_date": 10,
                "updated_date": 10,
                "title": "A"
            })
        );
    }
}
