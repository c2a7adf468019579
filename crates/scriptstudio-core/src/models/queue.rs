//! Sync queue entries (pending mutations)

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use super::{Collection, Record, RecordId};
use crate::error::Error;

/// Identifies one record across collections
pub type RecordKey = (Collection, RecordId);

/// Kind of mutation waiting to be replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueAction {
    Create,
    Update,
    Delete,
}

impl QueueAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for QueueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(Error::Database(format!("unknown queue action '{other}'"))),
        }
    }
}

/// A mutation about to be appended to the queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntryDraft {
    pub action: QueueAction,
    pub collection: Collection,
    pub record_id: RecordId,
    pub payload: Value,
    pub timestamp: i64,
    /// The remote was already called for this mutation and may have applied it
    pub attempted: bool,
}

impl QueueEntryDraft {
    /// Queue a create carrying the full record, or an update carrying
    /// only the entity fields and `updated_date`
    pub fn write(action: QueueAction, collection: Collection, record: &Record, now: i64) -> Self {
        let payload = match action {
            QueueAction::Update => record.update_payload(),
            QueueAction::Create | QueueAction::Delete => record.remote_payload(),
        };
        Self {
            action,
            collection,
            record_id: record.id.clone(),
            payload,
            timestamp: now,
            attempted: false,
        }
    }

    pub fn delete(collection: Collection, record_id: &RecordId, now: i64) -> Self {
        Self {
            action: QueueAction::Delete,
            collection,
            record_id: record_id.clone(),
            payload: json!({ "id": record_id }),
            timestamp: now,
            attempted: false,
        }
    }

    #[must_use]
    pub const fn attempted(mut self, attempted: bool) -> Self {
        self.attempted = attempted;
        self
    }
}

/// A persisted pending mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Position in the global queue; replay order
    pub seq: i64,
    pub action: QueueAction,
    pub collection: Collection,
    pub record_id: RecordId,
    pub payload: Value,
    /// When the mutation was queued (Unix ms)
    pub timestamp: i64,
    /// Failed replay attempts so far
    pub attempts: u32,
    /// Earliest time of the next replay attempt (Unix ms)
    pub next_attempt_at: Option<i64>,
    pub last_error: Option<String>,
    /// Gave up after the retry cap; skipped until re-armed
    pub failed: bool,
    /// Sent to the remote at least once, so it may have been applied there
    pub attempted: bool,
}

impl QueueEntry {
    pub fn record_key(&self) -> RecordKey {
        (self.collection, self.record_id.clone())
    }

    /// Whether this entry may be replayed at `now`
    pub fn is_due(&self, now: i64) -> bool {
        !self.failed && self.next_attempt_at.is_none_or(|at| at <= now)
    }

    /// A create the remote has never been asked to apply
    pub const fn is_unsent_create(&self) -> bool {
        matches!(self.action, QueueAction::Create) && !self.attempted && !self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> QueueEntry {
        QueueEntry {
            seq: 1,
            action: QueueAction::Create,
            collection: Collection::Notes,
            record_id: RecordId::parse("n1").unwrap(),
            payload: json!({"id": "n1"}),
            timestamp: 0,
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
            failed: false,
            attempted: false,
        }
    }

    #[test]
    fn fresh_entry_is_due() {
        assert!(entry().is_due(0));
    }

    #[test]
    fn backoff_delays_entry() {
        let mut entry = entry();
        entry.next_attempt_at = Some(100);
        assert!(!entry.is_due(99));
        assert!(entry.is_due(100));
    }

    #[test]
    fn failed_entry_is_never_due() {
        let mut entry = entry();
        entry.failed = true;
        assert!(!entry.is_due(i64::MAX));
    }

    #[test]
    fn attempted_create_is_no_longer_unsent() {
        let mut entry = entry();
        assert!(entry.is_unsent_create());
        entry.attempted = true;
        assert!(!entry.is_unsent_create());
    }

    #[test]
    fn update_draft_omits_created_date() {
        let mut data = serde_json::Map::new();
        data.insert("title".into(), json!("B"));
        let record = Record::new_local(data, 50);
        let draft = QueueEntryDraft::write(QueueAction::Update, Collection::Notes, &record, 60);
        assert_eq!(draft.payload, json!({"title": "B", "updated_date": 50}));
        assert!(!draft.attempted);
    }

    #[test]
    fn delete_draft_carries_only_the_id() {
        let id = RecordId::parse("n9").unwrap();
        let draft = QueueEntryDraft::delete(Collection::Folders, &id, 5);
        assert_eq!(draft.payload, json!({"id": "n9"}));
        assert_eq!(draft.action, QueueAction::Delete);
    }
}
