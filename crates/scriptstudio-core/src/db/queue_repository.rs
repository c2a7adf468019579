//! Sync queue repository implementation

use crate::error::{Error, Result};
use crate::models::{Collection, QueueEntry, QueueEntryDraft, RecordId};
use libsql::{params, Connection, Row, Value};

const ENTRY_COLUMNS: &str = "seq, action, collection, record_id, payload, timestamp,
     attempts, next_attempt_at, last_error, failed, attempted";

/// Trait for sync queue storage operations (async)
#[allow(async_fn_in_trait)]
pub trait QueueRepository {
    /// Append a mutation to the end of the queue
    async fn push(&self, draft: &QueueEntryDraft) -> Result<QueueEntry>;

    /// All entries in replay (FIFO) order
    async fn list(&self) -> Result<Vec<QueueEntry>>;

    /// Entries for one record, in replay order
    async fn list_for(&self, collection: Collection, id: &RecordId) -> Result<Vec<QueueEntry>>;

    /// Persist retry bookkeeping for an entry
    async fn update(&self, entry: &QueueEntry) -> Result<()>;

    /// Remove one entry
    async fn remove(&self, seq: i64) -> Result<()>;

    /// Remove every entry for one record, returning how many were dropped
    async fn remove_for(&self, collection: Collection, id: &RecordId) -> Result<u64>;

    /// Point every entry for `from` at `to`, returning how many moved
    async fn rekey(&self, collection: Collection, from: &RecordId, to: &RecordId) -> Result<u64>;

    /// Number of queued entries
    async fn count(&self) -> Result<u64>;
}

/// libSQL implementation of `QueueRepository`
pub struct LibSqlQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a queue entry from a database row
    fn parse_entry(row: &Row) -> Result<QueueEntry> {
        let action: String = row.get(1)?;
        let collection: String = row.get(2)?;
        let record_id: String = row.get(3)?;
        let payload: String = row.get(4)?;
        let attempts: i64 = row.get(6)?;

        Ok(QueueEntry {
            seq: row.get(0)?,
            action: action.parse()?,
            collection: collection.parse()?,
            record_id: RecordId::parse(&record_id)?,
            payload: serde_json::from_str(&payload)?,
            timestamp: row.get(5)?,
            attempts: u32::try_from(attempts)
                .map_err(|_| Error::Database(format!("invalid attempt count {attempts}")))?,
            next_attempt_at: optional_integer(row, 7)?,
            last_error: optional_text(row, 8)?,
            failed: row.get::<i64>(9)? != 0,
            attempted: row.get::<i64>(10)? != 0,
        })
    }

    async fn query_entries(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<QueueEntry>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(Self::parse_entry(&row)?);
        }
        Ok(entries)
    }
}

fn optional_integer(row: &Row, idx: i32) -> Result<Option<i64>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Integer(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "expected integer in column {idx}, found {other:?}"
        ))),
    }
}

fn optional_text(row: &Row, idx: i32) -> Result<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(value) => Ok(Some(value)),
        other => Err(Error::Database(format!(
            "expected text in column {idx}, found {other:?}"
        ))),
    }
}

impl QueueRepository for LibSqlQueueRepository<'_> {
    async fn push(&self, draft: &QueueEntryDraft) -> Result<QueueEntry> {
        let payload = serde_json::to_string(&draft.payload)?;

        self.conn
            .execute(
                "INSERT INTO sync_queue (action, collection, record_id, payload, timestamp, attempted)
                 VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    draft.action.as_str(),
                    draft.collection.as_str(),
                    draft.record_id.as_str(),
                    payload,
                    draft.timestamp,
                    i64::from(draft.attempted)
                ],
            )
            .await?;

        Ok(QueueEntry {
            seq: self.conn.last_insert_rowid(),
            action: draft.action,
            collection: draft.collection,
            record_id: draft.record_id.clone(),
            payload: draft.payload.clone(),
            timestamp: draft.timestamp,
            attempts: 0,
            next_attempt_at: None,
            last_error: None,
            failed: false,
            attempted: draft.attempted,
        })
    }

    async fn list(&self) -> Result<Vec<QueueEntry>> {
        self.query_entries(
            &format!("SELECT {ENTRY_COLUMNS} FROM sync_queue ORDER BY seq"),
            (),
        )
        .await
    }

    async fn list_for(&self, collection: Collection, id: &RecordId) -> Result<Vec<QueueEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM sync_queue
                 WHERE collection = ? AND record_id = ?
                 ORDER BY seq"
            ),
            params![collection.as_str(), id.as_str()],
        )
        .await
    }

    async fn update(&self, entry: &QueueEntry) -> Result<()> {
        let next_attempt_at = entry.next_attempt_at.map_or(Value::Null, Value::Integer);
        let last_error = entry
            .last_error
            .clone()
            .map_or(Value::Null, Value::Text);

        self.conn
            .execute(
                "UPDATE sync_queue
                 SET attempts = ?, next_attempt_at = ?, last_error = ?, failed = ?, attempted = ?
                 WHERE seq = ?",
                params![
                    i64::from(entry.attempts),
                    next_attempt_at,
                    last_error,
                    i64::from(entry.failed),
                    i64::from(entry.attempted),
                    entry.seq
                ],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, seq: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_queue WHERE seq = ?", params![seq])
            .await?;
        Ok(())
    }

    async fn remove_for(&self, collection: Collection, id: &RecordId) -> Result<u64> {
        let removed = self
            .conn
            .execute(
                "DELETE FROM sync_queue WHERE collection = ? AND record_id = ?",
                params![collection.as_str(), id.as_str()],
            )
            .await?;
        Ok(removed)
    }

    async fn rekey(&self, collection: Collection, from: &RecordId, to: &RecordId) -> Result<u64> {
        let moved = self
            .conn
            .execute(
                "UPDATE sync_queue SET record_id = ? WHERE collection = ? AND record_id = ?",
                params![to.as_str(), collection.as_str(), from.as_str()],
            )
            .await?;
        Ok(moved)
    }

    async fn count(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_queue", ())
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{QueueAction, Record};
    use serde_json::{json, Value as JsonValue};

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn draft(action: QueueAction, id: &str) -> QueueEntryDraft {
        let JsonValue::Object(fields) = json!({"id": id, "title": "T"}) else {
            unreachable!()
        };
        let record = Record::new_local(fields, 1_000);
        QueueEntryDraft::write(action, Collection::Notes, &record, 1_000)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_preserves_fifo_order() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        let first = repo.push(&draft(QueueAction::Create, "a")).await.unwrap();
        let second = repo.push(&draft(QueueAction::Update, "b")).await.unwrap();
        let third = repo.push(&draft(QueueAction::Update, "a")).await.unwrap();
        assert!(first.seq < second.seq && second.seq < third.seq);

        let entries = repo.list().await.unwrap();
        let seqs: Vec<_> = entries.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, [first.seq, second.seq, third.seq]);
        assert_eq!(entries[0], first);
        assert_eq!(entries[0].payload["title"], json!("T"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_for_and_remove_for() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        repo.push(&draft(QueueAction::Create, "a")).await.unwrap();
        repo.push(&draft(QueueAction::Update, "b")).await.unwrap();
        repo.push(&draft(QueueAction::Update, "a")).await.unwrap();

        let id = RecordId::parse("a").unwrap();
        let for_a = repo.list_for(Collection::Notes, &id).await.unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].action, QueueAction::Create);

        let removed = repo.remove_for(Collection::Notes, &id).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_retry_bookkeeping() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        let mut entry = repo.push(&draft(QueueAction::Create, "a")).await.unwrap();
        entry.attempts = 3;
        entry.next_attempt_at = Some(42);
        entry.last_error = Some("HTTP 500".to_string());
        repo.update(&entry).await.unwrap();

        let stored = repo.list().await.unwrap().remove(0);
        assert_eq!(stored, entry);

        entry.failed = true;
        entry.next_attempt_at = None;
        repo.update(&entry).await.unwrap();
        let stored = repo.list().await.unwrap().remove(0);
        assert!(stored.failed);
        assert_eq!(stored.next_attempt_at, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_attempted_marker_round_trips() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        let pushed = repo
            .push(&draft(QueueAction::Create, "a").attempted(true))
            .await
            .unwrap();
        assert!(pushed.attempted);

        let mut fresh = repo.push(&draft(QueueAction::Create, "b")).await.unwrap();
        assert!(!repo.list().await.unwrap()[1].attempted);
        fresh.attempted = true;
        repo.update(&fresh).await.unwrap();

        let stored = repo.list().await.unwrap();
        assert!(stored.iter().all(|entry| entry.attempted));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rekey_moves_entries() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        repo.push(&draft(QueueAction::Update, "a")).await.unwrap();
        repo.push(&draft(QueueAction::Update, "b")).await.unwrap();

        let from = RecordId::parse("a").unwrap();
        let to = RecordId::parse("remote-a").unwrap();
        assert_eq!(repo.rekey(Collection::Notes, &from, &to).await.unwrap(), 1);
        assert!(repo.list_for(Collection::Notes, &from).await.unwrap().is_empty());
        assert_eq!(repo.list_for(Collection::Notes, &to).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_single_entry() {
        let db = setup().await;
        let repo = LibSqlQueueRepository::new(db.connection());

        let entry = repo.push(&draft(QueueAction::Create, "a")).await.unwrap();
        repo.remove(entry.seq).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
