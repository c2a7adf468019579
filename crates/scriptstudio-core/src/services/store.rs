//! Local record store shared by gateways and the queue processor.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, LibSqlQueueRepository, LibSqlRecordRepository, QueueRepository, RecordRepository,
};
use crate::models::{Collection, QueueEntry, QueueEntryDraft, Record, RecordId};
use crate::Result;

/// Thread-safe handle over the local database.
///
/// Every call takes the connection lock, so each operation is atomic with
/// respect to the others and a `put` never interleaves with another write.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open a durable store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tracing::debug!("Opening local store at {}", db_path.display());
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Location of the backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Fetch one record.
    pub async fn get(&self, collection: Collection, id: &RecordId) -> Result<Option<Record>> {
        let db = self.db.lock().await;
        LibSqlRecordRepository::new(db.connection())
            .get(collection, id)
            .await
    }

    /// All records of a collection in storage order; callers sort.
    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Record>> {
        let db = self.db.lock().await;
        LibSqlRecordRepository::new(db.connection())
            .list(collection)
            .await
    }

    /// Upsert a whole record by id.
    pub async fn put(&self, collection: Collection, record: Record) -> Result<Record> {
        let db = self.db.lock().await;
        LibSqlRecordRepository::new(db.connection())
            .put(collection, &record)
            .await?;
        Ok(record)
    }

    /// Upsert records one after another.
    pub async fn put_many(&self, collection: Collection, records: &[Record]) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlRecordRepository::new(db.connection());
        for record in records {
            repo.put(collection, record).await?;
        }
        Ok(())
    }

    /// Remove a record. Idempotent.
    pub async fn delete(&self, collection: Collection, id: &RecordId) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlRecordRepository::new(db.connection())
            .delete(collection, id)
            .await
    }

    /// Append a mutation to the global sync queue.
    pub async fn add_to_sync_queue(&self, draft: QueueEntryDraft) -> Result<QueueEntry> {
        let db = self.db.lock().await;
        let entry = LibSqlQueueRepository::new(db.connection())
            .push(&draft)
            .await?;
        tracing::debug!(
            seq = entry.seq,
            action = %entry.action,
            collection = %entry.collection,
            record_id = %entry.record_id,
            "Queued mutation"
        );
        Ok(entry)
    }

    /// Every queued mutation in replay order.
    pub async fn sync_queue(&self) -> Result<Vec<QueueEntry>> {
        let db = self.db.lock().await;
        LibSqlQueueRepository::new(db.connection()).list().await
    }

    /// Queued mutations for one record in replay order.
    pub async fn queued_for(&self, collection: Collection, id: &RecordId) -> Result<Vec<QueueEntry>> {
        let db = self.db.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .list_for(collection, id)
            .await
    }

    /// Persist retry bookkeeping for a queued mutation.
    pub async fn update_queue_entry(&self, entry: &QueueEntry) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .update(entry)
            .await
    }

    /// Drop one queued mutation.
    pub async fn remove_queue_entry(&self, seq: i64) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .remove(seq)
            .await
    }

    /// Drop every queued mutation for one record.
    pub async fn remove_queued_for(&self, collection: Collection, id: &RecordId) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .remove_for(collection, id)
            .await
    }

    /// Re-point queued mutations after the remote assigned a new id.
    pub async fn rekey_queued(
        &self,
        collection: Collection,
        from: &RecordId,
        to: &RecordId,
    ) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlQueueRepository::new(db.connection())
            .rekey(collection, from, to)
            .await
    }

    /// Number of queued mutations.
    pub async fn pending_count(&self) -> Result<u64> {
        let db = self.db.lock().await;
        LibSqlQueueRepository::new(db.connection()).count().await
    }
}
