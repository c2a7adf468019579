//! Per-collection gateway deciding between the remote API, the local store,
//! and the sync queue.
//!
//! Reads try the remote first when online and fall back to the cache; writes
//! try the remote first and fall back to a pending local copy plus a queued
//! mutation. Remote unavailability never surfaces as an error here, only
//! storage failures and invalid input do.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::connectivity::ConnectivitySignal;
use crate::error::Result;
use crate::models::{
    sanitize_fields, Collection, Fields, QueueAction, QueueEntry, QueueEntryDraft, Record,
    RecordId, SortSpec, SyncEvent, SyncStatus,
};
use crate::remote::{with_timeout, EntityClient, RemoteApi, RemoteError, RemoteResult};
use crate::services::LocalStore;
use crate::util::now_millis;

const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning shared by gateways and the queue processor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Upper bound for a single remote call; a slower call counts as offline
    pub remote_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }
}

/// Result of [`EntityGateway::delete`]; deletes always report success
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub success: bool,
}

impl DeleteOutcome {
    const fn done() -> Self {
        Self { success: true }
    }
}

/// Online/offline façade for one collection
#[derive(Clone)]
pub struct EntityGateway {
    client: EntityClient,
    store: LocalStore,
    connectivity: ConnectivitySignal,
    config: GatewayConfig,
}

impl EntityGateway {
    pub fn new(
        collection: Collection,
        api: Arc<dyn RemoteApi>,
        store: LocalStore,
        connectivity: ConnectivitySignal,
        config: GatewayConfig,
    ) -> Self {
        Self {
            client: EntityClient::new(collection, api),
            store,
            connectivity,
            config,
        }
    }

    pub const fn collection(&self) -> Collection {
        self.client.collection()
    }

    /// List the collection, preferring the remote view.
    ///
    /// Records with unconfirmed local changes keep their local values laid
    /// over the remote copy, local tombstones stay hidden, and local
    /// creations the remote has not seen yet are included.
    pub async fn list(&self, sort: &SortSpec) -> Result<Vec<Record>> {
        let collection = self.collection();
        let Some(remote) = self.attempt_remote("list", self.client.list(sort)).await else {
            return self.list_local(sort).await;
        };

        let mut local: HashMap<RecordId, Record> = self
            .store
            .get_all(collection)
            .await?
            .into_iter()
            .map(|record| (record.id.clone(), record))
            .collect();

        let mut view = Vec::with_capacity(remote.len());
        let mut seen = HashSet::with_capacity(remote.len());
        for record in remote {
            seen.insert(record.id.clone());
            match local.remove(&record.id) {
                Some(mut existing) if !existing.sync_status.is_confirmed() => {
                    if !existing.sync_status.is_tombstone() {
                        existing.overlay_onto(&record);
                        view.push(existing);
                    }
                }
                _ => {
                    let cached = self
                        .store
                        .put(collection, record.with_status(SyncStatus::Synced))
                        .await?;
                    view.push(cached);
                }
            }
        }

        let unsynced = local.into_values().filter(|record| {
            !seen.contains(&record.id)
                && !record.sync_status.is_confirmed()
                && !record.sync_status.is_tombstone()
        });
        view.extend(unsynced);

        sort.sort(&mut view);
        tracing::debug!(%collection, count = view.len(), "Listed records from remote");
        Ok(view)
    }

    /// Local view of the collection: everything except tombstones.
    pub async fn list_local(&self, sort: &SortSpec) -> Result<Vec<Record>> {
        let mut records: Vec<Record> = self
            .store
            .get_all(self.collection())
            .await?
            .into_iter()
            .filter(|record| !record.sync_status.is_tombstone())
            .collect();
        sort.sort(&mut records);
        Ok(records)
    }

    /// Fetch one record, preferring the remote copy.
    ///
    /// An unconfirmed local copy wins over the remote one, with remote-only
    /// fields filled in; a local tombstone hides the record.
    pub async fn get(&self, id: &RecordId) -> Result<Option<Record>> {
        let collection = self.collection();
        let remote = self.attempt_remote("get", self.client.get(id)).await;
        let local = self.store.get(collection, id).await?;

        match (remote, local) {
            (Some(remote), None) => Ok(Some(self.cache_confirmed(remote).await?)),
            (Some(remote), Some(existing)) if existing.sync_status.is_confirmed() => {
                Ok(Some(self.cache_confirmed(remote).await?))
            }
            (_, Some(existing)) if existing.sync_status.is_tombstone() => Ok(None),
            (Some(remote), Some(mut existing)) => {
                existing.overlay_onto(&remote);
                Ok(Some(existing))
            }
            (None, local) => Ok(local),
        }
    }

    /// Create a record. Always returns a record; `sync_status` tells whether
    /// the remote confirmed it.
    pub async fn create(&self, data: Fields) -> Result<Record> {
        let local = Record::new_local(data, now_millis());
        let payload = local.remote_payload();
        self.write_through(QueueAction::Create, local, self.client.create(&payload))
            .await
    }

    /// Merge `data` into a record. Updating a tombstoned record is rejected.
    ///
    /// Without a cached copy the local record only holds the changed fields;
    /// the remote sees a partial update either way.
    pub async fn update(&self, id: &RecordId, data: Fields) -> Result<Record> {
        let now = now_millis();
        let changes = sanitize_fields(data);

        let mut record = match self.store.get(self.collection(), id).await? {
            Some(existing) => existing,
            None => Record {
                id: id.clone(),
                sync_status: SyncStatus::Pending,
                created_date: now,
                updated_date: now,
                fields: Fields::new(),
            },
        };
        record.transition(SyncEvent::LocalWrite)?;
        record.apply_changes(&changes, now);

        let partial = record_changes(changes, record.updated_date);

        self.write_through(QueueAction::Update, record, self.client.update(id, &partial))
            .await
    }

    /// Delete a record: tombstone locally, then confirm remotely or queue.
    ///
    /// A record whose create was never sent to the remote is dropped
    /// outright along with its queued mutations. Once a create has been
    /// sent, the remote may hold the record, so the delete queues behind it.
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        let id = RecordId::parse(id)?;
        let collection = self.collection();

        let queued = self.store.queued_for(collection, &id).await?;
        if queued.iter().any(QueueEntry::is_unsent_create) {
            let dropped = self.store.remove_queued_for(collection, &id).await?;
            self.store.delete(collection, &id).await?;
            tracing::debug!(%collection, %id, dropped, "Deleted never-synced record locally");
            return Ok(DeleteOutcome::done());
        }

        if let Some(mut record) = self.store.get(collection, &id).await? {
            record.transition(SyncEvent::LocalDelete)?;
            self.store.put(collection, record).await?;
        }

        if queued.is_empty() {
            let call = async {
                match self.client.delete(&id).await {
                    Err(RemoteError::NotFound) => Ok(()),
                    other => other,
                }
            };
            if self.attempt_remote("delete", call).await.is_some() {
                self.store.delete(collection, &id).await?;
                return Ok(DeleteOutcome::done());
            }
        }

        self.store
            .add_to_sync_queue(QueueEntryDraft::delete(collection, &id, now_millis()))
            .await?;
        Ok(DeleteOutcome::done())
    }

    /// Try-remote-else-queue policy shared by every write.
    ///
    /// A record that already has queued mutations goes straight to the queue
    /// so replay keeps per-record program order.
    async fn write_through(
        &self,
        action: QueueAction,
        local: Record,
        call: impl Future<Output = RemoteResult<Record>>,
    ) -> Result<Record> {
        let collection = self.collection();
        let has_backlog = !self.store.queued_for(collection, &local.id).await?.is_empty();

        let mut attempted = false;
        if !has_backlog {
            match self.try_remote(action.as_str(), call).await {
                Some(Ok(remote)) => {
                    if remote.id != local.id {
                        tracing::warn!(
                            %collection,
                            local_id = %local.id,
                            remote_id = %remote.id,
                            "Remote issued a different id; re-keying local record"
                        );
                        self.store.delete(collection, &local.id).await?;
                    }
                    return self.cache_confirmed(remote).await;
                }
                // A failed or timed-out call may still have been applied
                Some(Err(_)) => attempted = true,
                None => {}
            }
        }

        let record = self.store.put(collection, local).await?;
        self.store
            .add_to_sync_queue(
                QueueEntryDraft::write(action, collection, &record, now_millis())
                    .attempted(attempted),
            )
            .await?;
        Ok(record)
    }

    /// Run a remote call if online, bounded by the configured timeout.
    ///
    /// `None` means "treat as offline": no connectivity, a failure, or a timeout.
    async fn attempt_remote<T>(
        &self,
        operation: &str,
        call: impl Future<Output = RemoteResult<T>>,
    ) -> Option<T> {
        self.try_remote(operation, call).await.and_then(std::result::Result::ok)
    }

    /// Like [`Self::attempt_remote`], but tells a call that was never made
    /// (`None`) apart from one that failed.
    async fn try_remote<T>(
        &self,
        operation: &str,
        call: impl Future<Output = RemoteResult<T>>,
    ) -> Option<RemoteResult<T>> {
        let collection = self.collection();
        if !self.connectivity.is_online() {
            tracing::debug!(%collection, operation, "Offline; using local store");
            return None;
        }

        let result = with_timeout(self.config.remote_timeout, call).await;
        if let Err(error) = &result {
            tracing::warn!(%collection, operation, "Remote call failed, using local store: {error}");
        }
        Some(result)
    }

    async fn cache_confirmed(&self, remote: Record) -> Result<Record> {
        self.store
            .put(self.collection(), remote.with_status(SyncStatus::Synced))
            .await
    }
}

/// Partial update body: the sanitized changes stamped with `updated_date`
fn record_changes(mut changes: Fields, updated_date: i64) -> Value {
    changes.insert("updated_date".into(), Value::from(updated_date));
    Value::Object(changes)
}
