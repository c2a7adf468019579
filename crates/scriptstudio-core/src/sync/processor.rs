//! Replays queued mutations against the remote backend.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::retry::{as_millis, RetryPolicy};
use crate::connectivity::ConnectivitySignal;
use crate::error::Result;
use crate::gateway::GatewayConfig;
use crate::models::{
    parse_timestamp, QueueAction, QueueEntry, QueueEntryDraft, Record, RecordId, RecordKey,
    SyncEvent,
};
use crate::remote::{with_timeout, EntityClient, RemoteApi, RemoteError, RemoteResult};
use crate::services::LocalStore;
use crate::util::{compact_text, now_millis};

/// Counters for one replay pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Entries confirmed by the remote and removed
    pub replayed: usize,
    /// Updates dropped because a later entry carries newer state
    pub superseded: usize,
    /// Entries whose replay failed this pass
    pub failed: usize,
    /// Entries left untouched (backing off, failed, or blocked behind one)
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    Completed(PassReport),
    /// Another pass holds the in-flight flag
    AlreadyRunning,
    Offline,
}

/// Drains the sync queue in FIFO order, one pass at a time.
pub struct SyncQueueProcessor {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    connectivity: ConnectivitySignal,
    config: GatewayConfig,
    retry: RetryPolicy,
    in_flight: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SyncQueueProcessor {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteApi>,
        connectivity: ConnectivitySignal,
        config: GatewayConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            remote,
            connectivity,
            config,
            retry,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn connectivity(&self) -> &ConnectivitySignal {
        &self.connectivity
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one replay pass over the whole queue.
    ///
    /// Remote failures are recorded on the entries; only storage failures
    /// are returned as errors.
    pub async fn run_pass(&self) -> Result<PassOutcome> {
        if !self.connectivity.is_online() {
            tracing::debug!("Skipping sync pass while offline");
            return Ok(PassOutcome::Offline);
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            tracing::debug!("Sync pass already running");
            return Ok(PassOutcome::AlreadyRunning);
        };

        let report = self.replay_queue().await?;
        if report != PassReport::default() {
            tracing::info!(
                replayed = report.replayed,
                superseded = report.superseded,
                failed = report.failed,
                skipped = report.skipped,
                "Sync pass finished"
            );
        }
        Ok(PassOutcome::Completed(report))
    }

    /// Re-arm entries that hit the retry cap. Returns how many were reset.
    pub async fn retry_failed(&self) -> Result<usize> {
        let mut rearmed = 0;
        for mut entry in self.store.sync_queue().await? {
            if !entry.failed {
                continue;
            }
            entry.failed = false;
            entry.attempts = 0;
            entry.next_attempt_at = None;
            self.store.update_queue_entry(&entry).await?;

            if let Some(mut record) = self.store.get(entry.collection, &entry.record_id).await? {
                if record.transition(SyncEvent::RetryRequested).is_ok() {
                    self.store.put(entry.collection, record).await?;
                }
            }
            rearmed += 1;
        }

        if rearmed > 0 {
            tracing::info!("Reset {rearmed} failed queue entries for retry");
        }
        Ok(rearmed)
    }

    async fn replay_queue(&self) -> Result<PassReport> {
        let entries = self.store.sync_queue().await?;
        let now = now_millis();
        let mut report = PassReport::default();
        let mut blocked: HashSet<RecordKey> = HashSet::new();
        let mut renamed: HashMap<RecordKey, RecordId> = HashMap::new();

        for (index, queued) in entries.iter().enumerate() {
            let key = queued.record_key();
            if blocked.contains(&key) {
                report.skipped += 1;
                continue;
            }
            if !queued.is_due(now) {
                blocked.insert(key);
                report.skipped += 1;
                continue;
            }
            if queued.action == QueueAction::Update && is_superseded(queued, &entries[index + 1..]) {
                self.store.remove_queue_entry(queued.seq).await?;
                tracing::debug!(seq = queued.seq, record_id = %queued.record_id, "Dropped superseded update");
                report.superseded += 1;
                continue;
            }
            if !self.connectivity.is_online() {
                tracing::debug!("Connectivity lost mid-pass; stopping");
                report.skipped += entries.len() - index;
                break;
            }

            let mut entry = queued.clone();
            if let Some(current) = renamed.get(&key) {
                entry.record_id = current.clone();
            }
            if !entry.attempted {
                entry.attempted = true;
                self.store.update_queue_entry(&entry).await?;
            }

            match self.replay(&entry).await? {
                Ok(confirmed_id) => {
                    if confirmed_id != entry.record_id {
                        renamed.insert(key, confirmed_id);
                    }
                    report.replayed += 1;
                }
                Err(error) => {
                    self.record_failure(entry, &error).await?;
                    blocked.insert(key);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Replay one entry. The outer result carries storage failures, the
    /// inner one the remote outcome along with the id the remote confirmed.
    async fn replay(&self, entry: &QueueEntry) -> Result<RemoteResult<RecordId>> {
        let client = EntityClient::new(entry.collection, Arc::clone(&self.remote));
        let id = &entry.record_id;

        if entry.action == QueueAction::Delete {
            let call = async {
                match client.delete(id).await {
                    Err(RemoteError::NotFound) => Ok(()),
                    other => other,
                }
            };
            if let Err(error) = self.bounded(call).await {
                return Ok(Err(error));
            }
            self.store.remove_queue_entry(entry.seq).await?;
            if self.store.queued_for(entry.collection, id).await?.is_empty() {
                self.store.delete(entry.collection, id).await?;
            }
            return Ok(Ok(id.clone()));
        }

        // Fresh local state when there is some; updates never carry `created_date`
        let (payload, changes) = match self.store.get(entry.collection, id).await? {
            Some(local) => (local.remote_payload(), local.update_payload()),
            None => (entry.payload.clone(), without_created_date(&entry.payload)),
        };

        let call = async {
            if entry.action == QueueAction::Create {
                match client.create(&payload).await {
                    Err(RemoteError::Conflict) => {
                        tracing::debug!(record_id = %id, "Create already applied remotely; replaying as update");
                        client.update(id, &changes).await
                    }
                    other => other,
                }
            } else {
                client.update(id, &changes).await
            }
        };
        let confirmed = match self.bounded(call).await {
            Ok(record) => record,
            Err(error) => return Ok(Err(error)),
        };

        self.store.remove_queue_entry(entry.seq).await?;
        let confirmed_id = self.confirm(entry, &changes, confirmed).await?;
        Ok(Ok(confirmed_id))
    }

    /// Mark the local record synced unless newer local changes exist.
    /// Returns the id the record now lives under.
    async fn confirm(
        &self,
        entry: &QueueEntry,
        replayed: &Value,
        confirmed: Record,
    ) -> Result<RecordId> {
        let collection = entry.collection;
        let mut id = entry.record_id.clone();

        if confirmed.id != id {
            tracing::warn!(
                %collection,
                local_id = %id,
                remote_id = %confirmed.id,
                "Remote issued a different id; re-keying local record"
            );
            self.store
                .rekey_queued(collection, &id, &confirmed.id)
                .await?;
            if let Some(local) = self.store.get(collection, &id).await? {
                self.store.delete(collection, &id).await?;
                self.store
                    .put(
                        collection,
                        Record {
                            id: confirmed.id.clone(),
                            ..local
                        },
                    )
                    .await?;
            }
            id = confirmed.id.clone();
        }

        let Some(mut local) = self.store.get(collection, &id).await? else {
            if entry.action == QueueAction::Create {
                tracing::warn!(%collection, record_id = %id, "Record deleted while its create was in flight; queueing remote delete");
                self.store
                    .add_to_sync_queue(QueueEntryDraft::delete(collection, &id, now_millis()))
                    .await?;
            }
            return Ok(id);
        };

        let replayed_at = replayed
            .get("updated_date")
            .and_then(parse_timestamp)
            .unwrap_or(i64::MIN);
        let has_backlog = !self.store.queued_for(collection, &id).await?.is_empty();
        if has_backlog || local.updated_date > replayed_at || local.sync_status.is_tombstone() {
            tracing::debug!(%collection, record_id = %id, "Newer local changes pending; leaving record unconfirmed");
            return Ok(id);
        }

        local.overlay_onto(&confirmed);
        local.transition(SyncEvent::RemoteConfirmed)?;
        self.store.put(collection, local).await?;
        Ok(id)
    }

    async fn record_failure(&self, mut entry: QueueEntry, error: &RemoteError) -> Result<()> {
        entry.attempts = entry.attempts.saturating_add(1);
        entry.last_error = Some(compact_text(&error.to_string()));

        if self.retry.is_exhausted(entry.attempts) {
            entry.failed = true;
            entry.next_attempt_at = None;
            tracing::warn!(
                seq = entry.seq,
                action = %entry.action,
                collection = %entry.collection,
                record_id = %entry.record_id,
                attempts = entry.attempts,
                "Giving up on queued mutation: {error}"
            );
            self.store.update_queue_entry(&entry).await?;

            if let Some(mut record) = self.store.get(entry.collection, &entry.record_id).await? {
                if record.transition(SyncEvent::RetriesExhausted).is_ok() {
                    self.store.put(entry.collection, record).await?;
                }
            }
            return Ok(());
        }

        let delay = self.retry.delay_for(entry.attempts);
        entry.next_attempt_at = Some(now_millis().saturating_add(as_millis(delay)));
        tracing::warn!(
            seq = entry.seq,
            record_id = %entry.record_id,
            attempts = entry.attempts,
            "Replay failed, retrying in {delay:?}: {error}"
        );
        self.store.update_queue_entry(&entry).await
    }

    async fn bounded<T>(&self, call: impl Future<Output = RemoteResult<T>>) -> RemoteResult<T> {
        with_timeout(self.config.remote_timeout, call).await
    }
}

fn without_created_date(payload: &Value) -> Value {
    let mut partial = payload.clone();
    if let Value::Object(fields) = &mut partial {
        fields.remove("created_date");
        fields.remove("id");
    }
    partial
}

/// An update is redundant when a later entry for the same record replays
/// newer state or deletes it.
fn is_superseded(entry: &QueueEntry, later: &[QueueEntry]) -> bool {
    later.iter().any(|other| {
        other.record_key() == entry.record_key()
            && matches!(other.action, QueueAction::Update | QueueAction::Delete)
    })
}
