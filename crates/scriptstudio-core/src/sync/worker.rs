//! Background task driving replay passes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use super::processor::SyncQueueProcessor;

/// Default period between passes while online
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a task that runs a pass whenever the processor's connectivity
/// signal flips to online, once at start when already online, and every
/// `interval` while online.
///
/// The task ends when the signal's sender is gone or the handle is aborted.
pub fn spawn_on_reconnect(
    processor: Arc<SyncQueueProcessor>,
    interval: Option<Duration>,
) -> JoinHandle<()> {
    let mut online = processor.connectivity().subscribe();
    let mut ticker = interval.map(|period| {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    });

    tokio::spawn(async move {
        tracing::debug!("Sync worker started (interval: {interval:?})");
        loop {
            let is_online = *online.borrow_and_update();
            if is_online {
                if let Err(error) = processor.run_pass().await {
                    tracing::warn!("Sync pass failed: {error}");
                }
            }

            tokio::select! {
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                () = tick(ticker.as_mut()) => {}
            }
        }
        tracing::debug!("Sync worker stopped");
    })
}

async fn tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivitySignal;
    use crate::gateway::{EntityGateway, GatewayConfig};
    use crate::models::Collection;
    use crate::services::LocalStore;
    use crate::sync::RetryPolicy;
    use crate::testing::{fields, ScriptedRemote};
    use serde_json::json;

    async fn wait_for_empty_queue(store: &LocalStore) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while store.pending_count().await.unwrap() > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reconnect_triggers_a_pass() {
        let remote = Arc::new(ScriptedRemote::default());
        let store = LocalStore::open_in_memory().await.unwrap();
        let connectivity = ConnectivitySignal::offline();
        let gateway = EntityGateway::new(
            Collection::Notes,
            remote.clone(),
            store.clone(),
            connectivity.clone(),
            GatewayConfig::default(),
        );
        let processor = Arc::new(SyncQueueProcessor::new(
            store.clone(),
            remote.clone(),
            connectivity.clone(),
            GatewayConfig::default(),
            RetryPolicy::default(),
        ));

        let worker = spawn_on_reconnect(processor, None);
        let record = gateway.create(fields(json!({"title": "A"}))).await.unwrap();
        assert_eq!(store.pending_count().await.unwrap(), 1);

        connectivity.set_online(true);
        wait_for_empty_queue(&store).await;
        assert!(remote.contains(Collection::Notes, &record.id));

        worker.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn interval_retries_while_online() {
        let remote = Arc::new(ScriptedRemote::default());
        let store = LocalStore::open_in_memory().await.unwrap();
        let connectivity = ConnectivitySignal::online();
        let gateway = EntityGateway::new(
            Collection::Folders,
            remote.clone(),
            store.clone(),
            connectivity.clone(),
            GatewayConfig::default(),
        );
        let processor = Arc::new(SyncQueueProcessor::new(
            store.clone(),
            remote.clone(),
            connectivity,
            GatewayConfig::default(),
            RetryPolicy {
                max_attempts: 100,
                backoff_base: Duration::ZERO,
                backoff_max: Duration::ZERO,
            },
        ));

        remote.set_failing(true);
        gateway.create(fields(json!({"name": "Drafts"}))).await.unwrap();
        let worker = spawn_on_reconnect(processor, Some(Duration::from_millis(50)));

        tokio::time::sleep(Duration::from_millis(120)).await;
        remote.set_failing(false);
        wait_for_empty_queue(&store).await;
        assert_eq!(remote.count_in(Collection::Folders), 1);

        worker.abort();
    }
}
