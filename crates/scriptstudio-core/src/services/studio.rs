//! Wiring of store, remote, connectivity, gateways, and the queue processor.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use super::LocalStore;
use crate::config::SyncSettings;
use crate::connectivity::ConnectivitySignal;
use crate::gateway::{EntityGateway, GatewayConfig};
use crate::models::Collection;
use crate::remote::{HttpRemoteApi, RemoteApi, RemoteError, UnconfiguredRemote};
use crate::sync::{spawn_on_reconnect, RetryPolicy, SyncQueueProcessor, DEFAULT_SYNC_INTERVAL};

/// One application session: a store plus everything that syncs it.
#[derive(Clone)]
pub struct Studio {
    store: LocalStore,
    remote: Arc<dyn RemoteApi>,
    connectivity: ConnectivitySignal,
    gateway_config: GatewayConfig,
    processor: Arc<SyncQueueProcessor>,
    sync_interval: Option<Duration>,
}

impl Studio {
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteApi>,
        connectivity: ConnectivitySignal,
        gateway_config: GatewayConfig,
        retry: RetryPolicy,
    ) -> Self {
        let processor = Arc::new(SyncQueueProcessor::new(
            store.clone(),
            Arc::clone(&remote),
            connectivity.clone(),
            gateway_config,
            retry,
        ));
        Self {
            store,
            remote,
            connectivity,
            gateway_config,
            processor,
            sync_interval: Some(DEFAULT_SYNC_INTERVAL),
        }
    }

    /// Period of the background worker's timer; `None` replays only on reconnect.
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Option<Duration>) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Build a session from settings. Without an API base URL the remote is
    /// a stand-in that always fails, so every write is queued.
    pub fn from_settings(
        store: LocalStore,
        settings: &SyncSettings,
        connectivity: ConnectivitySignal,
    ) -> Result<Self, RemoteError> {
        let remote: Arc<dyn RemoteApi> = match &settings.api_base_url {
            Some(url) => Arc::new(HttpRemoteApi::new(url.clone(), settings.api_token.clone())?),
            None => Arc::new(UnconfiguredRemote),
        };
        Ok(Self::new(
            store,
            remote,
            connectivity,
            settings.gateway_config(),
            settings.retry_policy(),
        )
        .with_sync_interval(settings.sync_interval()))
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn connectivity(&self) -> &ConnectivitySignal {
        &self.connectivity
    }

    pub fn processor(&self) -> &Arc<SyncQueueProcessor> {
        &self.processor
    }

    pub const fn sync_interval(&self) -> Option<Duration> {
        self.sync_interval
    }

    /// Gateway bound to one collection.
    pub fn gateway(&self, collection: Collection) -> EntityGateway {
        EntityGateway::new(
            collection,
            Arc::clone(&self.remote),
            self.store.clone(),
            self.connectivity.clone(),
            self.gateway_config,
        )
    }

    /// Start the background replay worker on the session's sync interval.
    pub fn spawn_sync_worker(&self) -> JoinHandle<()> {
        spawn_on_reconnect(Arc::clone(&self.processor), self.sync_interval)
    }
}
