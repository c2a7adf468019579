//! Remote backend API.
//!
//! Gateways and the queue processor only depend on [`RemoteApi`]; the
//! concrete transport lives in [`http`].

mod http;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::models::{Collection, Record, RecordId, SortSpec};

pub use http::HttpRemoteApi;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {message} ({status})")]
    Api { status: u16, message: String },
    #[error("Remote record not found")]
    NotFound,
    #[error("Remote record already exists")]
    Conflict,
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Remote API unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Entity CRUD surface of the remote backend.
///
/// Every call may fail; callers decide whether a failure falls back to the
/// local store or the sync queue.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn list(&self, collection: Collection, sort: &SortSpec) -> RemoteResult<Vec<Record>>;

    async fn get(&self, collection: Collection, id: &RecordId) -> RemoteResult<Record>;

    /// Create a record. The payload carries the client-chosen `id`.
    async fn create(&self, collection: Collection, payload: &Value) -> RemoteResult<Record>;

    async fn update(
        &self,
        collection: Collection,
        id: &RecordId,
        partial: &Value,
    ) -> RemoteResult<Record>;

    async fn delete(&self, collection: Collection, id: &RecordId) -> RemoteResult<()>;
}

/// Remote API bound to a single collection
#[derive(Clone)]
pub struct EntityClient {
    collection: Collection,
    api: Arc<dyn RemoteApi>,
}

impl EntityClient {
    pub fn new(collection: Collection, api: Arc<dyn RemoteApi>) -> Self {
        Self { collection, api }
    }

    pub const fn collection(&self) -> Collection {
        self.collection
    }

    pub async fn list(&self, sort: &SortSpec) -> RemoteResult<Vec<Record>> {
        self.api.list(self.collection, sort).await
    }

    pub async fn get(&self, id: &RecordId) -> RemoteResult<Record> {
        self.api.get(self.collection, id).await
    }

    pub async fn create(&self, payload: &Value) -> RemoteResult<Record> {
        self.api.create(self.collection, payload).await
    }

    pub async fn update(&self, id: &RecordId, partial: &Value) -> RemoteResult<Record> {
        self.api.update(self.collection, id, partial).await
    }

    pub async fn delete(&self, id: &RecordId) -> RemoteResult<()> {
        self.api.delete(self.collection, id).await
    }
}

/// Stand-in used when no backend is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredRemote;

#[async_trait]
impl RemoteApi for UnconfiguredRemote {
    async fn list(&self, _collection: Collection, _sort: &SortSpec) -> RemoteResult<Vec<Record>> {
        Err(unconfigured())
    }

    async fn get(&self, _collection: Collection, _id: &RecordId) -> RemoteResult<Record> {
        Err(unconfigured())
    }

    async fn create(&self, _collection: Collection, _payload: &Value) -> RemoteResult<Record> {
        Err(unconfigured())
    }

    async fn update(
        &self,
        _collection: Collection,
        _id: &RecordId,
        _partial: &Value,
    ) -> RemoteResult<Record> {
        Err(unconfigured())
    }

    async fn delete(&self, _collection: Collection, _id: &RecordId) -> RemoteResult<()> {
        Err(unconfigured())
    }
}

fn unconfigured() -> RemoteError {
    RemoteError::Unavailable("no API base URL configured".to_string())
}

/// Bound a remote call; a hang becomes [`RemoteError::Timeout`].
pub async fn with_timeout<T>(
    limit: Duration,
    call: impl Future<Output = RemoteResult<T>>,
) -> RemoteResult<T> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(RemoteError::Timeout(limit)))
}
