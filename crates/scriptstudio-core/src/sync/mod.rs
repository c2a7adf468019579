//! Sync queue replay: processor, retry policy, and the background worker.

mod processor;
mod retry;
mod worker;

pub use processor::{PassOutcome, PassReport, SyncQueueProcessor};
pub use retry::RetryPolicy;
pub use worker::{spawn_on_reconnect, DEFAULT_SYNC_INTERVAL};
