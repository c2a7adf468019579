//! scriptstudio-core - Core library for ScriptStudio
//!
//! This crate contains the record models, the local store, the remote API
//! client, and the offline-first sync machinery shared by every ScriptStudio
//! interface.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use connectivity::ConnectivitySignal;
pub use error::{Error, Result};
pub use gateway::{DeleteOutcome, EntityGateway, GatewayConfig};
pub use models::{Collection, Record, RecordId, SortSpec, SyncStatus};
pub use services::{LocalStore, Studio};
pub use sync::{PassOutcome, PassReport, RetryPolicy, SyncQueueProcessor};
