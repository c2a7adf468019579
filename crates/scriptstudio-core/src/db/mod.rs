//! Database layer for ScriptStudio

mod connection;
mod migrations;
mod queue_repository;
mod record_repository;

pub use connection::Database;
pub use queue_repository::{LibSqlQueueRepository, QueueRepository};
pub use record_repository::{LibSqlRecordRepository, RecordRepository};
