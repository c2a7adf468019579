//! Per-record sync state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Confirmation state of a record relative to the remote backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Locally modified, not yet confirmed upstream
    #[default]
    Pending,
    /// Matches the last known remote state
    Synced,
    /// Tombstoned locally, remote deletion not yet confirmed
    PendingDelete,
    /// Replay gave up after the retry cap; needs an explicit retry
    SyncFailed,
    /// A queued delete gave up after the retry cap; still a tombstone
    DeleteFailed,
}

/// Something that happened to a record and may change its status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    LocalWrite,
    LocalDelete,
    RemoteConfirmed,
    RetriesExhausted,
    /// A failed mutation was re-armed for another round of retries
    RetryRequested,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::PendingDelete => "pending_delete",
            Self::SyncFailed => "sync_failed",
            Self::DeleteFailed => "delete_failed",
        }
    }

    /// Apply `event`, returning the next status or an error for illegal moves.
    ///
    /// A tombstone accepts no further writes and is never "confirmed" in
    /// place: a confirmed delete removes the record instead. Exhausting the
    /// retries of a delete keeps the record a tombstone.
    pub fn transition(self, event: SyncEvent) -> Result<Self> {
        let next = match (self, event) {
            (
                Self::PendingDelete | Self::DeleteFailed,
                SyncEvent::LocalWrite | SyncEvent::RemoteConfirmed,
            )
            | (Self::Synced, SyncEvent::RetriesExhausted) => None,
            (Self::PendingDelete | Self::DeleteFailed, SyncEvent::RetriesExhausted) => {
                Some(Self::DeleteFailed)
            }
            (Self::SyncFailed, SyncEvent::RetryRequested) => Some(Self::Pending),
            (Self::DeleteFailed, SyncEvent::RetryRequested) => Some(Self::PendingDelete),
            (_, SyncEvent::RetryRequested) => None,
            (_, SyncEvent::LocalWrite) => Some(Self::Pending),
            (_, SyncEvent::LocalDelete) => Some(Self::PendingDelete),
            (_, SyncEvent::RemoteConfirmed) => Some(Self::Synced),
            (_, SyncEvent::RetriesExhausted) => Some(Self::SyncFailed),
        };

        next.ok_or(Error::InvalidTransition { from: self, event })
    }

    /// Whether the local copy matches the remote one
    pub const fn is_confirmed(self) -> bool {
        matches!(self, Self::Synced)
    }

    /// Deleted locally: hidden from reads and closed to writes
    pub const fn is_tombstone(self) -> bool {
        matches!(self, Self::PendingDelete | Self::DeleteFailed)
    }

    /// Gave up after the retry cap
    pub const fn is_failed(self) -> bool {
        matches!(self, Self::SyncFailed | Self::DeleteFailed)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "pending_delete" => Ok(Self::PendingDelete),
            "sync_failed" => Ok(Self::SyncFailed),
            "delete_failed" => Ok(Self::DeleteFailed),
            other => Err(Error::Database(format!("unknown sync status '{other}'"))),
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LocalWrite => "local write",
            Self::LocalDelete => "local delete",
            Self::RemoteConfirmed => "remote confirmation",
            Self::RetriesExhausted => "retry exhaustion",
            Self::RetryRequested => "retry request",
        };
        f.write_str(name)
    }
}
