//! Data models for ScriptStudio

mod collection;
mod queue;
mod record;
mod sort;
mod sync_status;

pub use collection::Collection;
pub use queue::{QueueAction, QueueEntry, QueueEntryDraft, RecordKey};
pub use record::{parse_timestamp, sanitize_fields, Fields, Record, RecordId, RESERVED_FIELDS};
pub use sort::SortSpec;
pub use sync_status::{SyncEvent, SyncStatus};
