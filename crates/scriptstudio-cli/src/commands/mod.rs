pub mod common;
pub mod completions;
pub mod create;
pub mod delete;
pub mod get;
pub mod list;
pub mod queue;
pub mod sync;
pub mod update;
