//! Time-bounded store of in-flight jobs.

mod entry;
mod store;

pub use entry::{EntryState, TaskEntry, TaskFields};
pub use store::{CacheConfig, CacheStats, TaskCache};
