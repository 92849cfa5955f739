pub mod delete;
pub mod entry;

pub use delete::{delete_entries, delete_entries_async, CleanupError, CleanupReport, OutputCleaner};
pub use entry::{AbsoluteEntry, EntryKind};
