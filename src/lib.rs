// Library interface for scriptkit
// Fingerprinting and output cleanup for incremental script graphs

pub mod cleanup;
pub mod config;
pub mod logging;
pub mod script;

// Re-export commonly used types
pub use cleanup::{delete_entries, AbsoluteEntry, CleanupError, CleanupReport, EntryKind, OutputCleaner};
pub use config::{CleanupConfig, ScriptkitConfig};
pub use script::{
    compute_cache_key, CacheKey, CacheKeyError, CacheKeyString, ScriptConfig, ScriptGraph,
    ScriptReference, ScriptReferenceString, Sha256HexDigest,
};
