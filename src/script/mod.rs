pub mod cache_key;
pub mod config;
pub mod digest;
pub mod freshness;
pub mod graph;
pub mod reference;

pub use cache_key::{
    compute_cache_key, compute_graph_cache_keys, CacheKey, CacheKeyError, CacheKeyString,
    DigestTable, FileDigestSource, FileDigests,
};
pub use config::{CleanMode, ScriptConfig};
pub use digest::{InvalidDigest, Sha256HexDigest};
pub use freshness::{check_freshness, Freshness, StaleReason};
pub use graph::{GraphError, ScriptGraph};
pub use reference::{
    decode, encode, DecodingError, PackageReference, ReferenceError, ScriptReference,
    ScriptReferenceString,
};
