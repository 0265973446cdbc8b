//! Content-addressed result cache backed by a single JSON document.
//!
//! The store keeps every record in memory and rewrites the whole backing
//! file on each mutation. It supports:
//!
//! - Deterministic SHA-256 keys derived from an item's identity
//! - Shallow merge of partial payloads with sticky `downloaded`/`analyzed` flags
//! - Statistics recomputed from the live record set on every call
//! - Graceful degradation to an empty store when the backing file is corrupt
//!
//! Only one process may write a given backing file at a time.

pub mod hash;
pub mod record;
pub mod store;

pub use hash::key_for;
pub use record::{CacheDocument, CacheMetadata, CacheRecord, CacheStatistics, RecordFlags};
pub use store::CacheStore;
