//! Response, document and existence caches.
//!
//! This module shields the network and the store from redundant work:
//!
//! - Ephemeral response cache with per-operation lifetimes
//! - Permanent document cache for decoded bill texts and attachments
//! - Short-lived existence memo with pluggable backends
//! - Stable key derivation for every remote operation

pub mod existence;
pub mod file;
pub mod hash;
pub mod keys;

pub use crate::Error;

pub use existence::{DEFAULT_ENTRY_TTL, ExistenceCache, MemoryExistenceCache, SqliteExistenceCache, open_existence_cache};
pub use file::{CacheMode, FileCache, PurgeReport};
pub use keys::{ApiOperation, CacheCategory, ListTarget, MonitorAction, SearchQuery, document_key, search_key};
