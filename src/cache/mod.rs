//! Scrivo Cache System
//!
//! A read-through response cache for the public post list, fronted by a gate
//! that bounds every backend call and falls back to the source of truth when
//! the backend misbehaves.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 300
//! max_entries = 512
//! operation_timeout_ms = 250
//! ```
//!
//! Any post create, update or delete flushes the whole [`Namespace::Posts`]
//! namespace. Comment and tag changes do not invalidate anything.

mod backend;
mod config;
mod gate;
mod keys;
mod lock;
mod middleware;
mod store;

pub use backend::{CacheBackend, CacheError, CachedResponse};
pub use config::CacheConfig;
pub use gate::CacheGate;
pub use keys::{CacheKey, Namespace, hash_query, hash_value};
pub use middleware::post_list_cache;
pub use store::MemoryStore;
