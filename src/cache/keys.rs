//! Cache key definitions.
//!
//! Every key belongs to a [`Namespace`]; invalidation always drops a whole
//! namespace at once.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A group of cached entries that is invalidated together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Posts,
}

impl Namespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Namespace::Posts => "posts",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one cached response: route path plus a hash of the query string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub namespace: Namespace,
    pub path: String,
    pub query_hash: u64,
}

impl CacheKey {
    pub fn response(namespace: Namespace, path: impl Into<String>, query: &str) -> Self {
        Self {
            namespace,
            path: path.into(),
            query_hash: hash_query(query),
        }
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash a query string for response cache keys.
pub fn hash_query(query: &str) -> u64 {
    hash_value(&query)
}
