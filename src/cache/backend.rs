//! Pluggable storage behind the cache gate.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use super::keys::{CacheKey, Namespace};

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation `{op}` timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },
}

/// Storage contract for cached responses.
///
/// Writers never patch cached values: they store fresh entries or drop a whole namespace.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>, CacheError>;

    async fn put(
        &self,
        key: CacheKey,
        value: CachedResponse,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drops every entry in `namespace` and returns how many were removed.
    async fn invalidate_namespace(&self, namespace: Namespace) -> Result<usize, CacheError>;
}
