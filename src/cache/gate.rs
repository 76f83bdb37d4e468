//! Read-through cache gate with bounded backend calls.
//!
//! Every backend call runs under `operation_timeout`. A failing or slow backend
//! never fails the caller: lookups degrade to a miss, stores and invalidations
//! are logged and dropped.
//!
//! Fills are fenced by namespace generation: a response rendered before a flush
//! is never stored after it.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::backend::{CacheBackend, CacheError, CachedResponse};
use super::config::CacheConfig;
use super::keys::{CacheKey, Namespace};
use super::lock::GenerationLock;
use super::store::MemoryStore;

const SOURCE: &str = "cache::gate";

#[derive(Clone)]
pub struct CacheGate {
    config: CacheConfig,
    backend: Arc<dyn CacheBackend>,
    generations: Arc<GenerationLock>,
}

impl CacheGate {
    pub fn new(config: CacheConfig, backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            config,
            backend,
            generations: Arc::new(GenerationLock::default()),
        }
    }

    /// Gate over an in-process [`MemoryStore`] sized from `config`.
    pub fn in_memory(config: CacheConfig) -> Self {
        let backend = Arc::new(MemoryStore::new(&config));
        Self::new(config, backend)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        if !self.is_enabled() {
            return None;
        }
        match self.bounded("get", self.backend.get(key)).await {
            Ok(Some(hit)) => {
                counter!("scrivo_cache_hit_total", "namespace" => key.namespace.as_str())
                    .increment(1);
                debug!(namespace = %key.namespace, path = %key.path, outcome = "hit", "cache lookup");
                Some(hit)
            }
            Ok(None) => {
                counter!("scrivo_cache_miss_total", "namespace" => key.namespace.as_str())
                    .increment(1);
                debug!(namespace = %key.namespace, path = %key.path, outcome = "miss", "cache lookup");
                None
            }
            Err(err) => {
                self.report("get", key.namespace, &err);
                None
            }
        }
    }

    /// Current flush generation of `namespace`; capture it before rendering a fill.
    pub fn generation(&self, namespace: Namespace) -> u64 {
        self.generations.current(namespace)
    }

    pub async fn store(&self, key: CacheKey, value: CachedResponse) {
        let generation = self.generation(key.namespace);
        self.store_if_current(key, value, generation).await;
    }

    /// Store `value` unless `key`'s namespace was flushed since `generation`.
    ///
    /// Returns whether the value reached the backend.
    pub async fn store_if_current(
        &self,
        key: CacheKey,
        value: CachedResponse,
        generation: u64,
    ) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let namespace = key.namespace;
        let Some(_fence) = self.generations.fill(namespace, generation).await else {
            debug!(namespace = %namespace, path = %key.path, "namespace flushed during fill; not storing");
            return false;
        };
        match self
            .bounded("put", self.backend.put(key, value, self.config.ttl()))
            .await
        {
            Ok(()) => {
                counter!("scrivo_cache_store_total", "namespace" => namespace.as_str())
                    .increment(1);
                true
            }
            Err(err) => {
                self.report("put", namespace, &err);
                false
            }
        }
    }

    /// Drop every cached entry in `namespace`. Runs even when lookups are disabled.
    pub async fn invalidate(&self, namespace: Namespace) {
        let _fence = self.generations.advance(namespace).await;
        match self
            .bounded("invalidate", self.backend.invalidate_namespace(namespace))
            .await
        {
            Ok(removed) => {
                counter!("scrivo_cache_invalidate_total", "namespace" => namespace.as_str())
                    .increment(1);
                debug!(namespace = %namespace, removed, "cache namespace flushed");
            }
            Err(err) => self.report("invalidate", namespace, &err),
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, call: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        let timeout = self.config.operation_timeout();
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout { op, timeout }),
        }
    }

    fn report(&self, op: &'static str, namespace: Namespace, err: &CacheError) {
        counter!(
            "scrivo_cache_error_total",
            "namespace" => namespace.as_str(),
            "op" => op
        )
        .increment(1);
        warn!(
            target_module = SOURCE,
            op,
            namespace = %namespace,
            error = %err,
            "cache backend failed; continuing without cache"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::*;

    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn put(
            &self,
            _key: CacheKey,
            _value: CachedResponse,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }

        async fn invalidate_namespace(&self, _namespace: Namespace) -> Result<usize, CacheError> {
            Err(CacheError::Unavailable("connection refused".into()))
        }
    }

    struct HangingBackend;

    #[async_trait]
    impl CacheBackend for HangingBackend {
        async fn get(&self, _key: &CacheKey) -> Result<Option<CachedResponse>, CacheError> {
            std::future::pending().await
        }

        async fn put(
            &self,
            _key: CacheKey,
            _value: CachedResponse,
            _ttl: Duration,
        ) -> Result<(), CacheError> {
            std::future::pending().await
        }

        async fn invalidate_namespace(&self, _namespace: Namespace) -> Result<usize, CacheError> {
            std::future::pending().await
        }
    }

    fn key() -> CacheKey {
        CacheKey::response(Namespace::Posts, "/api/posts/", "")
    }

    fn value() -> CachedResponse {
        CachedResponse {
            status: 200,
            headers: Vec::new(),
            body: Bytes::from_static(b"[]"),
        }
    }

    #[tokio::test]
    async fn stored_value_is_served_until_invalidated() {
        let gate = CacheGate::in_memory(CacheConfig::default());
        gate.store(key(), value()).await;
        assert_eq!(gate.lookup(&key()).await, Some(value()));

        gate.invalidate(Namespace::Posts).await;
        assert_eq!(gate.lookup(&key()).await, None);
    }

    #[tokio::test]
    async fn fill_rendered_before_a_flush_is_discarded() {
        let gate = CacheGate::in_memory(CacheConfig::default());
        let generation = gate.generation(Namespace::Posts);
        gate.invalidate(Namespace::Posts).await;

        assert!(!gate.store_if_current(key(), value(), generation).await);
        assert_eq!(gate.lookup(&key()).await, None);

        let fresh = gate.generation(Namespace::Posts);
        assert!(gate.store_if_current(key(), value(), fresh).await);
        assert_eq!(gate.lookup(&key()).await, Some(value()));
    }

    #[tokio::test]
    async fn disabled_gate_never_serves() {
        let gate = CacheGate::in_memory(CacheConfig {
            enabled: false,
            ..Default::default()
        });
        gate.store(key(), value()).await;
        assert_eq!(gate.lookup(&key()).await, None);
    }

    #[tokio::test]
    async fn broken_backend_degrades_to_miss() {
        let gate = CacheGate::new(CacheConfig::default(), Arc::new(BrokenBackend));
        gate.store(key(), value()).await;
        assert_eq!(gate.lookup(&key()).await, None);
        gate.invalidate(Namespace::Posts).await;
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_backend_is_cut_off_by_timeout() {
        let gate = CacheGate::new(CacheConfig::default(), Arc::new(HangingBackend));
        assert_eq!(gate.lookup(&key()).await, None);
        gate.store(key(), value()).await;
        gate.invalidate(Namespace::Posts).await;
    }
}
