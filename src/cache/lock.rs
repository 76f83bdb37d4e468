use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockWriteGuard};

use tracing::warn;

use super::keys::Namespace;

/// Acquire a write guard, recovering the inner state if a previous holder panicked.
pub(crate) fn rw_write<'a, T>(
    lock: &'a RwLock<T>,
    target: &'static str,
    op: &'static str,
) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!(
                op,
                target_module = target,
                lock_kind = "rwlock.write",
                result = "poisoned_recovered",
                hint = "state may be stale after panic in another thread",
                "Recovered from poisoned cache lock"
            );
            poisoned.into_inner()
        }
    }
}

/// Per-namespace generation counters that fence cache fills against flushes.
///
/// A fill captures the generation before it renders its response and may only
/// store while that generation is still current. A flush bumps the generation
/// under the write half, so it waits for in-flight stores to land and every
/// later store sees the new value.
#[derive(Debug, Default)]
pub(crate) struct GenerationLock {
    posts: AtomicU64,
    fence: tokio::sync::RwLock<()>,
}

impl GenerationLock {
    pub(crate) fn current(&self, namespace: Namespace) -> u64 {
        self.counter(namespace).load(Ordering::Acquire)
    }

    /// Hold the fence shared when `generation` is still current.
    pub(crate) async fn fill(
        &self,
        namespace: Namespace,
        generation: u64,
    ) -> Option<tokio::sync::RwLockReadGuard<'_, ()>> {
        let guard = self.fence.read().await;
        (self.current(namespace) == generation).then_some(guard)
    }

    /// Bump the generation and hold the fence exclusively while the caller flushes.
    pub(crate) async fn advance(
        &self,
        namespace: Namespace,
    ) -> tokio::sync::RwLockWriteGuard<'_, ()> {
        let guard = self.fence.write().await;
        self.counter(namespace).fetch_add(1, Ordering::AcqRel);
        guard
    }

    fn counter(&self, namespace: Namespace) -> &AtomicU64 {
        match namespace {
            Namespace::Posts => &self.posts,
        }
    }
}
