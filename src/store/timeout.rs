//! Bounded-latency wrapper around a counter store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use super::backend::{CounterStore, StoreResult};
use crate::error::StoreError;

/// Decorates a store so that no operation waits longer than `limit`.
///
/// An elapsed operation surfaces as [`StoreError::Timeout`]; whether that
/// fails open or closed is up to the caller.
#[derive(Debug)]
pub struct TimeoutStore<S> {
    inner: S,
    limit: Duration,
}

impl<S: CounterStore> TimeoutStore<S> {
    /// Wrap `inner`, bounding each call by `limit`.
    pub fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }

    /// The wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        key: &str,
        op: impl Future<Output = StoreResult<T>>,
    ) -> StoreResult<T> {
        match tokio::time::timeout(self.limit, op).await {
            Ok(result) => result,
            Err(_) => {
                warn!(key = %key, limit_ms = self.limit.as_millis() as u64, "Store operation timed out");
                Err(StoreError::Timeout {
                    key: key.to_string(),
                    elapsed: self.limit,
                })
            }
        }
    }
}

#[async_trait]
impl<S: CounterStore> CounterStore for TimeoutStore<S> {
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.bounded(key, self.inner.increment(key, ttl)).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.bounded(key, self.inner.set_with_ttl(key, value, ttl)).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.bounded(key, self.inner.get(key)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.bounded(key, self.inner.delete(key)).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.bounded(key, self.inner.exists(key)).await
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Duration> {
        self.bounded(key, self.inner.ttl_remaining(key)).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        self.bounded(key, self.inner.compare_and_swap(key, expected, new, ttl))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::StalledStore;
    use crate::store::MemoryStore;

    #[tokio::test(start_paused = true)]
    async fn test_stalled_operation_times_out() {
        let store = TimeoutStore::new(StalledStore, Duration::from_millis(250));

        let err = store.get("login:locked:alice").await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Timeout {
                key: "login:locked:alice".to_string(),
                elapsed: Duration::from_millis(250),
            }
        );
    }

    #[tokio::test]
    async fn test_fast_operation_passes_through() {
        let store = TimeoutStore::new(MemoryStore::new(), Duration::from_secs(1));

        let value = tokio_test::assert_ok!(store.increment("k", Duration::from_secs(5)).await);
        assert_eq!(value, 1);
        assert!(store.inner().exists("k").await.unwrap());
    }
}
