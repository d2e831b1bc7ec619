//! Store doubles for exercising failure paths.

use std::time::Duration;

use async_trait::async_trait;

use super::backend::{CounterStore, StoreResult};
use super::memory::MemoryStore;
use crate::error::StoreError;

/// A store whose every call hangs forever.
pub(crate) struct StalledStore;

/// A store whose every call fails immediately.
pub(crate) struct FailingStore;

/// A working in-memory store that fails writes under one key prefix.
pub(crate) struct FailingWrites {
    inner: MemoryStore,
    prefix: &'static str,
}

impl FailingWrites {
    pub(crate) fn under(prefix: &'static str) -> Self {
        Self {
            inner: MemoryStore::new(),
            prefix,
        }
    }
}

/// A working in-memory store whose compare-and-swap always loses.
#[derive(Default)]
pub(crate) struct LosingSwaps {
    inner: MemoryStore,
}

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".to_string()))
}

#[async_trait]
impl CounterStore for StalledStore {
    async fn increment(&self, _: &str, _: Duration) -> StoreResult<i64> {
        std::future::pending().await
    }
    async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
        std::future::pending().await
    }
    async fn get(&self, _: &str) -> StoreResult<Option<String>> {
        std::future::pending().await
    }
    async fn delete(&self, _: &str) -> StoreResult<bool> {
        std::future::pending().await
    }
    async fn exists(&self, _: &str) -> StoreResult<bool> {
        std::future::pending().await
    }
    async fn ttl_remaining(&self, _: &str) -> StoreResult<Duration> {
        std::future::pending().await
    }
    async fn compare_and_swap(
        &self,
        _: &str,
        _: Option<&str>,
        _: &str,
        _: Duration,
    ) -> StoreResult<bool> {
        std::future::pending().await
    }
}

#[async_trait]
impl CounterStore for FailingStore {
    async fn increment(&self, _: &str, _: Duration) -> StoreResult<i64> {
        down()
    }
    async fn set_with_ttl(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
        down()
    }
    async fn get(&self, _: &str) -> StoreResult<Option<String>> {
        down()
    }
    async fn delete(&self, _: &str) -> StoreResult<bool> {
        down()
    }
    async fn exists(&self, _: &str) -> StoreResult<bool> {
        down()
    }
    async fn ttl_remaining(&self, _: &str) -> StoreResult<Duration> {
        down()
    }
    async fn compare_and_swap(
        &self,
        _: &str,
        _: Option<&str>,
        _: &str,
        _: Duration,
    ) -> StoreResult<bool> {
        down()
    }
}

#[async_trait]
impl CounterStore for FailingWrites {
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.inner.increment(key, ttl).await
    }
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        if key.starts_with(self.prefix) {
            return down();
        }
        self.inner.set_with_ttl(key, value, ttl).await
    }
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }
    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key).await
    }
    async fn ttl_remaining(&self, key: &str) -> StoreResult<Duration> {
        self.inner.ttl_remaining(key).await
    }
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        self.inner.compare_and_swap(key, expected, new, ttl).await
    }
}

#[async_trait]
impl CounterStore for LosingSwaps {
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.inner.increment(key, ttl).await
    }
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.inner.set_with_ttl(key, value, ttl).await
    }
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key).await
    }
    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.inner.delete(key).await
    }
    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.inner.exists(key).await
    }
    async fn ttl_remaining(&self, key: &str) -> StoreResult<Duration> {
        self.inner.ttl_remaining(key).await
    }
    async fn compare_and_swap(
        &self,
        _: &str,
        _: Option<&str>,
        _: &str,
        _: Duration,
    ) -> StoreResult<bool> {
        Ok(false)
    }
}
