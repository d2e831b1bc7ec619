//! Counter store trait for abstracting in-process and remote implementations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Trait for shared counter store implementations.
///
/// Every operation must be atomic with respect to concurrent callers on the
/// same key. Implementations must not emulate any of these with a
/// read-then-write sequence on the caller side. There is no ordering
/// guarantee across different keys.
///
/// Values are stored as strings. A key whose TTL has elapsed is treated as
/// absent by every operation.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the integer under `key` (creating it at 0) and reset its TTL.
    ///
    /// Returns the post-increment value. The increment and the TTL refresh
    /// happen in the same atomic step.
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64>;

    /// Store `value` under `key`, replacing any previous value and TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Read the value under `key`.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Remove `key`. Returns whether a live value was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Check whether a live value exists under `key`.
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Time left before `key` expires, or zero when absent.
    async fn ttl_remaining(&self, key: &str) -> StoreResult<Duration>;

    /// Replace the value under `key` with `new` only if it currently equals
    /// `expected` (`None` meaning absent). Returns whether the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> StoreResult<bool>;
}

#[async_trait]
impl<T: CounterStore + ?Sized> CounterStore for Arc<T> {
    async fn increment(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        (**self).increment(key, ttl).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        (**self).set_with_ttl(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key).await
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        (**self).exists(key).await
    }

    async fn ttl_remaining(&self, key: &str) -> StoreResult<Duration> {
        (**self).ttl_remaining(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
        ttl: Duration,
    ) -> StoreResult<bool> {
        (**self).compare_and_swap(key, expected, new, ttl).await
    }
}
