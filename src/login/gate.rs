//! Failed-login tracking, account lockout and progressive delay.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::delay::progressive_delay_secs;
use super::outcome::{FailureOutcome, LoginStats};
use crate::config::LoginConfig;
use crate::error::Result;
use crate::store::{CounterStore, StoreKey};

/// Value written under the lock key. Only the key's presence matters.
const LOCKED_MARKER: &str = "locked";

/// Per-identity login attempt gate.
///
/// Holds no mutable state of its own: every counter, lock and delay lives in
/// the shared store, so any number of gates (in any number of processes) can
/// serve the same identity. All three records for an identity are written
/// with the lock window as their TTL and therefore expire together.
pub struct LoginAttemptGate {
    store: Arc<dyn CounterStore>,
    settings: LoginConfig,
}

impl LoginAttemptGate {
    /// Create a gate over the given store.
    pub fn new(store: Arc<dyn CounterStore>, settings: LoginConfig) -> Self {
        Self { store, settings }
    }

    /// The throttling settings in effect.
    pub fn settings(&self) -> &LoginConfig {
        &self.settings
    }

    /// Whether an unexpired lock exists for `identity`.
    pub async fn is_locked(&self, identity: &str) -> Result<bool> {
        let key = StoreKey::Locked(identity.to_string()).to_store_key();
        Ok(self.store.exists(&key).await?)
    }

    /// Seconds left on the lock, rounded up; 0 when unlocked.
    pub async fn remaining_lock_secs(&self, identity: &str) -> Result<u64> {
        let key = StoreKey::Locked(identity.to_string()).to_store_key();
        let ttl = self.store.ttl_remaining(&key).await?;
        Ok(ceil_secs(ttl))
    }

    /// Delay to impose before the next attempt; 0 when none is owed or the
    /// feature is disabled.
    pub async fn progressive_delay_secs(&self, identity: &str) -> Result<u64> {
        if !self.settings.progressive_delay_enabled {
            return Ok(0);
        }
        let key = StoreKey::Delay(identity.to_string()).to_store_key();
        Ok(self.read_number(&key).await?)
    }

    /// Failed attempts recorded in the current window.
    pub async fn failed_attempts(&self, identity: &str) -> Result<u32> {
        let key = StoreKey::Attempts(identity.to_string()).to_store_key();
        let count = self.read_number(&key).await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Clear all throttling state after a successful login.
    pub async fn record_success(&self, identity: &str) -> Result<()> {
        self.clear(identity).await?;
        info!(identity = %identity, "Successful login, attempt counters cleared");
        Ok(())
    }

    /// Administrative override: clear all throttling state unconditionally.
    pub async fn unlock(&self, identity: &str) -> Result<()> {
        self.clear(identity).await?;
        info!(identity = %identity, "Account manually unlocked");
        Ok(())
    }

    /// Count a failed login attempt.
    ///
    /// Attempts against a locked identity are not counted, so hammering a
    /// locked account neither extends nor resets the lock.
    pub async fn record_failure(&self, identity: &str) -> Result<FailureOutcome> {
        if self.is_locked(identity).await? {
            let remaining_secs = self.remaining_lock_secs(identity).await?;
            warn!(
                identity = %identity,
                remaining_secs = remaining_secs,
                "Failed attempt on locked account"
            );
            return Ok(FailureOutcome::AlreadyLocked { remaining_secs });
        }

        let window = self.settings.lock_duration();
        let max_attempts = u64::from(self.settings.max_attempts);
        let attempts_key = StoreKey::Attempts(identity.to_string()).to_store_key();

        let count = self.store.increment(&attempts_key, window).await?;
        let count = u64::try_from(count).unwrap_or(0);

        warn!(identity = %identity, attempt = count, "Failed login attempt");

        if count > max_attempts {
            // A concurrent failure crossed the limit first.
            let remaining_secs = self.ensure_locked(identity, window).await?;
            return Ok(FailureOutcome::AlreadyLocked { remaining_secs });
        }

        if count == max_attempts {
            let lock_key = StoreKey::Locked(identity.to_string()).to_store_key();
            self.store
                .set_with_ttl(&lock_key, LOCKED_MARKER, window)
                .await?;
            warn!(
                identity = %identity,
                lock_minutes = self.settings.lock_duration_minutes,
                "Account locked after too many failed attempts"
            );
            return Ok(FailureOutcome::JustLocked {
                lock_secs: window.as_secs(),
            });
        }

        // Only attempts that stay unlocked owe a delay.
        if self.settings.progressive_delay_enabled && count > 1 {
            let delay = progressive_delay_secs(count, self.settings.delay_cap_seconds);
            let delay_key = StoreKey::Delay(identity.to_string()).to_store_key();
            self.store
                .set_with_ttl(&delay_key, &delay.to_string(), window)
                .await?;
            debug!(identity = %identity, delay_secs = delay, "Progressive delay set");
        }

        Ok(FailureOutcome::Failed {
            remaining_attempts: (max_attempts - count) as u32,
        })
    }

    /// Snapshot of the identity's state for diagnostics.
    pub async fn stats(&self, identity: &str) -> Result<LoginStats> {
        let failed = self.failed_attempts(identity).await?;
        let locked = self.is_locked(identity).await?;
        let remaining = if locked {
            self.remaining_lock_secs(identity).await?
        } else {
            0
        };
        let delay = self.progressive_delay_secs(identity).await?;

        Ok(LoginStats::new(
            failed,
            locked,
            remaining,
            delay,
            self.settings.max_attempts,
            self.settings.lock_duration().as_secs(),
        ))
    }

    async fn clear(&self, identity: &str) -> Result<()> {
        for key in StoreKey::login_records(identity) {
            self.store.delete(&key.to_store_key()).await?;
        }
        Ok(())
    }

    async fn ensure_locked(&self, identity: &str, window: Duration) -> Result<u64> {
        let lock_key = StoreKey::Locked(identity.to_string()).to_store_key();
        if !self.store.exists(&lock_key).await? {
            self.store
                .set_with_ttl(&lock_key, LOCKED_MARKER, window)
                .await?;
        }
        self.remaining_lock_secs(identity).await
    }

    /// Read a non-negative integer, treating garbage as 0.
    async fn read_number(&self, key: &str) -> crate::store::StoreResult<u64> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(0);
        };
        match raw.parse::<u64>() {
            Ok(value) => Ok(value),
            Err(_) => {
                warn!(key = %key, value = %raw, "Ignoring non-numeric throttling value");
                Ok(0)
            }
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatehouseError;
    use crate::store::testing::{FailingStore, FailingWrites};
    use crate::store::MemoryStore;

    fn gate_with(settings: LoginConfig) -> LoginAttemptGate {
        LoginAttemptGate::new(Arc::new(MemoryStore::new()), settings)
    }

    fn gate() -> LoginAttemptGate {
        gate_with(LoginConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_count_down_then_lock() {
        let gate = gate();

        for expected_remaining in (1..=4).rev() {
            let outcome = gate.record_failure("alice").await.unwrap();
            assert_eq!(
                outcome,
                FailureOutcome::Failed {
                    remaining_attempts: expected_remaining
                }
            );
        }
        assert!(!gate.is_locked("alice").await.unwrap());

        let outcome = gate.record_failure("alice").await.unwrap();
        assert_eq!(outcome, FailureOutcome::JustLocked { lock_secs: 900 });
        assert!(gate.is_locked("alice").await.unwrap());
        assert_eq!(gate.remaining_lock_secs("alice").await.unwrap(), 900);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_while_locked_are_not_counted() {
        let gate = gate();
        for _ in 0..5 {
            gate.record_failure("alice").await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(60)).await;

        let outcome = gate.record_failure("alice").await.unwrap();
        assert_eq!(
            outcome,
            FailureOutcome::AlreadyLocked {
                remaining_secs: 840
            }
        );
        assert_eq!(gate.failed_attempts("alice").await.unwrap(), 5);
        // The lock was not extended
        assert_eq!(gate.remaining_lock_secs("alice").await.unwrap(), 840);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progressive_delay_follows_failures() {
        let gate = gate();

        gate.record_failure("bob").await.unwrap();
        assert_eq!(gate.progressive_delay_secs("bob").await.unwrap(), 0);

        let mut observed = Vec::new();
        for _ in 0..3 {
            gate.record_failure("bob").await.unwrap();
            observed.push(gate.progressive_delay_secs("bob").await.unwrap());
        }
        assert_eq!(observed, vec![1, 2, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progressive_delay_respects_cap_and_toggle() {
        let gate = gate_with(LoginConfig {
            max_attempts: 10,
            delay_cap_seconds: 3,
            ..LoginConfig::default()
        });
        for _ in 0..6 {
            gate.record_failure("carol").await.unwrap();
        }
        assert_eq!(gate.progressive_delay_secs("carol").await.unwrap(), 3);

        let disabled = gate_with(LoginConfig {
            progressive_delay_enabled: false,
            ..LoginConfig::default()
        });
        for _ in 0..3 {
            disabled.record_failure("carol").await.unwrap();
        }
        assert_eq!(disabled.progressive_delay_secs("carol").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_everything() {
        let gate = gate();
        for _ in 0..5 {
            gate.record_failure("dave").await.unwrap();
        }

        gate.record_success("dave").await.unwrap();

        let stats = gate.stats("dave").await.unwrap();
        assert_eq!(stats.failed_attempts, 0);
        assert!(!stats.is_locked);
        assert_eq!(stats.remaining_lock_seconds, 0);
        assert_eq!(stats.progressive_delay_seconds, 0);

        // Idempotent
        gate.record_success("dave").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlock_after_lockout() {
        let gate = gate();
        for _ in 0..5 {
            gate.record_failure("alice").await.unwrap();
        }
        assert!(gate.is_locked("alice").await.unwrap());

        gate.unlock("alice").await.unwrap();

        assert!(!gate.is_locked("alice").await.unwrap());
        assert_eq!(gate.failed_attempts("alice").await.unwrap(), 0);
        gate.unlock("never-seen").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_expire_together() {
        let gate = gate();
        for _ in 0..5 {
            gate.record_failure("erin").await.unwrap();
        }

        tokio::time::advance(Duration::from_secs(900)).await;

        let stats = gate.stats("erin").await.unwrap();
        assert_eq!(stats.failed_attempts, 0);
        assert!(!stats.is_locked);
        assert_eq!(stats.progressive_delay_seconds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stats_snapshot() {
        let gate = gate();
        for _ in 0..4 {
            gate.record_failure("frank").await.unwrap();
        }

        let stats = gate.stats("frank").await.unwrap();
        assert_eq!(stats.failed_attempts, 4);
        assert_eq!(stats.remaining_attempts, 1);
        assert_eq!(stats.progressive_delay_seconds, 4);
        assert_eq!(stats.max_attempts, 5);
        assert_eq!(stats.lock_duration_seconds, 900);
        assert!(stats.approaching_threshold);
        assert!(!stats.is_locked);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_all_counted() {
        let gate = Arc::new(gate_with(LoginConfig {
            max_attempts: 100,
            ..LoginConfig::default()
        }));

        let tasks: Vec<_> = (0..40)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.record_failure("mallory").await.unwrap() })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        assert_eq!(gate.failed_attempts("mallory").await.unwrap(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_never_exceed_lock_threshold() {
        let gate = Arc::new(gate());

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let gate = gate.clone();
                tokio::spawn(async move { gate.record_failure("mallory").await.unwrap() })
            })
            .collect();
        let outcomes: Vec<FailureOutcome> = futures::future::join_all(tasks)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let just_locked = outcomes
            .iter()
            .filter(|o| matches!(o, FailureOutcome::JustLocked { .. }))
            .count();
        assert_eq!(just_locked, 1);
        assert!(gate.is_locked("mallory").await.unwrap());
        assert_eq!(gate.stats("mallory").await.unwrap().failed_attempts, 5);
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let gate = LoginAttemptGate::new(Arc::new(FailingStore), LoginConfig::default());

        let err = gate.record_failure("alice").await.unwrap_err();
        assert!(matches!(err, GatehouseError::StoreUnavailable(_)));
        assert!(gate.is_locked("alice").await.is_err());
    }

    #[tokio::test]
    async fn test_garbage_values_read_as_zero() {
        let store = Arc::new(MemoryStore::new());
        store
            .set_with_ttl("login:delay:gina", "soon", Duration::from_secs(60))
            .await
            .unwrap();
        let gate = LoginAttemptGate::new(store, LoginConfig::default());

        assert_eq!(gate.progressive_delay_secs("gina").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_locking_failure_writes_no_delay() {
        let gate = gate();
        for _ in 0..5 {
            gate.record_failure("hank").await.unwrap();
        }

        let stats = gate.stats("hank").await.unwrap();
        assert!(stats.is_locked);
        assert_eq!(stats.progressive_delay_seconds, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_is_written_even_when_delay_write_fails() {
        let store = Arc::new(FailingWrites::under("login:delay:"));
        let gate = LoginAttemptGate::new(store, LoginConfig::default());

        // The first failure owes no delay, the next three fail on the delay write
        assert!(gate.record_failure("ivan").await.is_ok());
        for _ in 0..3 {
            assert!(gate.record_failure("ivan").await.is_err());
        }
        assert_eq!(gate.failed_attempts("ivan").await.unwrap(), 4);

        let outcome = gate.record_failure("ivan").await.unwrap();
        assert_eq!(outcome, FailureOutcome::JustLocked { lock_secs: 900 });
        assert!(gate.is_locked("ivan").await.unwrap());
    }
}
