//! Result values produced by the login attempt gate.

use serde::Serialize;

/// What happened when a failed attempt was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// The identity was already locked; nothing was counted.
    AlreadyLocked { remaining_secs: u64 },
    /// This failure reached the limit and locked the identity.
    JustLocked { lock_secs: u64 },
    /// The failure was counted and the identity is still unlocked.
    Failed { remaining_attempts: u32 },
}

impl FailureOutcome {
    /// Whether the identity is locked after this outcome.
    pub fn is_locked(&self) -> bool {
        !matches!(self, FailureOutcome::Failed { .. })
    }
}

/// Read-only snapshot of an identity's throttling state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginStats {
    /// Failed attempts in the current window
    pub failed_attempts: u32,
    /// Whether the identity is currently locked
    pub is_locked: bool,
    /// Seconds until the lock lifts (0 when unlocked)
    pub remaining_lock_seconds: u64,
    /// Delay applied before the next attempt
    pub progressive_delay_seconds: u64,
    /// Failures that trigger a lock
    pub max_attempts: u32,
    /// Configured lock window in seconds
    pub lock_duration_seconds: u64,
    /// Configured lock window in minutes
    pub lock_duration_minutes: u64,
    /// Attempts left before a lock
    pub remaining_attempts: u32,
    /// Whether a login may currently be attempted
    pub can_attempt_login: bool,
    /// Whether the next failure locks the identity
    pub approaching_threshold: bool,
}

impl LoginStats {
    pub(crate) fn new(
        failed_attempts: u32,
        is_locked: bool,
        remaining_lock_seconds: u64,
        progressive_delay_seconds: u64,
        max_attempts: u32,
        lock_duration_seconds: u64,
    ) -> Self {
        let failed_attempts = failed_attempts.min(max_attempts);
        Self {
            failed_attempts,
            is_locked,
            remaining_lock_seconds,
            progressive_delay_seconds,
            max_attempts,
            lock_duration_seconds,
            lock_duration_minutes: lock_duration_seconds / 60,
            remaining_attempts: max_attempts.saturating_sub(failed_attempts),
            can_attempt_login: !is_locked,
            approaching_threshold: failed_attempts >= max_attempts.saturating_sub(1),
        }
    }
}
