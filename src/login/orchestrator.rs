//! The throttled login sequence: check lock, delay, verify, record.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, instrument};

use super::credentials::CredentialVerifier;
use super::gate::LoginAttemptGate;
use super::outcome::FailureOutcome;
use crate::config::FailurePolicy;
use crate::error::{GatehouseError, Result};

/// Final decision for one login call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginDecision {
    /// Credentials verified and counters cleared.
    Success,
    /// The attempt was refused.
    Denied(DenialReason),
}

/// Why a login was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// The identity is locked for this many more seconds.
    Locked { remaining_secs: u64 },
    /// Wrong credentials. The hint is absent when the store could not say.
    InvalidCredentials { remaining_attempts: Option<u32> },
    /// The counter store failed and the policy is to fail closed.
    Unavailable,
}

/// Runs a login attempt through the attempt gate.
///
/// The delay is served before the verifier runs, so throttled attempts cost
/// no hashing and their timing does not depend on the outcome. Dropping the
/// returned future during the delay abandons the attempt; nothing has been
/// recorded at that point.
pub struct ThrottledLogin {
    gate: Arc<LoginAttemptGate>,
    verifier: Arc<dyn CredentialVerifier>,
    policy: FailurePolicy,
}

impl ThrottledLogin {
    /// Create an orchestrator; the store failure policy comes from the gate's settings.
    pub fn new(gate: Arc<LoginAttemptGate>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        let policy = gate.settings().store_failure_policy;
        Self {
            gate,
            verifier,
            policy,
        }
    }

    /// The underlying attempt gate.
    pub fn gate(&self) -> &Arc<LoginAttemptGate> {
        &self.gate
    }

    /// Attempt a login.
    ///
    /// Returns `Err` only when the verifier itself fails; every throttling
    /// result is a [`LoginDecision`].
    #[instrument(skip(self, password), fields(identity = %identity))]
    pub async fn attempt(&self, identity: &str, password: &str) -> Result<LoginDecision> {
        match self.gate.is_locked(identity).await {
            Ok(true) => {
                let remaining_secs = match self.gate.remaining_lock_secs(identity).await {
                    Ok(secs) => secs,
                    Err(e) => {
                        self.store_fault(identity, "lock ttl", &e);
                        0
                    }
                };
                info!(remaining_secs = remaining_secs, "Rejected login for locked account");
                return Ok(LoginDecision::Denied(DenialReason::Locked { remaining_secs }));
            }
            Ok(false) => {}
            Err(e) => {
                if let Some(decision) = self.store_fault(identity, "lock check", &e) {
                    return Ok(decision);
                }
            }
        }

        let delay_secs = match self.gate.progressive_delay_secs(identity).await {
            Ok(secs) => secs,
            Err(e) => match self.store_fault(identity, "delay lookup", &e) {
                Some(decision) => return Ok(decision),
                None => 0,
            },
        };
        if delay_secs > 0 {
            debug!(delay_secs = delay_secs, "Applying progressive delay");
            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        }

        if self.verifier.verify(identity, password).await? {
            return Ok(match self.gate.record_success(identity).await {
                Ok(()) => LoginDecision::Success,
                Err(e) => self
                    .store_fault(identity, "record success", &e)
                    .unwrap_or(LoginDecision::Success),
            });
        }

        let decision = match self.gate.record_failure(identity).await {
            Ok(FailureOutcome::AlreadyLocked { remaining_secs }) => {
                LoginDecision::Denied(DenialReason::Locked { remaining_secs })
            }
            Ok(FailureOutcome::JustLocked { lock_secs }) => {
                LoginDecision::Denied(DenialReason::Locked {
                    remaining_secs: lock_secs,
                })
            }
            Ok(FailureOutcome::Failed { remaining_attempts }) => {
                LoginDecision::Denied(DenialReason::InvalidCredentials {
                    remaining_attempts: Some(remaining_attempts),
                })
            }
            Err(e) => self.store_fault(identity, "record failure", &e).unwrap_or(
                LoginDecision::Denied(DenialReason::InvalidCredentials {
                    remaining_attempts: None,
                }),
            ),
        };
        Ok(decision)
    }

    /// Log a store fault and apply the failure policy. `Some` means stop
    /// with that decision; `None` means carry on unthrottled.
    fn store_fault(
        &self,
        identity: &str,
        stage: &'static str,
        err: &GatehouseError,
    ) -> Option<LoginDecision> {
        error!(
            identity = %identity,
            stage = stage,
            policy = ?self.policy,
            error = %err,
            "Counter store unavailable during login"
        );
        match self.policy {
            FailurePolicy::Closed => Some(LoginDecision::Denied(DenialReason::Unavailable)),
            FailurePolicy::Open => None,
        }
    }
}
