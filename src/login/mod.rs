//! Login throttling: failed-attempt counting, lockout and progressive delay.

mod credentials;
mod delay;
mod gate;
mod orchestrator;
mod outcome;

pub use credentials::{hash_password, verify_password, CredentialVerifier, StaticCredentials};
pub use delay::progressive_delay_secs;
pub use gate::LoginAttemptGate;
pub use orchestrator::{DenialReason, LoginDecision, ThrottledLogin};
pub use outcome::{FailureOutcome, LoginStats};
