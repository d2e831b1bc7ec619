//! Progressive delay schedule.
//!
//! The second consecutive failure earns a 1 second wait before the next
//! attempt, and every further failure doubles it up to the cap:
//!
//! - 0-1 failures: no delay
//! - 2 failures: 1 second
//! - 3 failures: 2 seconds
//! - 4 failures: 4 seconds
//! - 5+ failures: 8 seconds (default cap)

/// Delay in seconds owed after `failed_count` consecutive failures.
pub fn progressive_delay_secs(failed_count: u64, cap_secs: u64) -> u64 {
    if failed_count <= 1 {
        return 0;
    }
    let exponent = failed_count - 2;
    let delay = if exponent >= u64::BITS as u64 {
        u64::MAX
    } else {
        1u64 << exponent
    };
    delay.min(cap_secs)
}
