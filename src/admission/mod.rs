//! Request admission control with per-client token buckets.

mod bucket;
mod clock;
mod controller;
mod paths;

pub use bucket::{BucketState, Consumption, TokenBucket};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{Admission, AdmissionController, AdmissionDecision};
pub use paths::ExcludedPaths;
