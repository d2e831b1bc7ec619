//! Gatehouse - Login Throttling and Admission Control
//!
//! This crate guards a login endpoint against credential guessing and
//! throttles request floods. Failed-attempt counters, account locks,
//! progressive delays and per-client token buckets all live in a shared
//! counter store, so every service instance enforces the same limits.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
pub mod login;
pub mod store;
