//! Property-based tests for the callgate components.
//!
//! Run with: cargo test --test property_tests

pub mod backoff;
pub mod circuit_breaker;
pub mod queue;
pub mod rate_tracker;
