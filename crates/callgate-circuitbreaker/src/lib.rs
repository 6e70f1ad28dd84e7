//! Per-resource circuit breaking for callgate.
//!
//! Each resource has its own circuit. A circuit opens after a configured
//! number of consecutive failures and rejects calls for a cool-down period.
//! Once the cool-down has passed the next [`CircuitBreaker::permit`] moves
//! it to half-open and hands out a single trial call: success closes the
//! circuit, failure opens it again and restarts the cool-down.
//!
//! ```text
//!            failures >= threshold
//!   Closed ------------------------> Open
//!     ^                              |  ^
//!     | trial succeeds     cool-down |  | trial fails
//!     |                      elapsed v  |
//!     +-------------------------- HalfOpen
//! ```
//!
//! Time is passed in explicitly, so behaviour is deterministic under test.
//!
//! ## Example
//!
//! ```rust
//! use callgate_circuitbreaker::{CircuitBreakerConfig, CircuitState};
//! use callgate_core::Timestamp;
//! use std::time::Duration;
//!
//! let mut breaker = CircuitBreakerConfig::builder()
//!     .failure_threshold(3)
//!     .cool_down(Duration::from_secs(60))
//!     .build();
//!
//! let t0 = Timestamp::from_secs(0);
//! for _ in 0..3 {
//!     breaker.report("search", false, t0);
//! }
//! assert_eq!(breaker.state("search"), CircuitState::Open);
//! assert!(!breaker.permit("search", t0 + Duration::from_secs(59)));
//! assert!(breaker.permit("search", t0 + Duration::from_secs(60)));
//! assert_eq!(breaker.state("search"), CircuitState::HalfOpen);
//! ```
//!
//! ## Feature Flags
//!
//! - `tracing`: log state transitions at `info` and rejections at `debug`
//! - `metrics`: `callgate_circuit_transitions_total` and `callgate_circuit_state`
//! - `serde`: serialize [`CircuitSnapshot`] and [`CircuitState`]

mod breaker;
mod circuit;
mod config;
mod events;

pub use breaker::CircuitBreaker;
pub use circuit::{BreakerSettings, CircuitSnapshot, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitEvent;
