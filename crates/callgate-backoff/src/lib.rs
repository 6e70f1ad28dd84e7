//! Retry wait computation for callgate.
//!
//! [`BackoffPolicy::decide`] turns a failure count and an optional server
//! hint into either a wait or a decision to abandon:
//!
//! 1. Once `attempts` reaches the configured maximum, abandon.
//! 2. Otherwise an explicit hint (for example a `Retry-After` header, see
//!    [`parse_retry_after`]) is used as-is.
//! 3. Otherwise the configured [`IntervalFunction`] computes the wait.
//!    The default doubles from one second and caps at five minutes.
//!
//! ```rust
//! use callgate_backoff::{BackoffDecision, BackoffPolicy};
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::builder()
//!     .max_attempts(3)
//!     .exponential(Duration::from_secs(1), Duration::from_secs(60))
//!     .build();
//!
//! assert_eq!(policy.decide(1, None), BackoffDecision::Retry(Duration::from_secs(1)));
//! assert_eq!(policy.decide(2, None), BackoffDecision::Retry(Duration::from_secs(2)));
//! assert_eq!(policy.decide(3, None), BackoffDecision::Abandon);
//! ```

mod interval;
mod policy;
mod retry_after;

pub use interval::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use policy::{BackoffDecision, BackoffPolicy, BackoffPolicyBuilder};
pub use retry_after::parse_retry_after;
