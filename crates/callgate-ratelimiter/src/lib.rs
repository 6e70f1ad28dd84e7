//! Per-resource rate tracking for callgate.
//!
//! A [`RateTracker`] answers one question: may another call to this
//! resource go out now without exceeding its quota? Each resource has a
//! fixed window length and a maximum call count per window.
//!
//! ## Window kinds
//!
//! - [`WindowKind::SlidingLog`] (default): every permitted call is
//!   remembered for one window. No interval of one window length ever holds
//!   more than `max_calls` permitted calls.
//! - [`WindowKind::Fixed`]: the window opens at the first call after the
//!   previous one expired and resets wholesale.
//!
//! ## Authoritative quota data
//!
//! Servers often report the real quota in response headers.
//! [`RateTracker::record_external_header`] replaces the local estimate with
//! that data until the reported reset time.
//!
//! ## Example
//!
//! ```rust
//! use callgate_core::Timestamp;
//! use callgate_ratelimiter::RateTrackerConfig;
//! use std::time::Duration;
//!
//! let mut tracker = RateTrackerConfig::builder()
//!     .limit("brave-search", 1, Duration::from_secs(1800))
//!     .build();
//!
//! let t0 = Timestamp::from_secs(1_000);
//! assert!(tracker.try_consume("brave-search", t0).is_allowed());
//! assert!(!tracker.try_consume("brave-search", t0 + Duration::from_secs(10)).is_allowed());
//! assert!(tracker.try_consume("brave-search", t0 + Duration::from_secs(1800)).is_allowed());
//! ```

mod config;
mod events;
mod tracker;
mod window;

pub use config::{RateTrackerConfig, RateTrackerConfigBuilder};
pub use events::RateEvent;
pub use tracker::RateTracker;
pub use window::{RateDecision, RateState, RateWindow, ResourceLimit, WindowKind};
