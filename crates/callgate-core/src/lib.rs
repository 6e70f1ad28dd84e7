//! Core infrastructure for callgate.
//!
//! This crate provides functionality shared across the callgate components:
//! - Wall-clock [`Timestamp`]s and the [`Clock`] abstraction
//! - [`ResourceId`], the key every piece of per-resource state hangs off
//! - Event system for observability
//! - [`CallError`], the outcome taxonomy for gated calls

pub mod error;
pub mod events;
pub mod resource;
pub mod time;

pub use error::CallError;
pub use events::{EventListener, EventListeners, FnListener, GateEvent};
pub use resource::ResourceId;
pub use time::{Clock, ManualClock, SystemClock, Timestamp};
