//! Rate-limited request gate with circuit breaking, backoff and a deferred
//! retry queue.
//!
//! A [`Gate`] guards a fixed set of named external resources. Before calling
//! a resource, ask [`Gate::acquire`]; the answer comes from the resource's
//! rate window and its circuit breaker. Calls that cannot run now go into
//! the gate's queue with an earliest-eligible time, and a [`Dispatcher`]
//! retries them when they come due, backing off after failures and
//! abandoning entries once the attempts run out.
//!
//! ```text
//!  submit ──► queue ──► pop_eligible ──► acquire ──┬─ denied ──► defer
//!                ▲                                  │
//!                │                                  └─ granted ──► call
//!                │                                                  │
//!                └──── requeue (backoff) ◄── failure ◄──────────────┤
//!                                              │                    │
//!                                  abandoned ◄─┘       processed ◄──┘
//! ```
//!
//! The pieces are also usable on their own:
//!
//! - [`ratelimiter`]: fixed and sliding-log windows per resource
//! - [`circuitbreaker`]: consecutive-failure breaker with a single
//!   half-open trial
//! - [`backoff`]: retry timing and `Retry-After` parsing
//! - [`queue`]: priority queue of deferred calls with bounded histories
//!
//! # Example
//!
//! ```rust
//! use callgate::{Admission, Gate, GateConfig, QueueEntry, ResourceConfig};
//! use std::time::Duration;
//!
//! let config = GateConfig::default()
//!     .resource("search", ResourceConfig::new(1, Duration::from_secs(1800)));
//! let gate: Gate<String> = Gate::builder(config).name("agent").build().unwrap();
//!
//! assert_eq!(gate.acquire("search").unwrap(), Admission::Granted);
//!
//! // The quota is spent, so a second call is queued for the next window.
//! let denial = gate.acquire("search").unwrap().denial().unwrap();
//! let entry = QueueEntry::new("q-2", "search", "tower layers".to_string(), gate.now());
//! let earliest = gate.submit(entry).unwrap();
//! assert_eq!(Some(earliest), denial.retry_at());
//! ```
//!
//! # Persistence
//!
//! With a [`StateStore`] configured, [`Gate::persist`] saves rate windows,
//! circuits and queues, and [`Gate::restore`] loads them after a restart.
//! [`JsonFileStore`] keeps them in one JSON file.
//!
//! # Feature Flags
//!
//! - `tracing` (default): log denials, transitions and abandonment
//! - `metrics`: export counters and gauges through the `metrics` crate

mod config;
mod dispatcher;
mod error;
mod gate;
mod lane;
mod layer;
mod serde_millis;
mod store;

pub use config::{BackoffConfig, GateConfig, ResourceConfig};
pub use dispatcher::{Dispatch, Dispatcher, Quota, TickReport};
pub use error::{ConfigError, Denial, GateError, StoreError};
pub use gate::{Admission, FailureDisposition, Gate, GateBuilder};
pub use layer::{GateLayer, GateService};
pub use store::{GateSnapshot, JsonFileStore, MemoryStore, StateStore};

pub use callgate_core::{CallError, Clock, ManualClock, ResourceId, SystemClock, Timestamp};
pub use callgate_queue::{EntryId, HistoryRecord, QueueEntry, DEFAULT_PRIORITY};

pub use callgate_backoff as backoff;
pub use callgate_circuitbreaker as circuitbreaker;
pub use callgate_core as core;
pub use callgate_queue as queue;
pub use callgate_ratelimiter as ratelimiter;
