//! Deferred retry queue for callgate.
//!
//! A [`RequestQueue`] holds calls that could not run yet. Each entry has a
//! priority (lower runs sooner) and an earliest-eligible time;
//! [`RequestQueue::pop_eligible`] hands out the best entry whose time has
//! come, breaking ties by creation time and then insertion order.
//!
//! A popped entry is *in flight* until the caller settles it:
//!
//! | Outcome                       | Call                          |
//! |-------------------------------|-------------------------------|
//! | failed, will retry            | [`RequestQueue::requeue`]     |
//! | refused before running        | [`RequestQueue::defer`]       |
//! | succeeded                     | [`RequestQueue::complete`]    |
//! | failed for good               | [`RequestQueue::abandon`]     |
//!
//! Completed and abandoned entries are kept in bounded histories (ten
//! records each by default).
//!
//! ```rust
//! use callgate_core::Timestamp;
//! use callgate_queue::{QueueEntry, RequestQueue};
//! use std::time::Duration;
//!
//! let mut queue = RequestQueue::default();
//! let now = Timestamp::from_secs(0);
//!
//! queue.enqueue(QueueEntry::new("job-1", "search", "rust", now)).unwrap();
//! let entry = queue.pop_eligible(now).unwrap();
//! queue.requeue(entry, now + Duration::from_secs(30), now).unwrap();
//!
//! assert!(queue.pop_eligible(now).is_none());
//! let entry = queue.pop_eligible(now + Duration::from_secs(30)).unwrap();
//! assert_eq!(entry.attempts, 1);
//! queue.complete(entry, now + Duration::from_secs(31)).unwrap();
//! assert_eq!(queue.processed().count(), 1);
//! ```

mod config;
mod entry;
mod error;
mod events;
mod history;
mod queue;

pub use config::{RequestQueueConfig, RequestQueueConfigBuilder};
pub use entry::{EntryId, QueueEntry, DEFAULT_PRIORITY};
pub use error::QueueError;
pub use events::QueueEvent;
pub use history::{HistoryRecord, DEFAULT_HISTORY_CAPACITY};
pub use queue::{QueueSnapshot, RequestQueue};
