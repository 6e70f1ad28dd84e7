use callgate_core::{ResourceId, Timestamp};
use std::borrow::Borrow;
use std::fmt;

/// Priority given to entries that do not set one. Lower runs sooner.
pub const DEFAULT_PRIORITY: u32 = 5;

/// Caller-supplied identifier of a queue entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for EntryId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A deferred call awaiting its turn.
///
/// Among entries that are eligible, lower `priority` goes first, then
/// earlier `created_at`, then insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueueEntry<P> {
    pub id: EntryId,
    pub resource: ResourceId,
    pub payload: P,
    pub priority: u32,
    pub created_at: Timestamp,
    /// The entry may not be popped before this time.
    pub earliest_eligible: Timestamp,
    /// Failed attempts so far.
    pub attempts: u32,
}

impl<P> QueueEntry<P> {
    /// Creates an entry with the default priority, eligible immediately.
    pub fn new(
        id: impl Into<EntryId>,
        resource: impl Into<ResourceId>,
        payload: P,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            resource: resource.into(),
            payload,
            priority: DEFAULT_PRIORITY,
            created_at: now,
            earliest_eligible: now,
            attempts: 0,
        }
    }

    /// Sets the priority. Lower values run sooner.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Delays eligibility until `at`.
    pub fn eligible_at(mut self, at: Timestamp) -> Self {
        self.earliest_eligible = at;
        self
    }

    /// Whether the entry may run at `now`.
    pub fn is_eligible(&self, now: Timestamp) -> bool {
        self.earliest_eligible <= now
    }
}
