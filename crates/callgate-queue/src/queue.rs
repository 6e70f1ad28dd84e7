use crate::config::RequestQueueConfig;
use crate::entry::{EntryId, QueueEntry};
use crate::error::QueueError;
use crate::events::QueueEvent;
use crate::history::{History, HistoryRecord};
use callgate_core::events::EventListeners;
use callgate_core::{ResourceId, Timestamp};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct OrderKey {
    priority: u32,
    created_at: Timestamp,
    seq: u64,
}

/// Persisted contents of a queue.
///
/// Entries that were in flight when the snapshot was taken are owned by the
/// caller and are not included.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct QueueSnapshot<P> {
    /// Pending entries in pop order.
    pub pending: Vec<QueueEntry<P>>,
    pub processed: Vec<HistoryRecord<P>>,
    pub abandoned: Vec<HistoryRecord<P>>,
}

impl<P> Default for QueueSnapshot<P> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            processed: Vec::new(),
            abandoned: Vec::new(),
        }
    }
}

/// Priority-ordered queue of deferred calls with delayed eligibility.
///
/// Every entry id lives in exactly one place: pending, in flight (popped
/// and not yet settled), the processed history, or the abandoned history.
/// Histories are bounded; once a record is evicted its id may be reused.
pub struct RequestQueue<P> {
    pending: BTreeMap<OrderKey, QueueEntry<P>>,
    index: HashMap<EntryId, OrderKey>,
    in_flight: HashSet<EntryId>,
    processed: History<P>,
    abandoned: History<P>,
    next_seq: u64,
    event_listeners: EventListeners<QueueEvent>,
    name: String,
}

impl<P> RequestQueue<P> {
    pub(crate) fn new(config: RequestQueueConfig) -> Self {
        Self {
            pending: BTreeMap::new(),
            index: HashMap::new(),
            in_flight: HashSet::new(),
            processed: History::new(config.history_capacity),
            abandoned: History::new(config.history_capacity),
            next_seq: 0,
            event_listeners: config.event_listeners,
            name: config.name,
        }
    }

    /// Name of this queue.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of pending entries.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Number of entries popped and not yet settled.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn is_in_flight(&self, id: &str) -> bool {
        self.in_flight.contains(id)
    }

    /// Whether `id` is pending, in flight, or in either history.
    pub fn contains(&self, id: &str) -> bool {
        self.is_pending(id)
            || self.is_in_flight(id)
            || self.processed.contains(id)
            || self.abandoned.contains(id)
    }

    /// Pending entries in pop order, ignoring eligibility.
    pub fn pending(&self) -> impl Iterator<Item = &QueueEntry<P>> {
        self.pending.values()
    }

    /// Ids popped and not yet settled, in no particular order.
    pub fn in_flight(&self) -> impl Iterator<Item = &EntryId> {
        self.in_flight.iter()
    }

    /// Processed records, oldest first.
    pub fn processed(&self) -> impl Iterator<Item = &HistoryRecord<P>> {
        self.processed.iter()
    }

    /// Abandoned records, oldest first.
    pub fn abandoned(&self) -> impl Iterator<Item = &HistoryRecord<P>> {
        self.abandoned.iter()
    }

    /// Earliest time any pending entry becomes eligible.
    pub fn next_eligible_at(&self) -> Option<Timestamp> {
        self.pending.values().map(|e| e.earliest_eligible).min()
    }

    /// Adds a new entry.
    ///
    /// Fails if an entry with the same id is already known to the queue.
    pub fn enqueue(&mut self, entry: QueueEntry<P>) -> Result<(), QueueError> {
        if self.contains(entry.id.as_str()) {
            return Err(QueueError::DuplicateId(entry.id));
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            queue = %self.name,
            resource = %entry.resource,
            entry = %entry.id,
            priority = entry.priority,
            earliest_eligible = %entry.earliest_eligible,
            "entry enqueued"
        );

        self.event_listeners.emit(&QueueEvent::Enqueued {
            resource: entry.resource.clone(),
            entry_id: entry.id.clone(),
            timestamp: entry.created_at,
            earliest_eligible: entry.earliest_eligible,
        });
        record_outcome(&entry.resource, "enqueued");

        self.insert(entry);
        Ok(())
    }

    /// Removes and returns the best entry eligible at `now`.
    ///
    /// The entry is in flight until it is passed back to [`requeue`],
    /// [`defer`], [`complete`] or [`abandon`].
    ///
    /// [`requeue`]: Self::requeue
    /// [`defer`]: Self::defer
    /// [`complete`]: Self::complete
    /// [`abandon`]: Self::abandon
    pub fn pop_eligible(&mut self, now: Timestamp) -> Option<QueueEntry<P>> {
        let key = self.index.get(self.peek_eligible(now)?.id.as_str()).copied()?;
        let entry = self.pending.remove(&key)?;
        self.index.remove(entry.id.as_str());
        self.in_flight.insert(entry.id.clone());

        self.event_listeners.emit(&QueueEvent::Popped {
            resource: entry.resource.clone(),
            entry_id: entry.id.clone(),
            timestamp: now,
        });
        Some(entry)
    }

    /// The entry [`pop_eligible`](Self::pop_eligible) would return at `now`,
    /// left in place.
    pub fn peek_eligible(&self, now: Timestamp) -> Option<&QueueEntry<P>> {
        self.pending.values().find(|entry| entry.is_eligible(now))
    }

    /// Returns a failed in-flight entry to the queue.
    ///
    /// Counts the failure and delays the entry until `earliest_eligible`.
    pub fn requeue(
        &mut self,
        mut entry: QueueEntry<P>,
        earliest_eligible: Timestamp,
        now: Timestamp,
    ) -> Result<(), QueueError> {
        self.settle(&entry.id)?;
        entry.attempts = entry.attempts.saturating_add(1);
        entry.earliest_eligible = earliest_eligible;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            queue = %self.name,
            resource = %entry.resource,
            entry = %entry.id,
            attempts = entry.attempts,
            %earliest_eligible,
            "entry requeued"
        );

        self.event_listeners.emit(&QueueEvent::Requeued {
            resource: entry.resource.clone(),
            entry_id: entry.id.clone(),
            timestamp: now,
            attempts: entry.attempts,
            earliest_eligible,
        });
        record_outcome(&entry.resource, "requeued");

        self.insert(entry);
        Ok(())
    }

    /// Returns an in-flight entry that was refused before it ran.
    ///
    /// Unlike [`requeue`](Self::requeue) this does not count an attempt.
    pub fn defer(
        &mut self,
        mut entry: QueueEntry<P>,
        earliest_eligible: Timestamp,
        now: Timestamp,
    ) -> Result<(), QueueError> {
        self.settle(&entry.id)?;
        entry.earliest_eligible = earliest_eligible;

        self.event_listeners.emit(&QueueEvent::Deferred {
            resource: entry.resource.clone(),
            entry_id: entry.id.clone(),
            timestamp: now,
            earliest_eligible,
        });

        self.insert(entry);
        Ok(())
    }

    /// Moves a succeeded in-flight entry to the processed history.
    ///
    /// Returns the record evicted to keep the history bounded, if any.
    pub fn complete(
        &mut self,
        entry: QueueEntry<P>,
        now: Timestamp,
    ) -> Result<Option<HistoryRecord<P>>, QueueError> {
        self.settle(&entry.id)?;

        self.event_listeners.emit(&QueueEvent::Completed {
            resource: entry.resource.clone(),
            entry_id: entry.id.clone(),
            timestamp: now,
        });
        record_outcome(&entry.resource, "completed");

        Ok(self.processed.push(HistoryRecord {
            entry,
            finished_at: now,
            reason: None,
        }))
    }

    /// Moves a failed in-flight entry to the abandoned history.
    ///
    /// Returns the record evicted to keep the history bounded, if any.
    pub fn abandon(
        &mut self,
        entry: QueueEntry<P>,
        reason: impl Into<String>,
        now: Timestamp,
    ) -> Result<Option<HistoryRecord<P>>, QueueError> {
        self.settle(&entry.id)?;
        let reason = reason.into();

        #[cfg(feature = "tracing")]
        tracing::warn!(
            queue = %self.name,
            resource = %entry.resource,
            entry = %entry.id,
            attempts = entry.attempts,
            %reason,
            "entry abandoned"
        );

        self.event_listeners.emit(&QueueEvent::Abandoned {
            resource: entry.resource.clone(),
            entry_id: entry.id.clone(),
            timestamp: now,
            attempts: entry.attempts,
            reason: reason.clone(),
        });
        record_outcome(&entry.resource, "abandoned");

        Ok(self.abandoned.push(HistoryRecord {
            entry,
            finished_at: now,
            reason: Some(reason),
        }))
    }

    /// Removes a pending entry. In-flight and settled entries are untouched.
    pub fn cancel(&mut self, id: &str, now: Timestamp) -> Option<QueueEntry<P>> {
        let key = self.index.remove(id)?;
        let entry = self.pending.remove(&key)?;

        self.event_listeners.emit(&QueueEvent::Cancelled {
            resource: entry.resource.clone(),
            entry_id: entry.id.clone(),
            timestamp: now,
        });
        record_outcome(&entry.resource, "cancelled");

        Some(entry)
    }

    /// Copies pending entries and both histories.
    pub fn snapshot(&self) -> QueueSnapshot<P>
    where
        P: Clone,
    {
        QueueSnapshot {
            pending: self.pending.values().cloned().collect(),
            processed: self.processed.iter().cloned().collect(),
            abandoned: self.abandoned.iter().cloned().collect(),
        }
    }

    /// Replaces pending entries and histories with persisted ones.
    ///
    /// In-flight entries are kept. Entries whose id is already in flight, or
    /// appears twice in the snapshot, are skipped. Returns how many entries
    /// and records were skipped.
    pub fn restore(&mut self, snapshot: QueueSnapshot<P>) -> usize {
        self.pending.clear();
        self.index.clear();
        self.processed.clear();
        self.abandoned.clear();

        let mut skipped = 0;
        for record in snapshot.processed {
            if self.contains(record.entry.id.as_str()) {
                skipped += 1;
            } else {
                self.processed.push(record);
            }
        }
        for record in snapshot.abandoned {
            if self.contains(record.entry.id.as_str()) {
                skipped += 1;
            } else {
                self.abandoned.push(record);
            }
        }
        for entry in snapshot.pending {
            if self.contains(entry.id.as_str()) {
                skipped += 1;
            } else {
                self.insert(entry);
            }
        }

        #[cfg(feature = "tracing")]
        {
            if skipped > 0 {
                tracing::warn!(queue = %self.name, skipped, "duplicate entries skipped on restore");
            }
        }
        skipped
    }

    fn insert(&mut self, entry: QueueEntry<P>) {
        let key = OrderKey {
            priority: entry.priority,
            created_at: entry.created_at,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.index.insert(entry.id.clone(), key);
        self.pending.insert(key, entry);
    }

    fn settle(&mut self, id: &EntryId) -> Result<(), QueueError> {
        if self.in_flight.remove(id.as_str()) {
            Ok(())
        } else {
            Err(QueueError::NotInFlight(id.clone()))
        }
    }
}

impl<P> Default for RequestQueue<P> {
    fn default() -> Self {
        RequestQueueConfig::builder().build()
    }
}

impl<P> std::fmt::Debug for RequestQueue<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("name", &self.name)
            .field("pending", &self.pending.len())
            .field("in_flight", &self.in_flight.len())
            .field("processed", &self.processed.len())
            .field("abandoned", &self.abandoned.len())
            .finish()
    }
}

#[cfg(feature = "metrics")]
fn record_outcome(resource: &ResourceId, outcome: &'static str) {
    counter!("callgate_queue_entries_total", "resource" => resource.to_string(), "outcome" => outcome)
        .increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_outcome(_resource: &ResourceId, _outcome: &'static str) {}
