use crate::entry::QueueEntry;
use callgate_core::Timestamp;
use std::collections::VecDeque;

/// Capacity used when none is configured.
pub const DEFAULT_HISTORY_CAPACITY: usize = 10;

/// An entry that reached a terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HistoryRecord<P> {
    pub entry: QueueEntry<P>,
    pub finished_at: Timestamp,
    /// Why the entry was abandoned. `None` for processed entries.
    #[cfg_attr(feature = "serde", serde(default))]
    pub reason: Option<String>,
}

/// The most recent terminal records, oldest first.
#[derive(Debug, Clone)]
pub(crate) struct History<P> {
    records: VecDeque<HistoryRecord<P>>,
    capacity: usize,
}

impl<P> History<P> {
    /// The latest settled record is always kept, so capacity is at least 1.
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Appends a record, returning the one evicted to stay within capacity.
    pub(crate) fn push(&mut self, record: HistoryRecord<P>) -> Option<HistoryRecord<P>> {
        let evicted = if self.records.len() >= self.capacity {
            self.records.pop_front()
        } else {
            None
        };
        self.records.push_back(record);
        evicted
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.entry.id.as_str() == id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &HistoryRecord<P>> {
        self.records.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
    }
}
