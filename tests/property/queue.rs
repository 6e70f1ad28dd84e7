//! Property tests for the request queue.
//!
//! Invariants tested:
//! - Popped entries are eligible and the best eligible by (priority, created_at)
//! - An id lives in at most one of pending, in flight, processed, abandoned,
//!   and a popped or settled id lives in exactly one
//! - Deferring never counts an attempt; requeueing always does

use callgate_core::Timestamp;
use callgate_queue::{EntryId, QueueEntry, RequestQueue, RequestQueueConfig};
use proptest::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone)]
enum Op {
    Enqueue { id: u8, priority: u32, delay: u64 },
    Pop,
    Complete,
    Abandon,
    Requeue { delay: u64 },
    Defer { delay: u64 },
    Cancel { id: u8 },
    Advance { by: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0u8..16, 0u32..4, 0u64..50).prop_map(|(id, priority, delay)| Op::Enqueue { id, priority, delay }),
        3 => Just(Op::Pop),
        1 => Just(Op::Complete),
        1 => Just(Op::Abandon),
        1 => (0u64..50).prop_map(|delay| Op::Requeue { delay }),
        1 => (0u64..50).prop_map(|delay| Op::Defer { delay }),
        1 => (0u8..16).prop_map(|id| Op::Cancel { id }),
        2 => (0u64..30).prop_map(|by| Op::Advance { by }),
    ]
}

fn locations(queue: &RequestQueue<()>, id: &str) -> usize {
    [
        queue.is_pending(id),
        queue.is_in_flight(id),
        queue.processed().any(|r| r.entry.id.as_str() == id),
        queue.abandoned().any(|r| r.entry.id.as_str() == id),
    ]
    .into_iter()
    .filter(|found| *found)
    .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: pop_eligible returns the best eligible entry, or none when none is eligible
    #[test]
    fn popped_entries_are_best_eligible(
        entries in prop::collection::vec((0u32..5, 0u64..100, 0u64..100), 1..40),
        now in 0u64..200,
    ) {
        let mut queue = RequestQueue::default();
        for (i, (priority, created, delay)) in entries.iter().enumerate() {
            let created_at = Timestamp::from_millis(*created);
            let entry = QueueEntry::new(format!("e{i}"), "api", (), created_at)
                .with_priority(*priority)
                .eligible_at(created_at + Duration::from_millis(*delay));
            queue.enqueue(entry).unwrap();
        }

        let now = Timestamp::from_millis(now);
        let best = queue
            .pending()
            .filter(|e| e.is_eligible(now))
            .map(|e| (e.priority, e.created_at))
            .min();

        match queue.pop_eligible(now) {
            Some(entry) => {
                prop_assert!(entry.is_eligible(now));
                prop_assert_eq!(Some((entry.priority, entry.created_at)), best);
            }
            None => prop_assert!(best.is_none()),
        }
    }

    /// Property: every id is in at most one location after any sequence of operations
    #[test]
    fn ids_never_in_two_places(ops in prop::collection::vec(op(), 1..120)) {
        let mut queue: RequestQueue<()> = RequestQueueConfig::builder()
            .history_capacity(64)
            .build();
        let mut now = Timestamp::from_secs(0);
        let mut in_hand: Vec<QueueEntry<()>> = Vec::new();
        // The history holds more than the 16 ids, so nothing settled is evicted.
        let mut settled: Vec<EntryId> = Vec::new();

        for op in ops {
            match op {
                Op::Enqueue { id, priority, delay } => {
                    let entry = QueueEntry::new(format!("e{id}"), "api", (), now)
                        .with_priority(priority)
                        .eligible_at(now + Duration::from_millis(delay));
                    let known = queue.contains(entry.id.as_str());
                    prop_assert_eq!(queue.enqueue(entry).is_err(), known);
                }
                Op::Pop => {
                    if let Some(entry) = queue.pop_eligible(now) {
                        prop_assert!(entry.is_eligible(now));
                        in_hand.push(entry);
                    }
                }
                Op::Complete => {
                    if let Some(entry) = in_hand.pop() {
                        settled.push(entry.id.clone());
                        queue.complete(entry, now).unwrap();
                    }
                }
                Op::Abandon => {
                    if let Some(entry) = in_hand.pop() {
                        settled.push(entry.id.clone());
                        queue.abandon(entry, "gave up", now).unwrap();
                    }
                }
                Op::Requeue { delay } => {
                    if let Some(entry) = in_hand.pop() {
                        let (id, attempts) = (entry.id.clone(), entry.attempts);
                        queue.requeue(entry, now + Duration::from_millis(delay), now).unwrap();
                        let pending = queue.pending().find(|e| e.id == id).unwrap();
                        prop_assert_eq!(pending.attempts, attempts + 1);
                    }
                }
                Op::Defer { delay } => {
                    if let Some(entry) = in_hand.pop() {
                        let (id, attempts) = (entry.id.clone(), entry.attempts);
                        queue.defer(entry, now + Duration::from_millis(delay), now).unwrap();
                        let pending = queue.pending().find(|e| e.id == id).unwrap();
                        prop_assert_eq!(pending.attempts, attempts);
                    }
                }
                Op::Cancel { id } => {
                    let id = format!("e{id}");
                    let was_pending = queue.is_pending(&id);
                    prop_assert_eq!(queue.cancel(&id, now).is_some(), was_pending);
                }
                Op::Advance { by } => now = now + Duration::from_millis(by),
            }

            for id in 0..16 {
                let key = format!("e{id}");
                prop_assert!(locations(&queue, &key) <= 1);
            }
            for id in settled.iter().chain(in_hand.iter().map(|e| &e.id)) {
                prop_assert_eq!(locations(&queue, id.as_str()), 1);
            }
            prop_assert_eq!(queue.in_flight_len(), in_hand.len());
        }
    }
}
