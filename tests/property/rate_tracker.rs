//! Property tests for the rate tracker.
//!
//! Invariants tested:
//! - A sliding log never admits more than `max_calls` in any window-length interval
//! - A fixed window never counts more than `max_calls`
//! - Denials report a reset time in the future

use callgate_core::Timestamp;
use callgate_ratelimiter::{RateDecision, RateTrackerConfig, ResourceLimit};
use proptest::prelude::*;
use std::time::Duration;

fn call_times(max_gap: u64) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0..max_gap, 1..200).prop_map(|gaps| {
        gaps.into_iter()
            .scan(0u64, |t, gap| {
                *t += gap;
                Some(*t)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: no window-length interval holds more than max_calls admitted calls
    #[test]
    fn sliding_log_bounds_every_interval(
        max_calls in 1u32..=10,
        window_ms in 100u64..=5_000,
        times in call_times(400),
    ) {
        let mut tracker = RateTrackerConfig::builder()
            .resource("api", ResourceLimit::new(max_calls, Duration::from_millis(window_ms)))
            .build();

        let mut admitted = Vec::new();
        for t in times {
            if tracker.try_consume("api", Timestamp::from_millis(t)).is_allowed() {
                admitted.push(t);
            }
        }

        for (i, start) in admitted.iter().enumerate() {
            let in_window = admitted[i..]
                .iter()
                .take_while(|t| **t < start + window_ms)
                .count();
            prop_assert!(in_window <= max_calls as usize);
        }
    }

    /// Property: the fixed window counter never exceeds max_calls
    #[test]
    fn fixed_window_never_overcounts(
        max_calls in 1u32..=10,
        window_ms in 100u64..=5_000,
        times in call_times(400),
    ) {
        let mut tracker = RateTrackerConfig::builder()
            .resource("api", ResourceLimit::fixed(max_calls, Duration::from_millis(window_ms)))
            .build();

        for t in times {
            let now = Timestamp::from_millis(t);
            let decision = tracker.try_consume("api", now);
            let state = tracker.state("api").unwrap();
            prop_assert!(state.count <= max_calls);
            if let RateDecision::Denied { reset_at } = decision {
                prop_assert!(reset_at > now);
                prop_assert_eq!(state.count, max_calls);
            }
        }
    }

    /// Property: external headers always win over the local estimate
    #[test]
    fn external_header_sets_remaining(
        max_calls in 1u32..=100,
        used in 0u32..=100,
        remaining in 0u32..=200,
    ) {
        let mut tracker = RateTrackerConfig::builder()
            .limit("api", max_calls, Duration::from_secs(60))
            .build();
        let now = Timestamp::from_secs(1);
        for _ in 0..used.min(max_calls) {
            tracker.try_consume("api", now);
        }

        tracker.record_external_header("api", remaining, Timestamp::from_secs(30), now);
        prop_assert_eq!(tracker.remaining("api", now), Some(remaining.min(max_calls)));
    }
}
