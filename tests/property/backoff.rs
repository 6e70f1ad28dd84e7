//! Property tests for the backoff policy.
//!
//! Invariants tested:
//! - Exponential waits never decrease and never exceed the cap
//! - A hint wins over the computed wait before the attempt limit
//! - Reaching the attempt limit abandons, hint or not
//! - Jittered waits stay within their randomization band

use callgate_backoff::{
    parse_retry_after, BackoffDecision, BackoffPolicy, ExponentialRandomBackoff, IntervalFunction,
};
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: waits grow monotonically up to the cap
    #[test]
    fn exponential_waits_are_monotonic(
        base_ms in 1u64..=5_000,
        cap_ms in 5_000u64..=600_000,
        max_attempts in 2u32..=40,
    ) {
        let cap = Duration::from_millis(cap_ms);
        let policy = BackoffPolicy::builder()
            .max_attempts(max_attempts)
            .exponential(Duration::from_millis(base_ms), cap)
            .build();

        let mut previous = Duration::ZERO;
        for attempts in 1..max_attempts {
            let wait = policy.decide(attempts, None).wait().unwrap();
            prop_assert!(wait >= previous);
            prop_assert!(wait <= cap);
            previous = wait;
        }
        prop_assert_eq!(policy.decide(1, None), BackoffDecision::Retry(Duration::from_millis(base_ms)));
    }

    /// Property: hints win until the attempt limit, then abandonment wins
    #[test]
    fn hint_precedence(
        max_attempts in 1u32..=10,
        attempts in 1u32..=20,
        hint_secs in 0u64..=3_600,
    ) {
        let policy = BackoffPolicy::builder().max_attempts(max_attempts).build();
        let hint = Duration::from_secs(hint_secs);

        let decision = policy.decide(attempts, Some(hint));
        if attempts >= max_attempts {
            prop_assert_eq!(decision, BackoffDecision::Abandon);
        } else {
            prop_assert_eq!(decision, BackoffDecision::Retry(hint));
        }
    }

    /// Property: jitter stays within the randomization factor around the base curve
    #[test]
    fn jitter_within_band(
        base_ms in 10u64..=1_000,
        factor in 0.0f64..=1.0,
        attempt in 0u32..=6,
    ) {
        let backoff = ExponentialRandomBackoff::new(Duration::from_millis(base_ms), factor)
            .max_interval(Duration::from_secs(3_600));
        let center = base_ms as f64 * 2f64.powi(attempt as i32);
        let wait = backoff.next_interval(attempt).as_secs_f64() * 1_000.0;

        prop_assert!(wait >= center * (1.0 - factor) - 1.0);
        prop_assert!(wait <= center * (1.0 + factor) + 1.0);
    }

    /// Property: delta-seconds header values parse back to the same duration
    #[test]
    fn retry_after_seconds(secs in 0u64..=86_400) {
        prop_assert_eq!(parse_retry_after(&secs.to_string()), Some(Duration::from_secs(secs)));
    }
}
