//! Property tests for the circuit breaker.
//!
//! Invariants tested:
//! - Opens exactly when consecutive failures reach the threshold
//! - Half-open admits a single trial until its outcome is reported
//! - The trial outcome decides between closed and open

use callgate_circuitbreaker::{CircuitBreakerConfig, CircuitState};
use callgate_core::Timestamp;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the circuit opens on the threshold-th consecutive failure
    #[test]
    fn opens_at_threshold(threshold in 1u32..=10, failures in 0u32..=20) {
        let mut breaker = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .build();
        let now = Timestamp::from_secs(0);

        for _ in 0..failures {
            breaker.report("api", false, now);
        }

        let expected = if failures >= threshold {
            CircuitState::Open
        } else {
            CircuitState::Closed
        };
        prop_assert_eq!(breaker.state("api"), expected);
    }

    /// Property: a success in between resets the failure streak
    #[test]
    fn success_resets_streak(threshold in 2u32..=10, before in 1u32..=9) {
        prop_assume!(before < threshold);
        let mut breaker = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .build();
        let now = Timestamp::from_secs(0);

        for _ in 0..before {
            breaker.report("api", false, now);
        }
        breaker.report("api", true, now);
        for _ in 0..threshold - 1 {
            breaker.report("api", false, now);
        }
        prop_assert_eq!(breaker.state("api"), CircuitState::Closed);
    }

    /// Property: exactly one trial is permitted while half-open
    #[test]
    fn single_half_open_trial(
        threshold in 1u32..=5,
        cool_down_ms in 1u64..=60_000,
        attempts in 1usize..=20,
        trial_succeeds: bool,
    ) {
        let mut breaker = CircuitBreakerConfig::builder()
            .failure_threshold(threshold)
            .cool_down(Duration::from_millis(cool_down_ms))
            .build();
        let start = Timestamp::from_secs(100);
        for _ in 0..threshold {
            breaker.report("api", false, start);
        }
        prop_assert!(!breaker.permit("api", start));

        let later = start + Duration::from_millis(cool_down_ms);
        let granted = (0..attempts).filter(|_| breaker.permit("api", later)).count();
        prop_assert_eq!(granted, 1);
        prop_assert_eq!(breaker.state("api"), CircuitState::HalfOpen);

        breaker.report("api", trial_succeeds, later);
        let expected = if trial_succeeds {
            CircuitState::Closed
        } else {
            CircuitState::Open
        };
        prop_assert_eq!(breaker.state("api"), expected);
    }
}
