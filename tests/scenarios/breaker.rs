use callgate_circuitbreaker::{CircuitBreakerConfig, CircuitState};
use callgate_core::{ResourceId, Timestamp};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn three_strikes_then_single_trial() {
    let transitions = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&transitions);
    let mut breaker = CircuitBreakerConfig::builder()
        .failure_threshold(3)
        .cool_down(Duration::from_secs(30))
        .on_state_transition(move |_: &ResourceId, from, to| {
            seen.lock().unwrap().push((from, to));
        })
        .build();
    let t0 = Timestamp::from_secs(0);

    for i in 0..3 {
        assert!(breaker.permit("github", t0));
        breaker.report("github", false, t0 + Duration::from_secs(i));
    }
    assert_eq!(breaker.state("github"), CircuitState::Open);
    assert!(!breaker.permit("github", t0 + Duration::from_secs(10)));

    let after_cool_down = t0 + Duration::from_secs(32);
    assert!(breaker.permit("github", after_cool_down));
    assert_eq!(breaker.state("github"), CircuitState::HalfOpen);
    assert!(!breaker.permit("github", after_cool_down));

    breaker.report("github", true, after_cool_down);
    assert_eq!(breaker.state("github"), CircuitState::Closed);
    assert!(breaker.permit("github", after_cool_down));

    assert_eq!(
        *transitions.lock().unwrap(),
        vec![
            (CircuitState::Closed, CircuitState::Open),
            (CircuitState::Open, CircuitState::HalfOpen),
            (CircuitState::HalfOpen, CircuitState::Closed),
        ]
    );
}

#[test]
fn failed_trial_restarts_cool_down() {
    let mut breaker = CircuitBreakerConfig::builder()
        .failure_threshold(3)
        .cool_down(Duration::from_secs(30))
        .build();
    for _ in 0..3 {
        breaker.report("github", false, Timestamp::from_secs(0));
    }

    let trial_at = Timestamp::from_secs(30);
    assert!(breaker.permit("github", trial_at));
    breaker.report("github", false, trial_at);
    assert_eq!(breaker.state("github"), CircuitState::Open);
    assert_eq!(breaker.retry_at("github"), Some(Timestamp::from_secs(60)));

    assert!(!breaker.permit("github", Timestamp::from_secs(59)));
    assert!(breaker.permit("github", Timestamp::from_secs(60)));
}

#[test]
fn resources_trip_independently() {
    let mut breaker = CircuitBreakerConfig::builder().failure_threshold(1).build();
    breaker.report("github", false, Timestamp::from_secs(0));

    assert_eq!(breaker.state("github"), CircuitState::Open);
    assert_eq!(breaker.state("search"), CircuitState::Closed);
    assert!(breaker.permit("search", Timestamp::from_secs(0)));
}
