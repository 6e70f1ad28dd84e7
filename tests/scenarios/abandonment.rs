use callgate::Clock;
use callgate::{
    BackoffConfig, FailureDisposition, Gate, GateConfig, ManualClock, QueueEntry, ResourceConfig,
};
use callgate_backoff::{BackoffDecision, BackoffPolicy};
use callgate_core::Timestamp;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[test]
fn policy_abandons_on_third_failure() {
    let policy = BackoffPolicy::builder().max_attempts(3).build();

    assert_eq!(
        policy.decide(1, None),
        BackoffDecision::Retry(Duration::from_secs(1))
    );
    assert_eq!(
        policy.decide(2, None),
        BackoffDecision::Retry(Duration::from_secs(2))
    );
    assert_eq!(
        policy.decide(3, Some(Duration::from_secs(5))),
        BackoffDecision::Abandon
    );
}

#[test]
fn gate_moves_entry_to_abandoned_history() {
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let config = GateConfig::default()
        .resource(
            "search",
            ResourceConfig::new(100, Duration::from_secs(60)).failure_threshold(10),
        )
        .backoff(BackoffConfig {
            max_attempts: 3,
            ..BackoffConfig::default()
        });

    let abandoned = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&abandoned);
    let gate: Gate<String> = Gate::builder(config)
        .clock(clock.clone())
        .on_abandoned(move |_, id, reason| {
            seen.lock().unwrap().push((id.to_string(), reason.to_string()));
        })
        .build()
        .unwrap();

    gate.enqueue(QueueEntry::new("job", "search", "query".into(), clock.now()))
        .unwrap();

    for expected_attempts in 1..=2 {
        let entry = gate.pop_eligible().unwrap();
        let disposition = gate.report_failure(entry, None).unwrap();
        let FailureDisposition::Retry {
            earliest_eligible,
            attempts,
        } = disposition
        else {
            panic!("expected a retry, got {disposition:?}");
        };
        assert_eq!(attempts, expected_attempts);
        clock.set(earliest_eligible);
    }

    let entry = gate.pop_eligible().unwrap();
    assert!(gate.report_failure(entry, None).unwrap().is_abandoned());

    clock.advance(Duration::from_secs(3600));
    assert!(gate.pop_eligible().is_none());
    assert_eq!(gate.pending_len(), 0);
    assert_eq!(gate.in_flight_len(), 0);

    let history = gate.abandoned();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].entry.attempts, 3);
    assert_eq!(
        *abandoned.lock().unwrap(),
        vec![(
            "job".to_string(),
            "attempts exhausted after 3 failures".to_string()
        )]
    );
}
