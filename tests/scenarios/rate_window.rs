use callgate::{Admission, Denial, Gate, GateConfig, ManualClock, ResourceConfig};
use callgate_core::Timestamp;
use callgate_ratelimiter::{RateDecision, RateTrackerConfig, ResourceLimit, WindowKind};
use std::time::Duration;

const HALF_HOUR: Duration = Duration::from_secs(1800);

fn run_scenario(limit: ResourceLimit) {
    let mut tracker = RateTrackerConfig::builder()
        .resource("brave-search", limit)
        .build();
    let start = Timestamp::from_secs(10_000);

    assert!(tracker.try_consume("brave-search", start).is_allowed());
    assert_eq!(
        tracker.try_consume("brave-search", start + Duration::from_secs(10)),
        RateDecision::Denied {
            reset_at: start + HALF_HOUR
        }
    );
    assert!(tracker
        .try_consume("brave-search", start + HALF_HOUR)
        .is_allowed());
}

#[test]
fn sliding_log_one_call_per_half_hour() {
    run_scenario(ResourceLimit::new(1, HALF_HOUR));
}

#[test]
fn fixed_window_one_call_per_half_hour() {
    run_scenario(ResourceLimit::fixed(1, HALF_HOUR));
}

#[test]
fn gate_reports_the_window_reset() {
    let clock = ManualClock::new(Timestamp::from_secs(10_000));
    let config = GateConfig::default().resource(
        "brave-search",
        ResourceConfig::new(1, HALF_HOUR).window_kind(WindowKind::Fixed),
    );
    let gate: Gate<()> = Gate::builder(config).clock(clock.clone()).build().unwrap();

    assert_eq!(gate.acquire("brave-search").unwrap(), Admission::Granted);
    clock.advance(Duration::from_secs(10));
    assert_eq!(
        gate.acquire("brave-search").unwrap(),
        Admission::Denied(Denial::Rate {
            reset_at: Timestamp::from_secs(11_800)
        })
    );
    clock.set(Timestamp::from_secs(11_800));
    assert_eq!(gate.acquire("brave-search").unwrap(), Admission::Granted);
}

#[test]
fn unconfigured_resource_is_never_allowed() {
    let mut tracker = RateTrackerConfig::builder().build();
    assert_eq!(
        tracker.try_consume("unknown", Timestamp::from_secs(0)),
        RateDecision::Unconfigured
    );
}
