//! Rate tracker metrics regression tests

use super::helpers::*;
use callgate_core::Timestamp;
use callgate_ratelimiter::RateTrackerConfig;
use serial_test::serial;
use std::time::Duration;

#[test]
#[serial]
fn rate_permit_metrics_exist() {
    init_recorder();

    let mut tracker = RateTrackerConfig::builder()
        .name("metrics")
        .limit("rate-metrics", 1, Duration::from_secs(60))
        .build();
    let now = Timestamp::from_secs(0);
    tracker.try_consume("rate-metrics", now);
    tracker.try_consume("rate-metrics", now);

    assert_counter_exists("callgate_rate_permits_total");
    assert_metric_has_label("callgate_rate_permits_total", "resource", "rate-metrics");
    assert_metric_has_label("callgate_rate_permits_total", "outcome", "acquired");
    assert_metric_has_label("callgate_rate_permits_total", "outcome", "rejected");
}
