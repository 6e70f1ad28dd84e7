use callgate::Clock;
use callgate::{
    Admission, CallError, Gate, GateConfig, GateLayer, ManualClock, QueueEntry, ResourceConfig,
    Timestamp,
};
use std::time::Duration;
use tower::{Layer, Service, ServiceBuilder, ServiceExt};

fn gate(clock: &ManualClock) -> Gate<String> {
    let config = GateConfig::default().resource(
        "search",
        ResourceConfig::new(3, Duration::from_secs(60))
            .failure_threshold(2)
            .cool_down(Duration::from_secs(10)),
    );
    Gate::builder(config).clock(clock.clone()).build().unwrap()
}

#[tokio::test]
async fn layer_and_gate_share_one_quota() {
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let gate = gate(&clock);

    let mut service = ServiceBuilder::new()
        .layer(GateLayer::new(&gate, "search").unwrap())
        .service(tower::service_fn(|q: &'static str| async move {
            Ok::<_, std::io::Error>(q.len())
        }));

    assert_eq!(service.ready().await.unwrap().call("rust").await.unwrap(), 4);
    assert_eq!(gate.acquire("search").unwrap(), Admission::Granted);
    assert_eq!(service.ready().await.unwrap().call("tower").await.unwrap(), 5);

    let err = service.ready().await.unwrap().call("tokio").await.unwrap_err();
    assert!(matches!(
        err,
        CallError::DeniedByRate {
            reset_at: Some(at),
            ..
        } if at == Timestamp::from_secs(60)
    ));

    // A queued entry for the same resource waits for the shared window.
    let earliest = gate
        .submit(QueueEntry::new("later", "search", "serde".into(), clock.now()))
        .unwrap();
    assert_eq!(earliest, Timestamp::from_secs(60));
}

#[tokio::test]
async fn layer_failures_trip_circuit_for_queued_work() {
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let gate = gate(&clock);
    let mut service = GateLayer::new(&gate, "search")
        .unwrap()
        .layer(tower::service_fn(|_: ()| async {
            Err::<(), _>(std::io::Error::other("upstream 502"))
        }));

    for _ in 0..2 {
        let err = service.ready().await.unwrap().call(()).await.unwrap_err();
        assert!(matches!(err, CallError::External(_)));
    }

    let err = service.ready().await.unwrap().call(()).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(err.retry_at(), Some(Timestamp::from_secs(10)));
    assert!(gate.acquire("search").unwrap().denial().is_some());
}
