use callgate::Clock;
use callgate::circuitbreaker::CircuitState;
use callgate::{
    Gate, GateConfig, JsonFileStore, ManualClock, QueueEntry, ResourceConfig, StateStore,
    Timestamp,
};
use std::time::Duration;

fn config() -> GateConfig {
    GateConfig::default()
        .resource("search", ResourceConfig::new(1, Duration::from_secs(1800)))
        .resource(
            "github",
            ResourceConfig::new(100, Duration::from_secs(60)).failure_threshold(1),
        )
}

fn gate(clock: &ManualClock, store: JsonFileStore) -> Gate<String> {
    Gate::builder(config())
        .clock(clock.clone())
        .store(store)
        .build()
        .unwrap()
}

#[test]
fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("state").join("gate.json"));
    let clock = ManualClock::new(Timestamp::from_secs(100));

    {
        let gate = gate(&clock, store.clone());
        assert!(gate.acquire("search").unwrap().is_granted());
        gate.report("github", false).unwrap();
        gate.enqueue(QueueEntry::new("pending", "search", "later".into(), clock.now()))
            .unwrap();
        gate.enqueue(QueueEntry::new("done", "github", "now".into(), clock.now()))
            .unwrap();
        let done = gate.pop_eligible().unwrap();
        gate.report_success(done).unwrap();
        gate.enqueue(QueueEntry::new("flying", "github", "x".into(), clock.now()))
            .unwrap();
        let _in_flight = gate.pop_eligible().unwrap();
        assert!(gate.persist().unwrap());
    }

    clock.advance(Duration::from_secs(5));
    let gate = gate(&clock, store);
    assert!(gate.restore().unwrap());

    assert_eq!(gate.remaining("search").unwrap(), 0);
    assert_eq!(gate.circuit_state("github").unwrap(), CircuitState::Open);
    assert_eq!(gate.pending_len(), 1);
    assert_eq!(gate.processed().len(), 1);
    // In-flight work is not persisted.
    assert_eq!(gate.in_flight_len(), 0);
    assert!(gate.cancel("flying").is_none());

    // Restored ids stay reserved.
    assert!(gate
        .enqueue(QueueEntry::new("done", "search", String::new(), clock.now()))
        .is_err());
}

#[test]
fn restore_drops_unconfigured_resources() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("gate.json"));
    let clock = ManualClock::new(Timestamp::from_secs(0));

    let gate = gate(&clock, store.clone());
    gate.enqueue(QueueEntry::new("s", "search", String::new(), clock.now()))
        .unwrap();
    gate.enqueue(QueueEntry::new("g", "github", String::new(), clock.now()))
        .unwrap();
    gate.persist().unwrap();

    let narrower: Gate<String> = Gate::builder(
        GateConfig::default().resource("search", ResourceConfig::new(1, Duration::from_secs(1800))),
    )
    .clock(clock.clone())
    .store(store)
    .build()
    .unwrap();
    assert!(narrower.restore().unwrap());
    assert_eq!(narrower.pending_len(), 1);
    assert_eq!(narrower.pop_eligible().unwrap().id.as_str(), "s");
}

#[test]
fn missing_state_file_restores_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let gate = gate(&clock, JsonFileStore::new(dir.path().join("absent.json")));
    assert!(!gate.restore().unwrap());
    assert_eq!(gate.pending_len(), 0);
}

#[test]
fn corrupt_state_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gate.json");
    std::fs::write(&path, "[1, 2").unwrap();
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let gate = gate(&clock, JsonFileStore::new(&path));
    assert!(matches!(
        gate.restore(),
        Err(callgate::GateError::Store(callgate::StoreError::Serde(_)))
    ));
}

#[test]
fn snapshot_json_layout_is_keyed_by_resource() {
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("gate.json"));
    let gate = gate(&clock, store.clone());
    gate.acquire("search").unwrap();
    gate.persist().unwrap();

    let loaded: callgate::GateSnapshot<String> = store.load().unwrap().unwrap();
    assert!(loaded.rates.contains_key("search"));
    assert!(loaded.queues.contains_key("github"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
    assert_eq!(json["rates"]["search"]["count"], 1);
    assert_eq!(json["rates"]["search"]["reset_at"], 1_800_000);
}
