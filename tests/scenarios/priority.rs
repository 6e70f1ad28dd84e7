use callgate::Clock;
use callgate::{Gate, GateConfig, ManualClock, QueueEntry, ResourceConfig};
use callgate_core::Timestamp;
use callgate_queue::RequestQueue;
use std::time::Duration;

#[test]
fn eligible_high_priority_entry_wins() {
    let mut queue = RequestQueue::default();
    let now = Timestamp::from_secs(500);

    queue
        .enqueue(
            QueueEntry::new("later", "search", "batch", now)
                .with_priority(5)
                .eligible_at(now + Duration::from_secs(100)),
        )
        .unwrap();
    queue
        .enqueue(QueueEntry::new("urgent", "search", "user", now).with_priority(1))
        .unwrap();

    assert_eq!(queue.pop_eligible(now).unwrap().id.as_str(), "urgent");
    assert!(queue.pop_eligible(now).is_none());
    assert_eq!(
        queue
            .pop_eligible(now + Duration::from_secs(100))
            .unwrap()
            .id
            .as_str(),
        "later"
    );
}

#[test]
fn equal_priority_is_fifo() {
    let mut queue = RequestQueue::default();
    let now = Timestamp::from_secs(0);
    for (i, id) in ["first", "second", "third"].into_iter().enumerate() {
        let created = now + Duration::from_millis(i as u64);
        queue
            .enqueue(QueueEntry::new(id, "search", (), created))
            .unwrap();
    }

    let order: Vec<_> = std::iter::from_fn(|| queue.pop_eligible(Timestamp::from_secs(1)))
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(order, ["first", "second", "third"]);
}

#[test]
fn gate_applies_priority_across_resources() {
    let clock = ManualClock::new(Timestamp::from_secs(500));
    let config = GateConfig::default()
        .resource("search", ResourceConfig::new(10, Duration::from_secs(60)))
        .resource("github", ResourceConfig::new(10, Duration::from_secs(60)));
    let gate: Gate<&str> = Gate::builder(config).clock(clock.clone()).build().unwrap();
    let now = clock.now();

    gate.enqueue(
        QueueEntry::new("later", "search", "batch", now)
            .with_priority(5)
            .eligible_at(now + Duration::from_secs(100)),
    )
    .unwrap();
    gate.enqueue(QueueEntry::new("urgent", "github", "user", now).with_priority(1))
        .unwrap();

    assert_eq!(gate.pop_eligible().unwrap().id.as_str(), "urgent");
    assert!(gate.pop_eligible().is_none());
}
