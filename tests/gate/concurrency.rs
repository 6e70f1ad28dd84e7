use callgate::Clock;
use callgate::{Gate, GateConfig, ManualClock, QueueEntry, ResourceConfig, Timestamp};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

#[test]
fn concurrent_acquires_never_exceed_quota() {
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let config = GateConfig::default()
        .resource("a", ResourceConfig::new(50, Duration::from_secs(60)))
        .resource("b", ResourceConfig::new(20, Duration::from_secs(60)));
    let gate: Arc<Gate<()>> = Arc::new(Gate::builder(config).clock(clock).build().unwrap());

    let granted_a = Arc::new(AtomicUsize::new(0));
    let granted_b = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let gate = Arc::clone(&gate);
            let (resource, granted) = if i % 2 == 0 {
                ("a", Arc::clone(&granted_a))
            } else {
                ("b", Arc::clone(&granted_b))
            };
            thread::spawn(move || {
                for _ in 0..40 {
                    if gate.acquire(resource).unwrap().is_granted() {
                        granted.fetch_add(1, Ordering::SeqCst);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(granted_a.load(Ordering::SeqCst), 50);
    assert_eq!(granted_b.load(Ordering::SeqCst), 20);
}

#[test]
fn concurrent_pops_hand_out_each_entry_once() {
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let config = GateConfig::default()
        .resource("a", ResourceConfig::new(1000, Duration::from_secs(60)))
        .resource("b", ResourceConfig::new(1000, Duration::from_secs(60)));
    let gate: Arc<Gate<u32>> = Arc::new(Gate::builder(config).clock(clock.clone()).build().unwrap());
    for i in 0..200u32 {
        let resource = if i % 2 == 0 { "a" } else { "b" };
        gate.enqueue(QueueEntry::new(format!("e{i}"), resource, i, clock.now()))
            .unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(entry) = gate.pop_eligible() {
                    seen.push(entry.payload);
                    gate.report_success(entry).unwrap();
                }
                seen
            })
        })
        .collect();

    let mut all: Vec<u32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..200).collect::<Vec<_>>());
    assert_eq!(gate.pending_len(), 0);
    assert_eq!(gate.in_flight_len(), 0);
}

#[test]
fn racing_pops_fall_through_to_the_next_lane() {
    let clock = ManualClock::new(Timestamp::from_secs(0));
    let config = GateConfig::default()
        .resource("a", ResourceConfig::new(1000, Duration::from_secs(60)))
        .resource("b", ResourceConfig::new(1000, Duration::from_secs(60)));
    let gate: Arc<Gate<u32>> = Arc::new(Gate::builder(config).clock(clock.clone()).build().unwrap());
    let threads = 8;

    for round in 0..50u32 {
        // "a" sorts first, so every popper aims at its single entry.
        gate.enqueue(QueueEntry::new(format!("r{round}-a"), "a", 0, clock.now()))
            .unwrap();
        for i in 1..threads {
            gate.enqueue(QueueEntry::new(format!("r{round}-b{i}"), "b", i, clock.now()))
                .unwrap();
        }

        let barrier = Arc::new(Barrier::new(threads as usize));
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    gate.pop_eligible()
                })
            })
            .collect();

        for handle in handles {
            let entry = handle
                .join()
                .unwrap()
                .expect("an eligible entry was left behind");
            gate.report_success(entry).unwrap();
        }
        assert_eq!(gate.pending_len(), 0);
    }
}
