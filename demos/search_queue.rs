//! Queueing searches against a strict quota.
//! Run with: cargo run --example search_queue
//! More detail: RUST_LOG=debug cargo run --example search_queue
//!
//! A mock search API allows two calls per three seconds and fails every
//! fifth call. Six queries are submitted at once; the dispatcher spreads
//! them over the quota windows and retries the failures with backoff.
//! Interrupt it midway and run again to resume from the saved state.

use callgate::{
    BackoffConfig, Dispatch, Dispatcher, Gate, GateConfig, JsonFileStore, QueueEntry,
    ResourceConfig,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = GateConfig::default()
        .resource(
            "search",
            ResourceConfig::new(2, Duration::from_secs(3))
                .failure_threshold(3)
                .cool_down(Duration::from_secs(5)),
        )
        .backoff(BackoffConfig {
            base: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_attempts: 3,
        });

    let state = std::env::temp_dir().join("callgate-search-queue.json");
    let gate: Arc<Gate<String>> = Arc::new(
        Gate::builder(config)
            .name("search-demo")
            .store(JsonFileStore::new(&state))
            .on_state_transition(|resource, from, to| {
                println!("circuit {resource}: {from} -> {to}");
            })
            .on_abandoned(|resource, id, reason| {
                println!("gave up on {id} for {resource}: {reason}");
            })
            .build()?,
    );

    if gate.restore()? {
        println!("resumed {} queued searches", gate.pending_len());
    }

    for (i, query) in ["tower", "tokio", "serde", "axum", "hyper", "tonic"]
        .into_iter()
        .enumerate()
    {
        let entry = QueueEntry::new(format!("q-{i}"), "search", query.to_string(), gate.now());
        // Ids restored from an interrupted run are already queued.
        match gate.submit(entry) {
            Ok(at) => println!("queued {query:>6}, eligible at {at}"),
            Err(e) => println!("skipped {query}: {e}"),
        }
    }

    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let api = tower::service_fn(move |req: Dispatch<String>| {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            if n % 5 == 0 {
                println!("call {n}: {} (attempt {}) -> 503", req.payload, req.attempt);
                Err("503 service unavailable")
            } else {
                println!("call {n}: {} (attempt {}) -> ok", req.payload, req.attempt);
                Ok(format!("results for {}", req.payload))
            }
        }
    });

    let dispatcher = Dispatcher::new(Arc::clone(&gate), api)
        .interval(Duration::from_millis(250))
        .persist_after_tick(true);

    let watched = Arc::clone(&gate);
    dispatcher
        .run(async move {
            while watched.pending_len() > 0 || watched.in_flight_len() > 0 {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await;

    println!(
        "done: {} processed, {} abandoned, {} calls",
        gate.processed().len(),
        gate.abandoned().len(),
        calls.load(Ordering::SeqCst)
    );
    if state.exists() {
        std::fs::remove_file(&state)?;
    }
    Ok(())
}
