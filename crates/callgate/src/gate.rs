use crate::config::GateConfig;
use crate::error::{ConfigError, Denial, GateError};
use crate::lane::{self, Lane, SharedLane};
use crate::store::{GateSnapshot, StateStore};
use callgate_backoff::{BackoffDecision, BackoffPolicy};
use callgate_circuitbreaker::{CircuitBreakerConfig, CircuitEvent, CircuitState};
use callgate_core::events::{EventListener, EventListeners, FnListener};
use callgate_core::{Clock, ResourceId, SystemClock, Timestamp};
use callgate_queue::{
    EntryId, HistoryRecord, QueueEntry, QueueError, QueueEvent, RequestQueueConfig,
};
use callgate_ratelimiter::{RateEvent, RateTrackerConfig};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Answer to [`Gate::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The call may proceed now. A rate permit has been consumed.
    Granted,
    /// The call must wait.
    Denied(Denial),
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted)
    }

    pub fn denial(&self) -> Option<Denial> {
        match self {
            Admission::Granted => None,
            Admission::Denied(denial) => Some(*denial),
        }
    }
}

/// What happened to an entry after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDisposition<P> {
    /// The entry was requeued.
    Retry {
        earliest_eligible: Timestamp,
        /// Failed attempts so far, including this one.
        attempts: u32,
    },
    /// The backoff policy gave up; the entry is in the abandoned history.
    Abandoned(HistoryRecord<P>),
}

impl<P> FailureDisposition<P> {
    pub fn is_abandoned(&self) -> bool {
        matches!(self, FailureDisposition::Abandoned(_))
    }
}

/// Coordinates rate limits, circuit breakers, backoff and the retry queue
/// for a fixed set of resources.
///
/// Each resource's state sits in its own lane behind its own lock, so calls
/// for different resources never contend. The gate owns no timer; a
/// [`Dispatcher`](crate::Dispatcher) or the caller drives it.
pub struct Gate<P> {
    lanes: BTreeMap<ResourceId, SharedLane<P>>,
    /// Where every known entry id lives. Lock before any lane.
    directory: Mutex<HashMap<EntryId, ResourceId>>,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
    store: Option<Box<dyn StateStore<P>>>,
    name: String,
}

impl<P> Gate<P> {
    /// Creates a builder for a gate over the resources in `config`.
    pub fn builder(config: GateConfig) -> GateBuilder<P> {
        GateBuilder::new(config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current time according to the gate's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Configured resources, in order.
    pub fn resources(&self) -> impl Iterator<Item = &ResourceId> {
        self.lanes.keys()
    }

    pub fn contains(&self, resource: &str) -> bool {
        self.lanes.contains_key(resource)
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub(crate) fn lane(&self, resource: &str) -> Result<&SharedLane<P>, GateError> {
        self.lanes
            .get(resource)
            .ok_or_else(|| GateError::UnknownResource(ResourceId::from(resource)))
    }

    pub(crate) fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn directory(&self) -> MutexGuard<'_, HashMap<EntryId, ResourceId>> {
        self.directory.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn forget(&self, evicted: Option<HistoryRecord<P>>) {
        if let Some(record) = evicted {
            self.directory().remove(&record.entry.id);
        }
    }

    /// Asks permission to call `resource` now.
    ///
    /// On [`Admission::Granted`] a rate permit is consumed and, for a
    /// half-open circuit, the trial is taken; the outcome must be reported.
    pub fn acquire(&self, resource: &str) -> Result<Admission, GateError> {
        let now = self.now();
        Ok(lane::lock(self.lane(resource)?).acquire(now))
    }

    /// Reports the outcome of a call made outside the queue.
    ///
    /// Only the circuit is updated.
    pub fn report(&self, resource: &str, success: bool) -> Result<(), GateError> {
        let now = self.now();
        lane::lock(self.lane(resource)?)
            .circuit
            .report(resource, success, now);
        Ok(())
    }

    /// Applies authoritative quota data, typically from response headers.
    pub fn record_external_header(
        &self,
        resource: &str,
        remaining: u32,
        reset_at: Timestamp,
    ) -> Result<(), GateError> {
        let now = self.now();
        lane::lock(self.lane(resource)?)
            .rate
            .record_external_header(resource, remaining, reset_at, now);
        Ok(())
    }

    pub fn circuit_state(&self, resource: &str) -> Result<CircuitState, GateError> {
        Ok(lane::lock(self.lane(resource)?).circuit.state(resource))
    }

    /// Permits left in the current window of `resource`.
    pub fn remaining(&self, resource: &str) -> Result<u32, GateError> {
        let now = self.now();
        Ok(lane::lock(self.lane(resource)?)
            .rate
            .remaining(resource, now)
            .unwrap_or(0))
    }

    /// Adds an entry to its resource's queue as is.
    pub fn enqueue(&self, entry: QueueEntry<P>) -> Result<(), GateError> {
        let lane = self.lane(entry.resource.as_str())?;
        let mut directory = self.directory();
        if directory.contains_key(entry.id.as_str()) {
            return Err(QueueError::DuplicateId(entry.id).into());
        }
        let id = entry.id.clone();
        let resource = entry.resource.clone();
        lane::lock(lane).queue.enqueue(entry)?;
        directory.insert(id, resource);
        Ok(())
    }

    /// Queues an entry, no earlier than its resource could admit it.
    ///
    /// Returns the entry's earliest eligible time.
    pub fn submit(&self, mut entry: QueueEntry<P>) -> Result<Timestamp, GateError> {
        let now = self.now();
        let blocked = lane::lock(self.lane(entry.resource.as_str())?).blocked_until(now);
        if let Some(until) = blocked {
            entry.earliest_eligible = entry.earliest_eligible.max(until);
        }
        let earliest = entry.earliest_eligible;
        self.enqueue(entry)?;
        Ok(earliest)
    }

    /// Takes the best eligible entry across all resources.
    ///
    /// Lower priority wins, then earlier creation. The entry is in flight
    /// until passed to [`defer`](Self::defer),
    /// [`report_success`](Self::report_success) or
    /// [`report_failure`](Self::report_failure).
    pub fn pop_eligible(&self) -> Option<QueueEntry<P>> {
        let now = self.now();
        loop {
            let (_, best) = self
                .lanes
                .iter()
                .filter_map(|(resource, lane)| {
                    let guard = lane::lock(lane);
                    guard
                        .queue
                        .peek_eligible(now)
                        .map(|e| ((e.priority, e.created_at, resource.clone()), Arc::clone(lane)))
                })
                .min_by(|(a, _), (b, _)| a.cmp(b))?;

            // Another caller may have drained the lane since the scan; look
            // again rather than report an empty queue.
            if let Some(entry) = lane::lock(&best).queue.pop_eligible(now) {
                return Some(entry);
            };
        }
    }

    /// Returns an entry the gate denied, to run no earlier than
    /// `earliest_eligible`. Does not count as an attempt.
    pub fn defer(
        &self,
        entry: QueueEntry<P>,
        earliest_eligible: Timestamp,
    ) -> Result<(), GateError> {
        let now = self.now();
        lane::lock(self.lane(entry.resource.as_str())?)
            .queue
            .defer(entry, earliest_eligible, now)?;
        Ok(())
    }

    /// Records a successful call and moves the entry to the processed
    /// history.
    pub fn report_success(&self, entry: QueueEntry<P>) -> Result<(), GateError> {
        let now = self.now();
        let evicted = {
            let mut lane = lane::lock(self.lane(entry.resource.as_str())?);
            if !lane.queue.is_in_flight(entry.id.as_str()) {
                return Err(QueueError::NotInFlight(entry.id).into());
            }
            lane.circuit.report(entry.resource.as_str(), true, now);
            lane.queue.complete(entry, now)?
        };
        self.forget(evicted);
        Ok(())
    }

    /// Removes a pending entry. In-flight and settled entries are untouched.
    pub fn cancel(&self, id: &str) -> Option<QueueEntry<P>> {
        let now = self.now();
        let mut directory = self.directory();
        let lane = self.lanes.get(directory.get(id)?)?;
        let entry = lane::lock(lane).queue.cancel(id, now)?;
        directory.remove(id);
        Some(entry)
    }

    /// Pending entries across all resources.
    pub fn pending_len(&self) -> usize {
        self.lanes.values().map(|l| lane::lock(l).queue.len()).sum()
    }

    /// Entries popped and not yet settled, across all resources.
    pub fn in_flight_len(&self) -> usize {
        self.lanes
            .values()
            .map(|l| lane::lock(l).queue.in_flight_len())
            .sum()
    }

    /// Earliest time any pending entry becomes eligible.
    pub fn next_eligible_at(&self) -> Option<Timestamp> {
        self.lanes
            .values()
            .filter_map(|l| lane::lock(l).queue.next_eligible_at())
            .min()
    }
}

impl<P: Clone> Gate<P> {
    /// Records a failed call and asks the backoff policy what to do next.
    ///
    /// `hint` is a server-provided wait such as a parsed `Retry-After`; it
    /// beats the computed backoff but never prevents abandonment.
    pub fn report_failure(
        &self,
        mut entry: QueueEntry<P>,
        hint: Option<Duration>,
    ) -> Result<FailureDisposition<P>, GateError> {
        let now = self.now();
        let attempts = entry.attempts.saturating_add(1);
        let decision = self.backoff.decide(attempts, hint);

        let (disposition, evicted) = {
            let mut lane = lane::lock(self.lane(entry.resource.as_str())?);
            if !lane.queue.is_in_flight(entry.id.as_str()) {
                return Err(QueueError::NotInFlight(entry.id).into());
            }
            lane.circuit.report(entry.resource.as_str(), false, now);

            match decision {
                BackoffDecision::Retry(wait) => {
                    let earliest_eligible = now + wait;
                    lane.queue.requeue(entry, earliest_eligible, now)?;
                    let retry = FailureDisposition::Retry {
                        earliest_eligible,
                        attempts,
                    };
                    (retry, None)
                }
                BackoffDecision::Abandon => {
                    entry.attempts = attempts;
                    let reason = format!("attempts exhausted after {attempts} failures");
                    let record = HistoryRecord {
                        entry: entry.clone(),
                        finished_at: now,
                        reason: Some(reason.clone()),
                    };
                    let evicted = lane.queue.abandon(entry, reason, now)?;
                    (FailureDisposition::Abandoned(record), evicted)
                }
            }
        };
        self.forget(evicted);
        Ok(disposition)
    }

    /// Processed records of every resource, oldest first.
    pub fn processed(&self) -> Vec<HistoryRecord<P>> {
        self.merged_history(|lane| lane.queue.processed().cloned().collect())
    }

    /// Abandoned records of every resource, oldest first.
    pub fn abandoned(&self) -> Vec<HistoryRecord<P>> {
        self.merged_history(|lane| lane.queue.abandoned().cloned().collect())
    }

    fn merged_history<F>(&self, f: F) -> Vec<HistoryRecord<P>>
    where
        F: Fn(&Lane<P>) -> Vec<HistoryRecord<P>>,
    {
        let mut records: Vec<_> = self
            .lanes
            .values()
            .flat_map(|l| f(&lane::lock(l)))
            .collect();
        records.sort_by_key(|r| r.finished_at);
        records
    }

    /// Copies the persistent state of every resource.
    pub fn snapshot(&self) -> GateSnapshot<P> {
        let mut snapshot = GateSnapshot::default();
        for (resource, lane) in &self.lanes {
            let lane = lane::lock(lane);
            snapshot.rates.extend(lane.rate.snapshot());
            snapshot.circuits.extend(lane.circuit.snapshot());
            snapshot
                .queues
                .insert(resource.clone(), lane.queue.snapshot());
        }
        snapshot
    }

    /// Replaces the state of every configured resource with `snapshot`.
    ///
    /// Entries for resources no longer configured are dropped. Entries
    /// currently in flight are kept.
    pub fn restore_snapshot(&self, mut snapshot: GateSnapshot<P>) {
        let mut directory = self.directory();
        directory.clear();

        for (resource, lane) in &self.lanes {
            let mut lane = lane::lock(lane);
            if let Some(rate) = snapshot.rates.remove(resource) {
                lane.rate.restore(BTreeMap::from([(resource.clone(), rate)]));
            }
            if let Some(circuit) = snapshot.circuits.remove(resource) {
                lane.circuit
                    .restore(BTreeMap::from([(resource.clone(), circuit)]));
            }
            if let Some(queue) = snapshot.queues.remove(resource) {
                lane.queue.restore(queue);
            }

            let Lane { queue, .. } = &*lane;
            let ids = queue
                .pending()
                .map(|e| &e.id)
                .chain(queue.in_flight())
                .chain(queue.processed().map(|r| &r.entry.id))
                .chain(queue.abandoned().map(|r| &r.entry.id));
            for id in ids {
                directory.insert(id.clone(), resource.clone());
            }
        }

        #[cfg(feature = "tracing")]
        {
            let dropped = snapshot.rates.len() + snapshot.circuits.len() + snapshot.queues.len();
            if dropped > 0 {
                tracing::warn!(gate = %self.name, dropped, "state for unconfigured resources dropped");
            }
        }
    }

    /// Saves a snapshot to the configured store.
    ///
    /// Returns `false` if the gate has no store.
    pub fn persist(&self) -> Result<bool, GateError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        store.save(&self.snapshot())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(gate = %self.name, "state persisted");
        Ok(true)
    }

    /// Loads the last saved snapshot from the configured store.
    ///
    /// Returns `false` if there is no store or nothing was saved.
    pub fn restore(&self) -> Result<bool, GateError> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        match store.load()? {
            Some(snapshot) => {
                self.restore_snapshot(snapshot);

                #[cfg(feature = "tracing")]
                tracing::info!(gate = %self.name, pending = self.pending_len(), "state restored");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl<P> std::fmt::Debug for Gate<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("name", &self.name)
            .field("resources", &self.lanes.keys().collect::<Vec<_>>())
            .field("backoff", &self.backoff)
            .field("store", &self.store.is_some())
            .finish()
    }
}

/// Builder for [`Gate`].
pub struct GateBuilder<P> {
    config: GateConfig,
    clock: Arc<dyn Clock>,
    store: Option<Box<dyn StateStore<P>>>,
    name: String,
    rate_listeners: EventListeners<RateEvent>,
    circuit_listeners: EventListeners<CircuitEvent>,
    queue_listeners: EventListeners<QueueEvent>,
}

impl<P> GateBuilder<P> {
    fn new(config: GateConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            store: None,
            name: "<unnamed>".to_string(),
            rate_listeners: EventListeners::new(),
            circuit_listeners: EventListeners::new(),
            queue_listeners: EventListeners::new(),
        }
    }

    /// Sets the time source.
    ///
    /// Default: [`SystemClock`]
    pub fn clock<C>(mut self, clock: C) -> Self
    where
        C: Clock + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Sets where [`Gate::persist`] and [`Gate::restore`] keep state.
    pub fn store<S>(mut self, store: S) -> Self
    where
        S: StateStore<P> + 'static,
    {
        self.store = Some(Box::new(store));
        self
    }

    /// Sets the name for this gate (used in logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Listens to every rate tracker event.
    pub fn rate_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<RateEvent> + 'static,
    {
        self.rate_listeners.add(listener);
        self
    }

    /// Listens to every circuit breaker event.
    pub fn circuit_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<CircuitEvent> + 'static,
    {
        self.circuit_listeners.add(listener);
        self
    }

    /// Listens to every queue event.
    pub fn queue_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<QueueEvent> + 'static,
    {
        self.queue_listeners.add(listener);
        self
    }

    /// Registers a callback when any circuit changes state.
    pub fn on_state_transition<F>(self, f: F) -> Self
    where
        F: Fn(&ResourceId, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.circuit_listener(FnListener::new(move |event| {
            if let CircuitEvent::StateTransition {
                resource,
                from_state,
                to_state,
                ..
            } = event
            {
                f(resource, *from_state, *to_state);
            }
        }))
    }

    /// Registers a callback when an entry is abandoned.
    ///
    /// Abandonment is terminal and should reach an operator.
    pub fn on_abandoned<F>(self, f: F) -> Self
    where
        F: Fn(&ResourceId, &EntryId, &str) + Send + Sync + 'static,
    {
        self.queue_listener(FnListener::new(move |event| {
            if let QueueEvent::Abandoned {
                resource,
                entry_id,
                reason,
                ..
            } = event
            {
                f(resource, entry_id, reason);
            }
        }))
    }

    /// Validates the configuration and builds the gate.
    pub fn build(self) -> Result<Gate<P>, ConfigError> {
        self.config.validate()?;

        let lanes = self
            .config
            .resources
            .iter()
            .map(|(id, resource)| {
                let lane = Lane {
                    resource: id.clone(),
                    rate: RateTrackerConfig::builder()
                        .name(self.name.clone())
                        .resource(id.clone(), resource.limit())
                        .listeners(self.rate_listeners.clone())
                        .build(),
                    circuit: CircuitBreakerConfig::builder()
                        .name(self.name.clone())
                        .resource(id.clone(), resource.breaker())
                        .listeners(self.circuit_listeners.clone())
                        .build(),
                    queue: RequestQueueConfig::builder()
                        .name(self.name.clone())
                        .history_capacity(self.config.history_capacity)
                        .listeners(self.queue_listeners.clone())
                        .build(),
                };
                (id.clone(), Arc::new(Mutex::new(lane)))
            })
            .collect();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            gate = %self.name,
            resources = self.config.resources.len(),
            max_attempts = self.config.backoff.max_attempts,
            "gate built"
        );

        Ok(Gate {
            lanes,
            directory: Mutex::new(HashMap::new()),
            backoff: self.config.backoff.policy(),
            clock: self.clock,
            store: self.store,
            name: self.name,
        })
    }
}
