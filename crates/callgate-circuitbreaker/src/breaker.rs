use crate::circuit::{BreakerSettings, Circuit, CircuitSnapshot, CircuitState, Transition};
use crate::config::CircuitBreakerConfig;
use crate::events::CircuitEvent;
use callgate_core::events::EventListeners;
use callgate_core::{ResourceId, Timestamp};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::{BTreeMap, HashMap};

/// Per-resource circuit breaker.
///
/// Each resource gets its own [`Circuit`], created closed on first use with
/// the resource's configured settings or the breaker defaults.
pub struct CircuitBreaker {
    circuits: HashMap<ResourceId, Circuit>,
    defaults: BreakerSettings,
    overrides: HashMap<ResourceId, BreakerSettings>,
    event_listeners: EventListeners<CircuitEvent>,
    name: String,
}

impl CircuitBreaker {
    pub(crate) fn new(config: CircuitBreakerConfig) -> Self {
        let circuits = config
            .overrides
            .iter()
            .map(|(id, settings)| (id.clone(), Circuit::new(*settings)))
            .collect();
        Self {
            circuits,
            defaults: config.defaults,
            overrides: config.overrides,
            event_listeners: config.event_listeners,
            name: config.name,
        }
    }

    /// Name of this breaker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Settings that apply to `resource`.
    pub fn settings(&self, resource: &str) -> BreakerSettings {
        self.overrides
            .get(resource)
            .copied()
            .unwrap_or(self.defaults)
    }

    /// Current state of `resource`. Unseen resources are closed.
    ///
    /// An open circuit whose cool-down has passed still reads `Open` until
    /// the next [`permit`](Self::permit) moves it to half-open.
    pub fn state(&self, resource: &str) -> CircuitState {
        self.circuits
            .get(resource)
            .map_or(CircuitState::Closed, Circuit::state)
    }

    /// Consecutive failures recorded for `resource`.
    pub fn consecutive_failures(&self, resource: &str) -> u32 {
        self.circuits
            .get(resource)
            .map_or(0, Circuit::consecutive_failures)
    }

    /// Time of the most recent failure reported for `resource`.
    pub fn last_failure_at(&self, resource: &str) -> Option<Timestamp> {
        self.circuits.get(resource).and_then(Circuit::last_failure_at)
    }

    /// When an open circuit will next admit a trial call.
    pub fn retry_at(&self, resource: &str) -> Option<Timestamp> {
        self.circuits.get(resource).and_then(Circuit::retry_at)
    }

    /// Asks whether a call to `resource` may proceed.
    ///
    /// An open circuit past its cool-down moves to half-open and hands out
    /// its single trial. Every permitted call must later be matched by
    /// [`report`](Self::report) or [`release_trial`](Self::release_trial).
    pub fn permit(&mut self, resource: &str, now: Timestamp) -> bool {
        let circuit = self.circuit_mut(resource);
        let (permitted, transition) = circuit.permit(now);
        let state = circuit.state();
        let id = ResourceId::from(resource);

        if let Some(transition) = transition {
            self.emit_transition(&id, transition, now);
        }

        if permitted {
            self.event_listeners.emit(&CircuitEvent::CallPermitted {
                resource: id,
                timestamp: now,
                state,
            });
        } else {
            #[cfg(feature = "tracing")]
            tracing::debug!(breaker = %self.name, resource = %id, %state, "circuit rejected call");

            self.event_listeners.emit(&CircuitEvent::CallRejected {
                resource: id,
                timestamp: now,
                state,
            });
        }
        permitted
    }

    /// Records the outcome of a call to `resource`.
    pub fn report(&mut self, resource: &str, success: bool, now: Timestamp) {
        let circuit = self.circuit_mut(resource);
        let transition = circuit.report(success, now);
        let state = circuit.state();
        let consecutive_failures = circuit.consecutive_failures();
        let id = ResourceId::from(resource);

        if success {
            self.event_listeners.emit(&CircuitEvent::SuccessRecorded {
                resource: id.clone(),
                timestamp: now,
                state,
            });
        } else {
            self.event_listeners.emit(&CircuitEvent::FailureRecorded {
                resource: id.clone(),
                timestamp: now,
                state,
                consecutive_failures,
            });
        }

        if let Some(transition) = transition {
            self.emit_transition(&id, transition, now);
        }
    }

    /// Returns a half-open trial that was permitted but never attempted.
    ///
    /// Used when another gate (such as the rate limit) refuses the call after
    /// the circuit already granted it. Returns `false` if no trial was out.
    pub fn release_trial(&mut self, resource: &str) -> bool {
        self.circuits
            .get_mut(resource)
            .is_some_and(Circuit::release_trial)
    }

    /// Forces `resource` open, starting a fresh cool-down at `now`.
    pub fn force_open(&mut self, resource: &str, now: Timestamp) {
        if let Some(transition) = self.circuit_mut(resource).force_open(now) {
            self.emit_transition(&ResourceId::from(resource), transition, now);
        }
    }

    /// Closes `resource` and clears its failure history.
    pub fn reset(&mut self, resource: &str, now: Timestamp) {
        if let Some(transition) = self.circuit_mut(resource).reset() {
            self.emit_transition(&ResourceId::from(resource), transition, now);
        }
    }

    /// Copies every known circuit, keyed by resource.
    pub fn snapshot(&self) -> BTreeMap<ResourceId, CircuitSnapshot> {
        self.circuits
            .iter()
            .map(|(id, c)| (id.clone(), c.snapshot()))
            .collect()
    }

    /// Replaces circuits with persisted state.
    ///
    /// Thresholds and cool-downs come from the current configuration.
    pub fn restore(&mut self, snapshots: BTreeMap<ResourceId, CircuitSnapshot>) {
        for (id, snapshot) in snapshots {
            let settings = self.settings(id.as_str());
            self.circuits
                .insert(id, Circuit::from_snapshot(settings, snapshot));
        }
    }

    fn circuit_mut(&mut self, resource: &str) -> &mut Circuit {
        let settings = self.settings(resource);
        self.circuits
            .entry(ResourceId::from(resource))
            .or_insert_with(|| Circuit::new(settings))
    }

    fn emit_transition(&self, resource: &ResourceId, transition: Transition, now: Timestamp) {
        let Transition { from, to } = transition;

        self.event_listeners.emit(&CircuitEvent::StateTransition {
            resource: resource.clone(),
            timestamp: now,
            from_state: from,
            to_state: to,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(breaker = %self.name, %resource, %from, %to, "circuit state transition");

        #[cfg(feature = "metrics")]
        {
            counter!(
                "callgate_circuit_transitions_total",
                "resource" => resource.to_string(),
                "from" => from.as_str(),
                "to" => to.as_str()
            )
            .increment(1);

            gauge!("callgate_circuit_state", "resource" => resource.to_string()).set(match to {
                CircuitState::Closed => 0.0,
                CircuitState::Open => 1.0,
                CircuitState::HalfOpen => 2.0,
            });
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("defaults", &self.defaults)
            .field("circuits", &self.circuits.len())
            .finish()
    }
}
