use crate::breaker::CircuitBreaker;
use crate::circuit::{BreakerSettings, CircuitState};
use crate::events::CircuitEvent;
use callgate_core::events::{EventListeners, FnListener};
use callgate_core::ResourceId;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the circuit breaker.
pub struct CircuitBreakerConfig {
    pub(crate) defaults: BreakerSettings,
    pub(crate) overrides: HashMap<ResourceId, BreakerSettings>,
    pub(crate) event_listeners: EventListeners<CircuitEvent>,
    pub(crate) name: String,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder {
    defaults: BreakerSettings,
    overrides: HashMap<ResourceId, BreakerSettings>,
    event_listeners: EventListeners<CircuitEvent>,
    name: String,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            defaults: BreakerSettings::default(),
            overrides: HashMap::new(),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets how many consecutive failures open a closed circuit.
    ///
    /// Applies to every resource without its own settings. A threshold of
    /// zero is treated as one.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.defaults.failure_threshold = threshold.max(1);
        self
    }

    /// Sets how long an open circuit rejects calls after its last failure.
    ///
    /// Default: 30 seconds
    pub fn cool_down(mut self, duration: Duration) -> Self {
        self.defaults.cool_down = duration;
        self
    }

    /// Gives `resource` its own threshold and cool-down.
    pub fn resource(mut self, resource: impl Into<ResourceId>, settings: BreakerSettings) -> Self {
        let settings = BreakerSettings {
            failure_threshold: settings.failure_threshold.max(1),
            ..settings
        };
        self.overrides.insert(resource.into(), settings);
        self
    }

    /// Sets the name for this circuit breaker instance (used in logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the listener set, e.g. to share one set across breakers.
    pub fn listeners(mut self, listeners: EventListeners<CircuitEvent>) -> Self {
        self.event_listeners = listeners;
        self
    }

    /// Registers a callback when a circuit changes state.
    ///
    /// # Callback Signature
    /// `Fn(&ResourceId, CircuitState, CircuitState)` - the resource, then the
    /// state before and after the transition.
    ///
    /// # Example
    /// ```rust
    /// use callgate_circuitbreaker::CircuitBreakerConfig;
    /// use std::time::Duration;
    ///
    /// let breaker = CircuitBreakerConfig::builder()
    ///     .failure_threshold(3)
    ///     .cool_down(Duration::from_secs(60))
    ///     .on_state_transition(|resource, from, to| {
    ///         println!("{resource}: {from} -> {to}");
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitEvent::StateTransition {
                resource,
                from_state,
                to_state,
                ..
            } = event
            {
                f(resource, *from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback when a call is permitted.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitEvent::CallPermitted {
                resource, state, ..
            } = event
            {
                f(resource, *state);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitEvent::CallRejected { resource, .. } = event {
                f(resource);
            }
        }));
        self
    }

    /// Registers a callback when a success is reported.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitEvent::SuccessRecorded {
                resource, state, ..
            } = event
            {
                f(resource, *state);
            }
        }));
        self
    }

    /// Registers a callback when a failure is reported.
    ///
    /// # Callback Signature
    /// `Fn(&ResourceId, u32)` - the resource and its consecutive failures.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitEvent::FailureRecorded {
                resource,
                consecutive_failures,
                ..
            } = event
            {
                f(resource, *consecutive_failures);
            }
        }));
        self
    }

    /// Builds the circuit breaker.
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            defaults: self.defaults,
            overrides: self.overrides,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}
