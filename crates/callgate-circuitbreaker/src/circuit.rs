use callgate_core::Timestamp;
use std::fmt;
use std::time::Duration;

/// Represents the state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed,
    /// The circuit is open and calls are rejected until the cool-down ends.
    Open,
    /// The circuit is probing recovery with a single trial call.
    HalfOpen,
}

impl CircuitState {
    /// Stable lowercase label, used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure threshold and cool-down of one circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BreakerSettings {
    /// Consecutive failures that open a closed circuit.
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls after its last failure.
    pub cool_down: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down: Duration::from_secs(30),
        }
    }
}

/// Persisted view of a circuit.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<Timestamp>,
}

/// A state change made by the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub(crate) from: CircuitState,
    pub(crate) to: CircuitState,
}

/// Circuit state machine for a single resource.
#[derive(Debug, Clone)]
pub(crate) struct Circuit {
    settings: BreakerSettings,
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Timestamp>,
    trial_in_flight: bool,
}

impl Circuit {
    /// Creates a closed circuit.
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            trial_in_flight: false,
        }
    }

    /// Recreates a circuit from persisted state.
    ///
    /// A trial that was in flight when the snapshot was taken is forgotten.
    pub fn from_snapshot(settings: BreakerSettings, snapshot: CircuitSnapshot) -> Self {
        Self {
            settings,
            state: snapshot.state,
            consecutive_failures: snapshot.consecutive_failures,
            last_failure_at: snapshot.last_failure_at,
            trial_in_flight: false,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure_at(&self) -> Option<Timestamp> {
        self.last_failure_at
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        CircuitSnapshot {
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            last_failure_at: self.last_failure_at,
        }
    }

    /// When an open circuit will next admit a trial call.
    ///
    /// `None` unless the circuit is open.
    pub fn retry_at(&self) -> Option<Timestamp> {
        match self.state {
            CircuitState::Open => self
                .last_failure_at
                .map(|at| at + self.settings.cool_down),
            _ => None,
        }
    }

    /// Asks to make a call. At most one trial is out while half-open.
    pub(crate) fn permit(&mut self, now: Timestamp) -> (bool, Option<Transition>) {
        match self.state {
            CircuitState::Closed => (true, None),
            CircuitState::Open => match self.retry_at() {
                Some(at) if now < at => (false, None),
                _ => {
                    let transition = self.transition_to(CircuitState::HalfOpen);
                    self.trial_in_flight = true;
                    (true, transition)
                }
            },
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    (false, None)
                } else {
                    self.trial_in_flight = true;
                    (true, None)
                }
            }
        }
    }

    /// Records the outcome of a call.
    pub(crate) fn report(&mut self, success: bool, now: Timestamp) -> Option<Transition> {
        if success {
            match self.state {
                CircuitState::Closed => {
                    self.consecutive_failures = 0;
                    None
                }
                CircuitState::HalfOpen => {
                    self.consecutive_failures = 0;
                    self.transition_to(CircuitState::Closed)
                }
                // A call admitted before the circuit opened finished late;
                // one success does not override the cool-down.
                CircuitState::Open => None,
            }
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
            self.last_failure_at = Some(now);
            match self.state {
                CircuitState::Closed
                    if self.consecutive_failures >= self.settings.failure_threshold =>
                {
                    self.transition_to(CircuitState::Open)
                }
                CircuitState::HalfOpen => self.transition_to(CircuitState::Open),
                _ => None,
            }
        }
    }

    /// Gives back a trial slot that was permitted but never used.
    pub(crate) fn release_trial(&mut self) -> bool {
        if self.state == CircuitState::HalfOpen && self.trial_in_flight {
            self.trial_in_flight = false;
            true
        } else {
            false
        }
    }

    /// Opens the circuit as if a failure had just occurred.
    pub(crate) fn force_open(&mut self, now: Timestamp) -> Option<Transition> {
        self.last_failure_at = Some(now);
        self.transition_to(CircuitState::Open)
    }

    /// Closes the circuit and clears the failure history.
    pub(crate) fn reset(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        self.last_failure_at = None;
        self.transition_to(CircuitState::Closed)
    }

    fn transition_to(&mut self, state: CircuitState) -> Option<Transition> {
        self.trial_in_flight = false;
        if self.state == state {
            return None;
        }
        let from = self.state;
        self.state = state;
        Some(Transition { from, to: state })
    }
}
