use crate::circuit::CircuitState;
use callgate_core::events::GateEvent;
use callgate_core::{ResourceId, Timestamp};

/// Events emitted by the circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitEvent {
    /// The circuit moved from one state to another.
    StateTransition {
        resource: ResourceId,
        timestamp: Timestamp,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A call was permitted.
    CallPermitted {
        resource: ResourceId,
        timestamp: Timestamp,
        state: CircuitState,
    },
    /// A call was rejected.
    CallRejected {
        resource: ResourceId,
        timestamp: Timestamp,
        state: CircuitState,
    },
    /// A successful outcome was reported.
    SuccessRecorded {
        resource: ResourceId,
        timestamp: Timestamp,
        state: CircuitState,
    },
    /// A failed outcome was reported.
    FailureRecorded {
        resource: ResourceId,
        timestamp: Timestamp,
        state: CircuitState,
        consecutive_failures: u32,
    },
}

impl GateEvent for CircuitEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitEvent::StateTransition { .. } => "state_transition",
            CircuitEvent::CallPermitted { .. } => "call_permitted",
            CircuitEvent::CallRejected { .. } => "call_rejected",
            CircuitEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Timestamp {
        match self {
            CircuitEvent::StateTransition { timestamp, .. }
            | CircuitEvent::CallPermitted { timestamp, .. }
            | CircuitEvent::CallRejected { timestamp, .. }
            | CircuitEvent::SuccessRecorded { timestamp, .. }
            | CircuitEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn resource(&self) -> &ResourceId {
        match self {
            CircuitEvent::StateTransition { resource, .. }
            | CircuitEvent::CallPermitted { resource, .. }
            | CircuitEvent::CallRejected { resource, .. }
            | CircuitEvent::SuccessRecorded { resource, .. }
            | CircuitEvent::FailureRecorded { resource, .. } => resource,
        }
    }
}
