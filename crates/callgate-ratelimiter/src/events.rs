use callgate_core::events::GateEvent;
use callgate_core::{ResourceId, Timestamp};

/// Events emitted by the rate tracker.
#[derive(Debug, Clone)]
pub enum RateEvent {
    /// A permit was granted.
    PermitAcquired {
        resource: ResourceId,
        timestamp: Timestamp,
        remaining: u32,
    },
    /// A permit was refused because the window's quota is spent.
    PermitRejected {
        resource: ResourceId,
        timestamp: Timestamp,
        reset_at: Timestamp,
    },
    /// A window expired and its counter was reset.
    WindowReset {
        resource: ResourceId,
        timestamp: Timestamp,
    },
    /// Authoritative quota data replaced the local estimate.
    ExternalOverride {
        resource: ResourceId,
        timestamp: Timestamp,
        remaining: u32,
        reset_at: Timestamp,
    },
}

impl GateEvent for RateEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateEvent::PermitAcquired { .. } => "permit_acquired",
            RateEvent::PermitRejected { .. } => "permit_rejected",
            RateEvent::WindowReset { .. } => "window_reset",
            RateEvent::ExternalOverride { .. } => "external_override",
        }
    }

    fn timestamp(&self) -> Timestamp {
        match self {
            RateEvent::PermitAcquired { timestamp, .. }
            | RateEvent::PermitRejected { timestamp, .. }
            | RateEvent::WindowReset { timestamp, .. }
            | RateEvent::ExternalOverride { timestamp, .. } => *timestamp,
        }
    }

    fn resource(&self) -> &ResourceId {
        match self {
            RateEvent::PermitAcquired { resource, .. }
            | RateEvent::PermitRejected { resource, .. }
            | RateEvent::WindowReset { resource, .. }
            | RateEvent::ExternalOverride { resource, .. } => resource,
        }
    }
}
