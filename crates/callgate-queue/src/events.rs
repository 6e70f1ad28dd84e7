use crate::entry::EntryId;
use callgate_core::events::GateEvent;
use callgate_core::{ResourceId, Timestamp};

/// Events emitted by the request queue.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A new entry was accepted.
    Enqueued {
        resource: ResourceId,
        entry_id: EntryId,
        timestamp: Timestamp,
        earliest_eligible: Timestamp,
    },
    /// An eligible entry was handed out.
    Popped {
        resource: ResourceId,
        entry_id: EntryId,
        timestamp: Timestamp,
    },
    /// A failed entry went back to the queue.
    Requeued {
        resource: ResourceId,
        entry_id: EntryId,
        timestamp: Timestamp,
        attempts: u32,
        earliest_eligible: Timestamp,
    },
    /// An entry that was refused before running went back to the queue.
    Deferred {
        resource: ResourceId,
        entry_id: EntryId,
        timestamp: Timestamp,
        earliest_eligible: Timestamp,
    },
    /// An entry succeeded and moved to the processed history.
    Completed {
        resource: ResourceId,
        entry_id: EntryId,
        timestamp: Timestamp,
    },
    /// An entry was given up on and moved to the abandoned history.
    Abandoned {
        resource: ResourceId,
        entry_id: EntryId,
        timestamp: Timestamp,
        attempts: u32,
        reason: String,
    },
    /// A pending entry was removed by its caller.
    Cancelled {
        resource: ResourceId,
        entry_id: EntryId,
        timestamp: Timestamp,
    },
}

impl QueueEvent {
    /// The entry this event concerns.
    pub fn entry_id(&self) -> &EntryId {
        match self {
            QueueEvent::Enqueued { entry_id, .. }
            | QueueEvent::Popped { entry_id, .. }
            | QueueEvent::Requeued { entry_id, .. }
            | QueueEvent::Deferred { entry_id, .. }
            | QueueEvent::Completed { entry_id, .. }
            | QueueEvent::Abandoned { entry_id, .. }
            | QueueEvent::Cancelled { entry_id, .. } => entry_id,
        }
    }
}

impl GateEvent for QueueEvent {
    fn event_type(&self) -> &'static str {
        match self {
            QueueEvent::Enqueued { .. } => "enqueued",
            QueueEvent::Popped { .. } => "popped",
            QueueEvent::Requeued { .. } => "requeued",
            QueueEvent::Deferred { .. } => "deferred",
            QueueEvent::Completed { .. } => "completed",
            QueueEvent::Abandoned { .. } => "abandoned",
            QueueEvent::Cancelled { .. } => "cancelled",
        }
    }

    fn timestamp(&self) -> Timestamp {
        match self {
            QueueEvent::Enqueued { timestamp, .. }
            | QueueEvent::Popped { timestamp, .. }
            | QueueEvent::Requeued { timestamp, .. }
            | QueueEvent::Deferred { timestamp, .. }
            | QueueEvent::Completed { timestamp, .. }
            | QueueEvent::Abandoned { timestamp, .. }
            | QueueEvent::Cancelled { timestamp, .. } => *timestamp,
        }
    }

    fn resource(&self) -> &ResourceId {
        match self {
            QueueEvent::Enqueued { resource, .. }
            | QueueEvent::Popped { resource, .. }
            | QueueEvent::Requeued { resource, .. }
            | QueueEvent::Deferred { resource, .. }
            | QueueEvent::Completed { resource, .. }
            | QueueEvent::Abandoned { resource, .. }
            | QueueEvent::Cancelled { resource, .. } => resource,
        }
    }
}
