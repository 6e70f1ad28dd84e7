use callgate_core::{CallError, ResourceId, Timestamp};
use callgate_queue::QueueError;
use std::path::PathBuf;
use thiserror::Error;

/// Why the gate refused a call. Denials are expected: defer, don't escalate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The resource's quota is spent until `reset_at`.
    Rate { reset_at: Timestamp },
    /// The circuit is open, or its half-open trial is already out.
    ///
    /// `retry_at` is `None` while a trial is in flight.
    Circuit { retry_at: Option<Timestamp> },
}

impl Denial {
    /// Earliest time the call could be admitted, if known.
    pub fn retry_at(&self) -> Option<Timestamp> {
        match self {
            Denial::Rate { reset_at } => Some(*reset_at),
            Denial::Circuit { retry_at } => *retry_at,
        }
    }

    /// Converts into the shared call outcome taxonomy.
    pub fn into_call_error<E>(self, resource: ResourceId) -> CallError<E> {
        match self {
            Denial::Rate { reset_at } => CallError::DeniedByRate {
                resource,
                reset_at: Some(reset_at),
            },
            Denial::Circuit { retry_at } => CallError::DeniedByCircuit { resource, retry_at },
        }
    }
}

/// Hard errors of the gate. Denials and failed calls are not errors.
#[derive(Debug, Error)]
pub enum GateError {
    /// The resource has no configuration.
    #[error("unknown resource '{0}'")]
    UnknownResource(ResourceId),

    /// The queue refused an operation.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Reading or writing persisted state failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors reading or writing persisted gate state.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("state encoding: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors loading or validating a [`GateConfig`](crate::GateConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no resources configured")]
    NoResources,

    #[error("resource '{resource}': {reason}")]
    InvalidResource {
        resource: ResourceId,
        reason: &'static str,
    },

    #[error("backoff: {0}")]
    InvalidBackoff(&'static str),

    #[error("history_capacity must be at least 1")]
    ZeroHistoryCapacity,
}
