//! Shared outcome taxonomy for gated calls.
//!
//! [`CallError`] covers the outcomes a caller of a gated resource can
//! observe directly. Only [`CallError::External`] carries a failure of the
//! external call itself; denials are expected outcomes of the gate.
//! Queued calls that run out of attempts are reported by the queue, not
//! through this type.
//!
//! ```rust
//! use callgate_core::{CallError, ResourceId, Timestamp};
//!
//! fn handle(error: CallError<std::io::Error>) {
//!     match error {
//!         CallError::DeniedByRate { resource, reset_at } => {
//!             println!("{resource} quota exhausted until {reset_at:?}");
//!         }
//!         CallError::DeniedByCircuit { resource, .. } => {
//!             println!("{resource} circuit open, deferring");
//!         }
//!         CallError::External(e) => eprintln!("call failed: {e}"),
//!     }
//! }
//! # handle(CallError::DeniedByRate { resource: ResourceId::from("x"), reset_at: Some(Timestamp::EPOCH) });
//! ```

use crate::resource::ResourceId;
use crate::time::Timestamp;
use thiserror::Error;

/// Outcome of a gated call that did not succeed.
#[derive(Debug, Clone, Error)]
pub enum CallError<E> {
    /// The resource's quota for the current window is spent.
    #[error("rate limit for '{resource}' exhausted")]
    DeniedByRate {
        /// The resource that was denied.
        resource: ResourceId,
        /// When the current window ends, if known.
        reset_at: Option<Timestamp>,
    },

    /// The resource's circuit is open or its half-open trial is taken.
    #[error("circuit for '{resource}' is open")]
    DeniedByCircuit {
        /// The resource that was denied.
        resource: ResourceId,
        /// When the circuit will next admit a trial call, if known.
        retry_at: Option<Timestamp>,
    },

    /// The external call itself failed.
    #[error("external call failed: {0}")]
    External(E),
}

impl<E> CallError<E> {
    /// Returns `true` for a rate denial.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, CallError::DeniedByRate { .. })
    }

    /// Returns `true` for a circuit denial.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::DeniedByCircuit { .. })
    }

    /// Returns `true` for either kind of denial. Denied calls should be
    /// deferred, never escalated.
    pub fn is_denied(&self) -> bool {
        self.is_rate_limited() || self.is_circuit_open()
    }

    /// Extracts the external error, if any.
    pub fn into_external(self) -> Option<E> {
        match self {
            CallError::External(e) => Some(e),
            _ => None,
        }
    }

    /// Earliest time a denied call could succeed, if known.
    pub fn retry_at(&self) -> Option<Timestamp> {
        match self {
            CallError::DeniedByRate { reset_at, .. } => *reset_at,
            CallError::DeniedByCircuit { retry_at, .. } => *retry_at,
            CallError::External(_) => None,
        }
    }

    /// Maps the external error using a function.
    pub fn map_external<F, T>(self, f: F) -> CallError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            CallError::DeniedByRate { resource, reset_at } => {
                CallError::DeniedByRate { resource, reset_at }
            }
            CallError::DeniedByCircuit { resource, retry_at } => {
                CallError::DeniedByCircuit { resource, retry_at }
            }
            CallError::External(e) => CallError::External(f(e)),
        }
    }
}
