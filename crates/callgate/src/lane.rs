use crate::error::Denial;
use crate::gate::Admission;
use callgate_circuitbreaker::CircuitBreaker;
use callgate_core::{ResourceId, Timestamp};
use callgate_queue::RequestQueue;
use callgate_ratelimiter::{RateDecision, RateTracker};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// All per-resource state, guarded together.
pub(crate) struct Lane<P> {
    pub(crate) resource: ResourceId,
    pub(crate) rate: RateTracker,
    pub(crate) circuit: CircuitBreaker,
    pub(crate) queue: RequestQueue<P>,
}

pub(crate) type SharedLane<P> = Arc<Mutex<Lane<P>>>;

pub(crate) fn lock<P>(lane: &Mutex<Lane<P>>) -> MutexGuard<'_, Lane<P>> {
    lane.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<P> Lane<P> {
    /// Asks both the rate window and the circuit for permission.
    ///
    /// The rate window is checked first without consuming, so a quota denial
    /// never uses up a half-open trial. A granted call has consumed a permit.
    pub(crate) fn acquire(&mut self, now: Timestamp) -> Admission {
        let resource = self.resource.as_str();

        if let RateDecision::Denied { reset_at } = self.rate.peek(resource, now) {
            // Denied again through try_consume, which records the rejection.
            self.rate.try_consume(resource, now);
            return self.deny(Denial::Rate { reset_at });
        }

        if !self.circuit.permit(resource, now) {
            let retry_at = self.circuit.retry_at(resource);
            return self.deny(Denial::Circuit { retry_at });
        }

        match self.rate.try_consume(resource, now) {
            RateDecision::Denied { reset_at } => {
                self.circuit.release_trial(resource);
                self.deny(Denial::Rate { reset_at })
            }
            // Every lane configures its own resource, so Unconfigured does
            // not occur.
            RateDecision::Allowed { .. } | RateDecision::Unconfigured => Admission::Granted,
        }
    }

    /// When a new entry could first be admitted, if not right now.
    pub(crate) fn blocked_until(&mut self, now: Timestamp) -> Option<Timestamp> {
        let resource = self.resource.as_str();
        let rate = match self.rate.peek(resource, now) {
            RateDecision::Denied { reset_at } => Some(reset_at),
            _ => None,
        };
        let circuit = self.circuit.retry_at(resource).filter(|at| *at > now);
        rate.max(circuit)
    }

    fn deny(&self, denial: Denial) -> Admission {
        #[cfg(feature = "tracing")]
        tracing::debug!(resource = %self.resource, ?denial, "call denied");

        Admission::Denied(denial)
    }
}
