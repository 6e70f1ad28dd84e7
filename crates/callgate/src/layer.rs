use crate::error::GateError;
use crate::gate::{Admission, Gate};
use crate::lane::{self, SharedLane};
use callgate_circuitbreaker::CircuitState;
use callgate_core::{CallError, Clock, ResourceId};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// A Tower Layer that gates an inner service on one resource of a [`Gate`].
///
/// Each call asks the resource's rate window and circuit for permission.
/// Denied calls fail fast with [`CallError::DeniedByRate`] or
/// [`CallError::DeniedByCircuit`] and never reach the inner service. The
/// inner service's outcome is reported to the circuit.
///
/// The layer shares state with the gate, so queued and direct calls count
/// against the same quota.
///
/// # Example
///
/// ```rust
/// use callgate::{Gate, GateConfig, GateLayer, ResourceConfig};
/// use std::time::Duration;
/// use tower::{ServiceBuilder, service_fn};
///
/// let config = GateConfig::default()
///     .resource("search", ResourceConfig::new(10, Duration::from_secs(60)));
/// let gate: Gate<()> = Gate::builder(config).build().unwrap();
///
/// let service = ServiceBuilder::new()
///     .layer(GateLayer::new(&gate, "search").unwrap())
///     .service(service_fn(|q: String| async move { Ok::<_, std::io::Error>(q) }));
/// ```
pub struct GateLayer<P> {
    resource: ResourceId,
    lane: SharedLane<P>,
    clock: Arc<dyn Clock>,
}

impl<P> GateLayer<P> {
    /// Creates a layer for `resource`, which must be configured on `gate`.
    pub fn new(gate: &Gate<P>, resource: &str) -> Result<Self, GateError> {
        Ok(Self {
            resource: ResourceId::from(resource),
            lane: Arc::clone(gate.lane(resource)?),
            clock: gate.clock(),
        })
    }

    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }
}

impl<P> Clone for GateLayer<P> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            lane: Arc::clone(&self.lane),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, P> Layer<S> for GateLayer<P> {
    type Service = GateService<S, P>;

    fn layer(&self, service: S) -> Self::Service {
        GateService {
            inner: service,
            resource: self.resource.clone(),
            lane: Arc::clone(&self.lane),
            clock: Arc::clone(&self.clock),
        }
    }
}

/// Service produced by [`GateLayer`].
pub struct GateService<S, P> {
    inner: S,
    resource: ResourceId,
    lane: SharedLane<P>,
    clock: Arc<dyn Clock>,
}

impl<S: Clone, P> Clone for GateService<S, P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            resource: self.resource.clone(),
            lane: Arc::clone(&self.lane),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, P, Req> Service<Req> for GateService<S, P>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    S::Response: Send + 'static,
    P: Send + 'static,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = CallError<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(CallError::External)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let resource = self.resource.as_str();
        let (admission, trial) = {
            let mut lane = lane::lock(&self.lane);
            let admission = lane.acquire(self.clock.now());
            let trial = admission.is_granted()
                && lane.circuit.state(resource) == CircuitState::HalfOpen;
            (admission, trial)
        };
        if let Admission::Denied(denial) = admission {
            let error = denial.into_call_error(self.resource.clone());
            return Box::pin(async move { Err(error) });
        }

        // Take the service that was driven to readiness, leave a fresh clone.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let outcome = Outcome {
            lane: Arc::clone(&self.lane),
            resource: self.resource.clone(),
            clock: Arc::clone(&self.clock),
            trial,
        };

        Box::pin(async move {
            let result = inner.call(req).await;
            outcome.report(result.is_ok());
            result.map_err(CallError::External)
        })
    }
}

/// Reports a call's outcome to the circuit.
///
/// A half-open trial whose call is dropped before finishing is handed back,
/// so the next caller can run the trial instead.
struct Outcome<P> {
    lane: SharedLane<P>,
    resource: ResourceId,
    clock: Arc<dyn Clock>,
    trial: bool,
}

impl<P> Outcome<P> {
    fn report(mut self, success: bool) {
        self.trial = false;
        lane::lock(&self.lane)
            .circuit
            .report(self.resource.as_str(), success, self.clock.now());
    }
}

impl<P> Drop for Outcome<P> {
    fn drop(&mut self) {
        if self.trial {
            #[cfg(feature = "tracing")]
            tracing::debug!(resource = %self.resource, "trial call dropped, releasing trial");

            lane::lock(&self.lane)
                .circuit
                .release_trial(self.resource.as_str());
        }
    }
}
