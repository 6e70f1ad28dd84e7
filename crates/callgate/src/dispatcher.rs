//! Periodic driver that works the retry queue.

use crate::error::GateError;
use crate::gate::{Admission, FailureDisposition, Gate};
use callgate_core::{ResourceId, Timestamp};
use callgate_queue::EntryId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tower::{Service, ServiceExt};

/// Request handed to the external call for one queued entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch<P> {
    pub id: EntryId,
    pub resource: ResourceId,
    /// 1 for the first try, 2 for the first retry, and so on.
    pub attempt: u32,
    pub payload: P,
}

/// Authoritative quota data read from a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub remaining: u32,
    pub reset_at: Timestamp,
}

/// What one [`Dispatcher::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Entries handed to the service.
    pub dispatched: usize,
    pub succeeded: usize,
    /// Failed entries put back with a backoff.
    pub retried: usize,
    /// Failed entries given up on.
    pub abandoned: usize,
    /// Entries the gate refused, put back without counting an attempt.
    pub deferred: usize,
}

impl TickReport {
    /// Returns `true` if the tick found nothing to do.
    pub fn is_idle(&self) -> bool {
        self.dispatched == 0 && self.deferred == 0
    }
}

type HintFn<E> = Arc<dyn Fn(&E) -> Option<Duration> + Send + Sync>;
type QuotaFn<R> = Arc<dyn Fn(&R) -> Option<Quota> + Send + Sync>;

/// Pops eligible entries, asks the gate for permission, calls the service
/// and reports the outcome.
///
/// The service is the external call; the dispatcher never implements one.
/// Calls within a tick run one after another.
pub struct Dispatcher<S, P>
where
    S: Service<Dispatch<P>>,
{
    gate: Arc<Gate<P>>,
    service: S,
    interval: Duration,
    max_per_tick: usize,
    persist: bool,
    retry_hint: Option<HintFn<S::Error>>,
    quota: Option<QuotaFn<S::Response>>,
}

impl<S, P> Dispatcher<S, P>
where
    S: Service<Dispatch<P>>,
    P: Clone,
{
    /// Creates a dispatcher with a one second tick.
    pub fn new(gate: Arc<Gate<P>>, service: S) -> Self {
        Self {
            gate,
            service,
            interval: Duration::from_secs(1),
            max_per_tick: 32,
            persist: false,
            retry_hint: None,
            quota: None,
        }
    }

    /// Sets the time between ticks in [`run`](Self::run).
    ///
    /// Also used as the retry delay for entries denied by a circuit whose
    /// trial is out.
    ///
    /// Default: 1 second
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Caps how many entries one tick handles.
    ///
    /// Default: 32
    pub fn max_per_tick(mut self, max: usize) -> Self {
        self.max_per_tick = max.max(1);
        self
    }

    /// Saves gate state after every tick that did something.
    pub fn persist_after_tick(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    /// Extracts a server-provided retry delay from a failed call.
    ///
    /// # Example
    /// ```rust,ignore
    /// dispatcher.retry_hint(|err: &HttpError| {
    ///     err.header("retry-after").and_then(callgate_backoff::parse_retry_after)
    /// })
    /// ```
    pub fn retry_hint<F>(mut self, f: F) -> Self
    where
        F: Fn(&S::Error) -> Option<Duration> + Send + Sync + 'static,
    {
        self.retry_hint = Some(Arc::new(f));
        self
    }

    /// Extracts authoritative quota data from a successful response.
    pub fn quota<F>(mut self, f: F) -> Self
    where
        F: Fn(&S::Response) -> Option<Quota> + Send + Sync + 'static,
    {
        self.quota = Some(Arc::new(f));
        self
    }

    pub fn gate(&self) -> &Arc<Gate<P>> {
        &self.gate
    }

    /// Works through the entries eligible now.
    pub async fn tick(&mut self) -> Result<TickReport, GateError> {
        let mut report = TickReport::default();

        while report.dispatched + report.deferred < self.max_per_tick {
            let Some(entry) = self.gate.pop_eligible() else {
                break;
            };

            if let Admission::Denied(denial) = self.gate.acquire(entry.resource.as_str())? {
                let earliest = denial
                    .retry_at()
                    .unwrap_or_else(|| self.gate.now() + self.interval);
                self.gate.defer(entry, earliest)?;
                report.deferred += 1;
                continue;
            }

            report.dispatched += 1;
            let request = Dispatch {
                id: entry.id.clone(),
                resource: entry.resource.clone(),
                attempt: entry.attempts.saturating_add(1),
                payload: entry.payload.clone(),
            };
            let result = match self.service.ready().await {
                Ok(service) => service.call(request).await,
                Err(error) => Err(error),
            };

            match result {
                Ok(response) => {
                    if let Some(quota) = self.quota.as_ref().and_then(|f| f(&response)) {
                        self.gate.record_external_header(
                            entry.resource.as_str(),
                            quota.remaining,
                            quota.reset_at,
                        )?;
                    }
                    self.gate.report_success(entry)?;
                    report.succeeded += 1;
                }
                Err(error) => {
                    let hint = self.retry_hint.as_ref().and_then(|f| f(&error));
                    match self.gate.report_failure(entry, hint)? {
                        FailureDisposition::Retry { .. } => report.retried += 1,
                        FailureDisposition::Abandoned(_) => report.abandoned += 1,
                    }
                }
            }
        }

        if self.persist && !report.is_idle() {
            self.gate.persist()?;
        }

        #[cfg(feature = "tracing")]
        {
            if !report.is_idle() {
                tracing::debug!(
                    gate = %self.gate.name(),
                    dispatched = report.dispatched,
                    succeeded = report.succeeded,
                    retried = report.retried,
                    abandoned = report.abandoned,
                    deferred = report.deferred,
                    "dispatch tick"
                );
            }
        }

        Ok(report)
    }

    /// Ticks on a fixed interval until `shutdown` resolves.
    ///
    /// Tick errors are logged and do not stop the loop.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut shutdown = std::pin::pin!(shutdown);

        #[cfg(feature = "tracing")]
        tracing::info!(gate = %self.gate.name(), interval = ?self.interval, "dispatcher started");

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(_error) = self.tick().await {
                        #[cfg(feature = "tracing")]
                        tracing::error!(gate = %self.gate.name(), error = %_error, "dispatch tick failed");
                    }
                }
            }
        }

        if self.persist {
            if let Err(_error) = self.gate.persist() {
                #[cfg(feature = "tracing")]
                tracing::error!(gate = %self.gate.name(), error = %_error, "final persist failed");
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(gate = %self.gate.name(), "dispatcher stopped");
    }
}

impl<S, P> std::fmt::Debug for Dispatcher<S, P>
where
    S: Service<Dispatch<P>>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("gate", &self.gate.name())
            .field("interval", &self.interval)
            .field("max_per_tick", &self.max_per_tick)
            .field("persist", &self.persist)
            .finish_non_exhaustive()
    }
}
