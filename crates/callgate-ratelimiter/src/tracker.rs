use crate::config::RateTrackerConfig;
use crate::events::RateEvent;
use crate::window::{RateDecision, RateState, RateWindow, ResourceLimit};
use callgate_core::events::EventListeners;
use callgate_core::{ResourceId, Timestamp};
#[cfg(feature = "metrics")]
use metrics::counter;
use std::collections::{BTreeMap, HashMap};

/// Per-resource rate tracker.
///
/// Owns one [`RateWindow`] per configured resource. All operations are
/// synchronous and in-memory; callers serialize access per resource.
pub struct RateTracker {
    windows: HashMap<ResourceId, RateWindow>,
    event_listeners: EventListeners<RateEvent>,
    name: String,
}

impl RateTracker {
    pub(crate) fn new(config: RateTrackerConfig) -> Self {
        let windows = config
            .limits
            .into_iter()
            .map(|(id, limit)| (id, RateWindow::new(limit)))
            .collect();
        Self {
            windows,
            event_listeners: config.event_listeners,
            name: config.name,
        }
    }

    /// Name of this tracker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if `resource` has a configured limit.
    pub fn contains(&self, resource: &str) -> bool {
        self.windows.contains_key(resource)
    }

    /// The configured limit of `resource`.
    pub fn limit(&self, resource: &str) -> Option<&ResourceLimit> {
        self.windows.get(resource).map(RateWindow::limit)
    }

    /// Consumes a permit for `resource` if its window has one left.
    ///
    /// An expired window is reset first. A denial leaves the state
    /// untouched.
    pub fn try_consume(&mut self, resource: &str, now: Timestamp) -> RateDecision {
        let Some(window) = self.windows.get_mut(resource) else {
            return RateDecision::Unconfigured;
        };
        let id = ResourceId::from(resource);

        if window.roll(now) {
            self.event_listeners.emit(&RateEvent::WindowReset {
                resource: id.clone(),
                timestamp: now,
            });
        }

        let decision = window.try_consume(now);
        match decision {
            RateDecision::Allowed { remaining } => {
                self.event_listeners.emit(&RateEvent::PermitAcquired {
                    resource: id.clone(),
                    timestamp: now,
                    remaining,
                });

                #[cfg(feature = "metrics")]
                counter!("callgate_rate_permits_total", "resource" => id.to_string(), "outcome" => "acquired")
                    .increment(1);
            }
            RateDecision::Denied { reset_at } => {
                #[cfg(feature = "tracing")]
                tracing::debug!(resource = %id, %reset_at, "rate limit exhausted");

                self.event_listeners.emit(&RateEvent::PermitRejected {
                    resource: id.clone(),
                    timestamp: now,
                    reset_at,
                });

                #[cfg(feature = "metrics")]
                counter!("callgate_rate_permits_total", "resource" => id.to_string(), "outcome" => "rejected")
                    .increment(1);
            }
            RateDecision::Unconfigured => {}
        }
        decision
    }

    /// Whether a permit would be granted, without consuming one.
    pub fn peek(&mut self, resource: &str, now: Timestamp) -> RateDecision {
        match self.windows.get_mut(resource) {
            Some(window) => window.peek(now),
            None => RateDecision::Unconfigured,
        }
    }

    /// Permits left for `resource` at `now`.
    pub fn remaining(&mut self, resource: &str, now: Timestamp) -> Option<u32> {
        self.windows.get_mut(resource).map(|w| w.remaining(now))
    }

    /// Applies authoritative quota data, e.g. parsed from response headers.
    ///
    /// The external values always win over the local estimate. Returns
    /// `false` if the resource is not configured.
    pub fn record_external_header(
        &mut self,
        resource: &str,
        remaining: u32,
        reset_at: Timestamp,
        now: Timestamp,
    ) -> bool {
        let Some(window) = self.windows.get_mut(resource) else {
            return false;
        };
        let id = ResourceId::from(resource);
        window.apply_external(remaining, reset_at, now);

        #[cfg(feature = "tracing")]
        tracing::debug!(resource = %id, remaining, %reset_at, "external quota applied");

        self.event_listeners.emit(&RateEvent::ExternalOverride {
            resource: id,
            timestamp: now,
            remaining,
            reset_at,
        });
        true
    }

    /// State of `resource` as of its last mutation.
    pub fn state(&self, resource: &str) -> Option<&RateState> {
        self.windows.get(resource).map(RateWindow::state)
    }

    /// Copies every resource's state, keyed by id.
    pub fn snapshot(&self) -> BTreeMap<ResourceId, RateState> {
        self.windows
            .iter()
            .map(|(id, w)| (id.clone(), w.state().clone()))
            .collect()
    }

    /// Restores persisted state for configured resources.
    ///
    /// Entries for resources no longer configured are ignored; limits always
    /// come from the current configuration.
    pub fn restore(&mut self, states: BTreeMap<ResourceId, RateState>) {
        for (id, state) in states {
            if let Some(window) = self.windows.get_mut(&id) {
                *window = RateWindow::with_state(*window.limit(), state);
            }
        }
    }
}

impl std::fmt::Debug for RateTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateTracker")
            .field("name", &self.name)
            .field("resources", &self.windows.len())
            .finish()
    }
}
