use crate::events::RateEvent;
use crate::tracker::RateTracker;
use crate::window::ResourceLimit;
use callgate_core::events::{EventListeners, FnListener};
use callgate_core::{ResourceId, Timestamp};
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the rate tracker.
pub struct RateTrackerConfig {
    pub(crate) limits: HashMap<ResourceId, ResourceLimit>,
    pub(crate) event_listeners: EventListeners<RateEvent>,
    pub(crate) name: String,
}

impl RateTrackerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateTrackerConfigBuilder {
        RateTrackerConfigBuilder::new()
    }
}

/// Builder for [`RateTracker`].
pub struct RateTrackerConfigBuilder {
    limits: HashMap<ResourceId, ResourceLimit>,
    event_listeners: EventListeners<RateEvent>,
    name: String,
}

impl Default for RateTrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateTrackerConfigBuilder {
    /// Creates a new builder with no resources configured.
    pub fn new() -> Self {
        Self {
            limits: HashMap::new(),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Allows `max_calls` calls per `window` to `resource` (sliding log).
    ///
    /// Configuring the same resource twice keeps the last limit.
    pub fn limit(
        self,
        resource: impl Into<ResourceId>,
        max_calls: u32,
        window: Duration,
    ) -> Self {
        self.resource(resource, ResourceLimit::new(max_calls, window))
    }

    /// Configures a resource with an explicit [`ResourceLimit`].
    pub fn resource(mut self, resource: impl Into<ResourceId>, limit: ResourceLimit) -> Self {
        self.limits.insert(resource.into(), limit);
        self
    }

    /// Sets the name for this tracker instance (used in logs and metrics).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the listener set, e.g. to share one set across trackers.
    pub fn listeners(mut self, listeners: EventListeners<RateEvent>) -> Self {
        self.event_listeners = listeners;
        self
    }

    /// Registers a callback when a permit is acquired.
    ///
    /// # Callback Signature
    /// `Fn(&ResourceId, u32)` - the resource and the permits left in its window.
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateEvent::PermitAcquired {
                resource,
                remaining,
                ..
            } = event
            {
                f(resource, *remaining);
            }
        }));
        self
    }

    /// Registers a callback when a permit is rejected.
    ///
    /// # Callback Signature
    /// `Fn(&ResourceId, Timestamp)` - the resource and when a permit frees up.
    ///
    /// # Example
    /// ```rust
    /// use callgate_ratelimiter::RateTrackerConfig;
    /// use std::time::Duration;
    ///
    /// let tracker = RateTrackerConfig::builder()
    ///     .limit("brave-search", 1, Duration::from_secs(1800))
    ///     .on_permit_rejected(|resource, reset_at| {
    ///         println!("{resource} is out of quota until {reset_at}");
    ///     })
    ///     .build();
    /// ```
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, Timestamp) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateEvent::PermitRejected {
                resource, reset_at, ..
            } = event
            {
                f(resource, *reset_at);
            }
        }));
        self
    }

    /// Registers a callback when a window expires and its counter resets.
    pub fn on_window_reset<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateEvent::WindowReset { resource, .. } = event {
                f(resource);
            }
        }));
        self
    }

    /// Registers a callback when external quota data overrides the estimate.
    pub fn on_external_override<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, u32, Timestamp) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateEvent::ExternalOverride {
                resource,
                remaining,
                reset_at,
                ..
            } = event
            {
                f(resource, *remaining, *reset_at);
            }
        }));
        self
    }

    /// Builds the tracker.
    pub fn build(self) -> RateTracker {
        RateTracker::new(RateTrackerConfig {
            limits: self.limits,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}
