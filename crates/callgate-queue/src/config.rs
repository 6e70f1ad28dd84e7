use crate::entry::EntryId;
use crate::events::QueueEvent;
use crate::history::DEFAULT_HISTORY_CAPACITY;
use crate::queue::RequestQueue;
use callgate_core::events::{EventListeners, FnListener};
use callgate_core::ResourceId;

/// Configuration for the request queue.
pub struct RequestQueueConfig {
    pub(crate) history_capacity: usize,
    pub(crate) event_listeners: EventListeners<QueueEvent>,
    pub(crate) name: String,
}

impl RequestQueueConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RequestQueueConfigBuilder {
        RequestQueueConfigBuilder::new()
    }
}

/// Builder for [`RequestQueue`].
pub struct RequestQueueConfigBuilder {
    history_capacity: usize,
    event_listeners: EventListeners<QueueEvent>,
    name: String,
}

impl Default for RequestQueueConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueueConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets how many records each of the processed and abandoned histories
    /// keeps.
    ///
    /// Default: 10. Values below 1 are raised to 1.
    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Sets the name for this queue instance (used in logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Replaces the listener set, e.g. to share one set across queues.
    pub fn listeners(mut self, listeners: EventListeners<QueueEvent>) -> Self {
        self.event_listeners = listeners;
        self
    }

    /// Registers a callback when an entry is enqueued.
    pub fn on_enqueued<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, &EntryId) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let QueueEvent::Enqueued {
                resource, entry_id, ..
            } = event
            {
                f(resource, entry_id);
            }
        }));
        self
    }

    /// Registers a callback when an entry completes successfully.
    pub fn on_completed<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, &EntryId) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let QueueEvent::Completed {
                resource, entry_id, ..
            } = event
            {
                f(resource, entry_id);
            }
        }));
        self
    }

    /// Registers a callback when an entry is abandoned.
    ///
    /// # Callback Signature
    /// `Fn(&ResourceId, &EntryId, &str)` - the resource, the entry, and the
    /// reason it was given up on.
    pub fn on_abandoned<F>(mut self, f: F) -> Self
    where
        F: Fn(&ResourceId, &EntryId, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let QueueEvent::Abandoned {
                resource,
                entry_id,
                reason,
                ..
            } = event
            {
                f(resource, entry_id, reason);
            }
        }));
        self
    }

    /// Builds the queue.
    pub fn build<P>(self) -> RequestQueue<P> {
        RequestQueue::new(RequestQueueConfig {
            history_capacity: self.history_capacity,
            event_listeners: self.event_listeners,
            name: self.name,
        })
    }
}
