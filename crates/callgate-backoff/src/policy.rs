use crate::interval::{ExponentialBackoff, IntervalFunction};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of consulting the backoff policy after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffDecision {
    /// Wait this long, then retry.
    Retry(Duration),
    /// Stop retrying; the failure is terminal.
    Abandon,
}

impl BackoffDecision {
    /// The wait, if the decision is to retry.
    pub fn wait(&self) -> Option<Duration> {
        match self {
            BackoffDecision::Retry(wait) => Some(*wait),
            BackoffDecision::Abandon => None,
        }
    }

    pub fn is_abandon(&self) -> bool {
        matches!(self, BackoffDecision::Abandon)
    }
}

/// Decides how long to wait before a retry, or whether to give up.
///
/// A server-provided hint always beats the computed interval. Once the
/// number of failed attempts reaches `max_attempts` the policy abandons,
/// regardless of any hint.
#[derive(Clone)]
pub struct BackoffPolicy {
    interval: Arc<dyn IntervalFunction>,
    max_attempts: u32,
}

impl BackoffPolicy {
    /// Creates a new policy builder.
    pub fn builder() -> BackoffPolicyBuilder {
        BackoffPolicyBuilder::new()
    }

    /// Maximum number of failed attempts before abandoning.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after the `attempts`th failed attempt.
    ///
    /// `attempts` counts failures including the one just observed; zero is
    /// treated as one.
    pub fn decide(&self, attempts: u32, hint: Option<Duration>) -> BackoffDecision {
        let attempts = attempts.max(1);
        if attempts >= self.max_attempts {
            return BackoffDecision::Abandon;
        }
        match hint {
            Some(wait) => BackoffDecision::Retry(wait),
            None => BackoffDecision::Retry(self.interval.next_interval(attempts - 1)),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        BackoffPolicyBuilder::new().build()
    }
}

impl fmt::Debug for BackoffPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackoffPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Builder for [`BackoffPolicy`].
pub struct BackoffPolicyBuilder {
    interval: Option<Arc<dyn IntervalFunction>>,
    max_attempts: u32,
}

impl Default for BackoffPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffPolicyBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            interval: None,
            max_attempts: 5,
        }
    }

    /// Sets how many failed attempts are allowed before abandoning.
    ///
    /// A value of zero is treated as one.
    ///
    /// Default: 5
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Uses `base * 2^(attempt - 1)` capped at `max_interval`.
    ///
    /// Default: 1 second base, 5 minute cap
    pub fn exponential(self, base: Duration, max_interval: Duration) -> Self {
        self.interval(ExponentialBackoff::new(base).max_interval(max_interval))
    }

    /// Uses a custom interval function.
    pub fn interval<I>(mut self, interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval = Some(Arc::new(interval));
        self
    }

    /// Builds the policy.
    pub fn build(self) -> BackoffPolicy {
        let interval = self.interval.unwrap_or_else(|| {
            Arc::new(
                ExponentialBackoff::new(Duration::from_secs(1))
                    .max_interval(Duration::from_secs(300)),
            )
        });
        BackoffPolicy {
            interval,
            max_attempts: self.max_attempts,
        }
    }
}
