use callgate_core::Timestamp;
use std::collections::VecDeque;
use std::time::Duration;

/// How calls are counted against a resource's quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WindowKind {
    /// Window opens at the first call after the previous one expired and
    /// the counter resets wholesale when it ends.
    Fixed,
    /// Every permitted call is remembered for one window duration; a slot
    /// frees up when its call ages out. Guarantees at most `max_calls` in
    /// any interval of one window length.
    #[default]
    SlidingLog,
}

/// Quota of a single resource: at most `max_calls` per `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceLimit {
    /// Maximum permitted calls per window.
    pub max_calls: u32,
    /// Window length.
    pub window: Duration,
    /// Counting strategy.
    #[cfg_attr(feature = "serde", serde(default))]
    pub kind: WindowKind,
}

impl ResourceLimit {
    /// Creates a sliding-log limit.
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            kind: WindowKind::SlidingLog,
        }
    }

    /// Creates a fixed-window limit.
    pub fn fixed(max_calls: u32, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            kind: WindowKind::Fixed,
        }
    }
}

/// Mutable counter state of one resource.
///
/// `reset_at` is the instant the next slot frees up: the end of the window
/// for fixed windows, the expiry of the oldest remembered call for sliding
/// logs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RateState {
    /// Calls counted in the current window.
    pub count: u32,
    /// When the current window started.
    pub window_start: Timestamp,
    /// When the window resets.
    pub reset_at: Timestamp,
    /// Times of permitted calls still inside the window (sliding log only).
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "VecDeque::is_empty")
    )]
    pub recent: VecDeque<Timestamp>,
    /// Set while an authoritative external quota governs the window.
    #[cfg_attr(feature = "serde", serde(default))]
    pub pinned: bool,
}

/// Result of asking for a permit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The call may proceed; the permit has been consumed.
    Allowed {
        /// Permits left in the window after this one.
        remaining: u32,
    },
    /// Quota exhausted; nothing was consumed.
    Denied {
        /// Earliest instant a permit could become available.
        reset_at: Timestamp,
    },
    /// The resource has no configured limit.
    Unconfigured,
}

impl RateDecision {
    /// Returns `true` if a permit was granted.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

/// Rate state machine for a single resource.
#[derive(Debug, Clone)]
pub struct RateWindow {
    limit: ResourceLimit,
    state: RateState,
}

impl RateWindow {
    /// Creates a window with no calls recorded.
    pub fn new(limit: ResourceLimit) -> Self {
        Self {
            limit,
            state: RateState::default(),
        }
    }

    /// Recreates a window from persisted state.
    pub fn with_state(limit: ResourceLimit, state: RateState) -> Self {
        Self { limit, state }
    }

    /// The configured limit.
    pub fn limit(&self) -> &ResourceLimit {
        &self.limit
    }

    /// Current state, as of the last mutation.
    pub fn state(&self) -> &RateState {
        &self.state
    }

    /// Expires whatever the passage of time has expired.
    ///
    /// Returns `true` if a whole window was reset.
    pub fn roll(&mut self, now: Timestamp) -> bool {
        let window = self.limit.window;
        let state = &mut self.state;

        if state.pinned || self.limit.kind == WindowKind::Fixed {
            if now >= state.reset_at {
                let had_calls = state.count > 0 || state.pinned;
                state.count = 0;
                state.window_start = now;
                state.reset_at = now + window;
                state.pinned = false;
                state.recent.clear();
                return had_calls;
            }
            return false;
        }

        let before = state.recent.len();
        while let Some(&oldest) = state.recent.front() {
            if oldest + window <= now {
                state.recent.pop_front();
            } else {
                break;
            }
        }
        state.count = state.recent.len() as u32;
        match state.recent.front() {
            Some(&oldest) => {
                state.window_start = oldest;
                state.reset_at = oldest + window;
            }
            None => {
                state.window_start = now;
                state.reset_at = now;
            }
        }
        before > 0 && state.recent.is_empty()
    }

    /// Whether a permit would be granted at `now`, without consuming it.
    pub fn peek(&mut self, now: Timestamp) -> RateDecision {
        self.roll(now);
        if self.state.count < self.limit.max_calls {
            RateDecision::Allowed {
                remaining: self.limit.max_calls - self.state.count - 1,
            }
        } else {
            RateDecision::Denied {
                reset_at: self.state.reset_at,
            }
        }
    }

    /// Consumes a permit if one is available.
    pub fn try_consume(&mut self, now: Timestamp) -> RateDecision {
        let decision = self.peek(now);
        if decision.is_allowed() {
            let state = &mut self.state;
            state.count += 1;
            if !state.pinned && self.limit.kind == WindowKind::SlidingLog {
                if state.recent.is_empty() {
                    state.window_start = now;
                    state.reset_at = now + self.limit.window;
                }
                state.recent.push_back(now);
            }
        }
        decision
    }

    /// Permits left at `now`.
    pub fn remaining(&mut self, now: Timestamp) -> u32 {
        self.roll(now);
        self.limit.max_calls.saturating_sub(self.state.count)
    }

    /// Replaces the local estimate with authoritative quota data.
    ///
    /// Until `reset_at` the window behaves as fixed with
    /// `max_calls - remaining` calls already spent.
    pub fn apply_external(&mut self, remaining: u32, reset_at: Timestamp, now: Timestamp) {
        let state = &mut self.state;
        state.count = self
            .limit
            .max_calls
            .saturating_sub(remaining.min(self.limit.max_calls));
        state.window_start = now;
        state.reset_at = reset_at;
        state.pinned = true;
        state.recent.clear();
    }
}
