//! Frame scheduling primitives.
//!
//! Two coalescing helpers used by the interaction layer and the render
//! loop:
//!
//! - [`FrameScheduler`]: a single pending slot; the latest value wins and at
//!   most one frame is requested no matter how many values arrive.
//! - [`RenderThrottle`]: at most one render per time window. A request
//!   inside an open window is coalesced into one trailing render, never
//!   queued.

use std::time::{Duration, Instant};

/// A single-slot queue: at most one pending value, overwritten by the latest.
#[derive(Debug, Clone)]
pub struct FrameScheduler<T> {
    pending: Option<T>,
    coalesced: u64,
}

impl<T> Default for FrameScheduler<T> {
    fn default() -> Self {
        Self {
            pending: None,
            coalesced: 0,
        }
    }
}

impl<T> FrameScheduler<T> {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for the next frame.
    ///
    /// Returns `true` if the caller needs to request a frame (the slot was
    /// empty), `false` if a frame is already pending.
    pub fn schedule(&mut self, value: T) -> bool {
        let needs_frame = self.pending.is_none();
        if !needs_frame {
            self.coalesced += 1;
        }
        self.pending = Some(value);
        needs_frame
    }

    /// Take the pending value at frame time.
    pub fn take(&mut self) -> Option<T> {
        self.pending.take()
    }

    /// Whether a value is waiting for a frame.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drop the pending value.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// How many values were overwritten before reaching a frame.
    #[must_use]
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

/// Throttle window configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Minimum time between two renders.
    pub frame_budget: Duration,
}

impl ThrottleConfig {
    /// ~60 fps.
    #[must_use]
    pub const fn desktop() -> Self {
        Self {
            frame_budget: Duration::from_millis(16),
        }
    }

    /// ~30 fps, for touch devices.
    #[must_use]
    pub const fn mobile() -> Self {
        Self {
            frame_budget: Duration::from_millis(33),
        }
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

/// What the caller should do with a render request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Render immediately.
    RenderNow,
    /// A render will happen when the window closes; see
    /// [`RenderThrottle::poll`].
    Coalesced,
}

/// Coalesces render requests into at most one per frame budget.
#[derive(Debug, Clone)]
pub struct RenderThrottle {
    config: ThrottleConfig,
    last_render: Option<Instant>,
    pending: bool,
}

impl RenderThrottle {
    /// Create a throttle.
    #[must_use]
    pub fn new(config: ThrottleConfig) -> Self {
        Self {
            config,
            last_render: None,
            pending: false,
        }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> ThrottleConfig {
        self.config
    }

    fn window_open(&self, now: Instant) -> bool {
        self.last_render
            .is_some_and(|last| now.saturating_duration_since(last) < self.config.frame_budget)
    }

    /// Ask to render at `now`.
    pub fn request(&mut self, now: Instant) -> ThrottleDecision {
        if self.window_open(now) {
            self.pending = true;
            ThrottleDecision::Coalesced
        } else {
            self.last_render = Some(now);
            self.pending = false;
            ThrottleDecision::RenderNow
        }
    }

    /// Check for a coalesced render whose window has closed.
    ///
    /// Returns `true` exactly once per coalesced burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        if self.pending && !self.window_open(now) {
            self.pending = false;
            self.last_render = Some(now);
            true
        } else {
            false
        }
    }

    /// When the pending render becomes due, if one is pending.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.pending {
            return None;
        }
        self.last_render.map(|last| last + self.config.frame_budget)
    }

    /// Whether a render is waiting for its window.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
