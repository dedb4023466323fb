//! Speech throttling.
//!
//! Timestamps are monotonic offsets from an engine-local origin, so they are
//! plain `Duration`s and tests can drive them with a [`ManualClock`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// True iff there is something to say and strictly more than `min_interval`
/// has passed since the last accepted narration.
pub fn should_speak(
    now: Duration,
    last_speech: Duration,
    min_interval: Duration,
    has_content: bool,
) -> bool {
    has_content && now.saturating_sub(last_speech) > min_interval
}

/// Rate-limit state for one run.
#[derive(Clone, Debug)]
pub struct NarrationState {
    last_speech: Option<Duration>,
    min_interval: Duration,
}

impl NarrationState {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_speech: None,
            min_interval,
        }
    }

    pub fn last_speech(&self) -> Option<Duration> {
        self.last_speech
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Check without mutating. Before the first narration any content passes.
    pub fn should_speak(&self, now: Duration, has_content: bool) -> bool {
        match self.last_speech {
            Some(last) => should_speak(now, last, self.min_interval, has_content),
            None => has_content,
        }
    }

    /// Record an accepted narration at `now`.
    pub fn record(&mut self, now: Duration) {
        self.last_speech = Some(now);
    }

    /// Check and, on acceptance only, record `now`.
    pub fn try_accept(&mut self, now: Duration, has_content: bool) -> bool {
        let accepted = self.should_speak(now, has_content);
        if accepted {
            self.record(now);
        }
        accepted
    }
}

// ----------------------------------------------------------------------------
// Clocks
// ----------------------------------------------------------------------------

/// Monotonic time source for the engine.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
}

/// Wall-independent clock anchored at construction.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Hand-driven clock. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.nanos.store(now.as_nanos() as u64, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(by.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}
