//! Frame scheduling and cancellation.
//!
//! The loop is a two-state machine, Running -> Stopped. The only way to stop
//! is the [`CancelToken`], which input handlers set from any thread and the
//! loop polls once per iteration. Stopped is terminal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared "stop requested" flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// True iff frame number `frame_counter` is selected for analysis.
pub fn should_analyze(frame_counter: u64, frame_skip: u64) -> bool {
    frame_skip != 0 && frame_counter % frame_skip == 0
}

/// Loop counters. `running` only ever goes from true to false.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopState {
    frame_counter: u64,
    running: bool,
}

impl LoopState {
    fn new() -> Self {
        Self {
            frame_counter: 0,
            running: true,
        }
    }

    pub fn frame_counter(&self) -> u64 {
        self.frame_counter
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// What the loop should do with the frame it just acquired.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTick {
    /// Counter value after this acquisition, starting at 1.
    pub frame: u64,
    pub analyze: bool,
}

pub struct FrameScheduler {
    frame_skip: u64,
    state: LoopState,
    cancel: CancelToken,
}

impl FrameScheduler {
    /// `frame_skip` below 1 is treated as 1 (analyze every frame).
    pub fn new(frame_skip: u64, cancel: CancelToken) -> Self {
        Self {
            frame_skip: frame_skip.max(1),
            state: LoopState::new(),
            cancel,
        }
    }

    pub fn frame_skip(&self) -> u64 {
        self.frame_skip
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Read the cancel flag and return whether the loop may continue.
    ///
    /// Observing the flag moves the state to Stopped for good.
    pub fn poll(&mut self) -> bool {
        if self.state.running && self.cancel.is_cancelled() {
            self.state.running = false;
            log::info!(
                "stop requested after {} frames",
                self.state.frame_counter
            );
        }
        self.state.running
    }

    /// Count one acquired frame and decide whether it is analyzed.
    pub fn on_frame_acquired(&mut self) -> FrameTick {
        self.state.frame_counter += 1;
        let frame = self.state.frame_counter;
        FrameTick {
            frame,
            analyze: should_analyze(frame, self.frame_skip),
        }
    }
}
