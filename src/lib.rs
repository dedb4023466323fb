//! Scene Narrator
//!
//! Turns a live camera feed into short spoken descriptions of what is in view
//! and where.
//!
//! # Architecture
//!
//! Every iteration of the loop runs on one thread:
//!
//! 1. **Acquire**: pull the next frame from a [`ingest::FrameSource`].
//! 2. **Schedule**: only every Nth frame is analyzed ([`scheduler`]).
//! 3. **Detect**: a [`detect::DetectorBackend`] returns labelled boxes.
//! 4. **Reason**: each box becomes a left/center/right and near/mid-distance/far
//!    descriptor ([`spatial`]).
//! 5. **Caption**: the first few objects become one sentence each ([`caption`]).
//! 6. **Narrate**: speech is throttled to one utterance per interval
//!    ([`narration`], [`speech`]).
//! 7. **Render**: boxes and caption go to the display ([`render`]).
//!
//! # Module Structure
//!
//! - `frame`: Frame and AnnotatedFrame
//! - `ingest`: Frame sources (stub://, V4L2)
//! - `detect`: Detector backends and the backend registry
//! - `spatial`, `caption`, `narration`: pure reasoning over detections
//! - `engine`: the per-frame pipeline and run summary
//! - `config`: layered configuration (file, env, CLI)

pub mod caption;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod narration;
pub mod render;
pub mod scheduler;
pub mod spatial;
pub mod speech;

pub use caption::{AnnotatedObject, Caption, CaptionComposer, EMPTY_SCENE_CAPTION};
pub use config::NarratorConfig;
pub use detect::{BoundingBox, Detection, DetectorBackend};
pub use engine::{FrameAnalysis, NarrationEngine, RunSummary};
pub use error::NarratorError;
pub use frame::{AnnotatedFrame, Frame};
pub use ingest::{FrameSource, SyntheticSource};
pub use narration::{Clock, ManualClock, MonotonicClock, NarrationState};
pub use render::{LogRenderer, Overlay, Renderer};
pub use scheduler::{CancelToken, FrameScheduler, LoopState};
pub use spatial::{Depth, Horizontal, SpatialDescriptor, SpatialThresholds};
pub use speech::{CommandSpeechSink, NullSpeechSink, SpeechError, SpeechSink};
