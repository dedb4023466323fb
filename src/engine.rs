//! The narration loop.
//!
//! One thread drives every iteration:
//! 1. Poll the cancel token; stop before acquiring if it is set
//! 2. Acquire a frame and count it
//! 3. On analyzed frames: detect, filter by confidence, describe, caption,
//!    and maybe narrate
//! 4. Render (skipped frames re-display the last rendered frame)
//!
//! Detection and speech failures stay inside the iteration. Source and render
//! failures end the run after the same teardown a cancellation gets.

use std::time::{Duration, Instant};

use crate::caption::{AnnotatedObject, Caption, CaptionComposer};
use crate::config::NarratorConfig;
use crate::detect::{Detection, DetectorBackend};
use crate::error::NarratorError;
use crate::frame::{AnnotatedFrame, Frame};
use crate::ingest::FrameSource;
use crate::narration::{Clock, MonotonicClock, NarrationState};
use crate::render::{Overlay, Renderer};
use crate::scheduler::{CancelToken, FrameScheduler};
use crate::spatial::SpatialThresholds;
use crate::speech::{SpeechError, SpeechSink};

/// Caption shown before the first analyzed frame.
pub const WAITING_CAPTION: &str = "Looking around...";

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Everything derived from one analyzed frame.
#[derive(Clone, Debug)]
pub struct FrameAnalysis {
    /// Detections that passed the confidence filter, in detector order.
    pub detections: Vec<Detection>,
    pub objects: Vec<AnnotatedObject>,
    pub caption: Caption,
}

impl FrameAnalysis {
    /// Only frames with at least one surviving object are worth speaking.
    pub fn has_content(&self) -> bool {
        !self.objects.is_empty()
    }
}

/// Turn raw detections into spatial facts and a caption.
///
/// Detections must score strictly above `confidence_threshold`. Order is
/// preserved throughout.
pub fn assemble(
    detections: Vec<Detection>,
    confidence_threshold: f32,
    thresholds: &SpatialThresholds,
    composer: &CaptionComposer,
    width: u32,
    height: u32,
) -> FrameAnalysis {
    let detections: Vec<Detection> = detections
        .into_iter()
        .filter(|d| d.confidence > confidence_threshold)
        .collect();
    let objects: Vec<AnnotatedObject> = detections
        .iter()
        .map(|d| AnnotatedObject::new(d.label.clone(), thresholds.describe(&d.bbox, width, height)))
        .collect();
    let caption = composer.compose(&objects);
    FrameAnalysis {
        detections,
        objects,
        caption,
    }
}

/// Counters reported when a run ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_acquired: u64,
    pub frames_analyzed: u64,
    pub detection_failures: u64,
    pub narrations: u64,
    pub speech_disabled: bool,
}

pub struct NarrationEngine {
    detector: Box<dyn DetectorBackend>,
    renderer: Box<dyn Renderer>,
    speech: Box<dyn SpeechSink>,
    clock: Box<dyn Clock>,
    thresholds: SpatialThresholds,
    composer: CaptionComposer,
    confidence_threshold: f32,
    frame_skip: u64,
    narration: NarrationState,
    speech_enabled: bool,
    greeting: Option<String>,
    max_frames: Option<u64>,
    summary: RunSummary,
}

impl NarrationEngine {
    pub fn new(
        config: &NarratorConfig,
        detector: Box<dyn DetectorBackend>,
        renderer: Box<dyn Renderer>,
        speech: Box<dyn SpeechSink>,
    ) -> Self {
        let greeting = config.speech.greeting.trim();
        Self {
            detector,
            renderer,
            speech,
            clock: Box::new(MonotonicClock::new()),
            thresholds: SpatialThresholds::from_settings(&config.spatial),
            composer: CaptionComposer::new(config.max_objects),
            confidence_threshold: config.detector.confidence_threshold,
            frame_skip: config.frame_skip,
            narration: NarrationState::new(config.speech.min_interval),
            speech_enabled: config.speech.enabled,
            greeting: (!greeting.is_empty()).then(|| greeting.to_string()),
            max_frames: None,
            summary: RunSummary::default(),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Stop after acquiring `limit` frames, as if cancelled.
    pub fn with_max_frames(mut self, limit: Option<u64>) -> Self {
        self.max_frames = limit;
        self
    }

    pub fn narration_state(&self) -> &NarrationState {
        &self.narration
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Run until cancelled or until the source or display fails.
    ///
    /// The source is connected here and always closed before returning.
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        cancel: CancelToken,
    ) -> Result<RunSummary, NarratorError> {
        source.connect().map_err(NarratorError::StartupFailure)?;
        if let Err(err) = self.detector.warm_up() {
            source.close();
            return Err(NarratorError::StartupFailure(
                err.context(format!("warming up detector {}", self.detector.name())),
            ));
        }

        log::info!(
            "narrator running: detector={} frame_skip={} confidence>{} interval={:?} max_objects={}",
            self.detector.name(),
            self.frame_skip,
            self.confidence_threshold,
            self.narration.min_interval(),
            self.composer.max_objects()
        );

        if let Some(greeting) = self.greeting.clone() {
            self.speak(&greeting);
        }

        let mut scheduler = FrameScheduler::new(self.frame_skip, cancel);
        let result = self.run_loop(source, &mut scheduler);

        source.close();
        self.speech.shutdown();
        log::info!(
            "narrator stopped: frames={} analyzed={} detection_failures={} narrations={} speech_disabled={}",
            self.summary.frames_acquired,
            self.summary.frames_analyzed,
            self.summary.detection_failures,
            self.summary.narrations,
            self.summary.speech_disabled
        );
        result.map(|()| self.summary.clone())
    }

    fn run_loop(
        &mut self,
        source: &mut dyn FrameSource,
        scheduler: &mut FrameScheduler,
    ) -> Result<(), NarratorError> {
        let cancel = scheduler.cancel_token();
        let mut last_rendered: Option<(AnnotatedFrame, String)> = None;
        let mut last_health_log = Instant::now();

        while scheduler.poll() {
            let frame = source
                .next_frame()
                .map_err(|error| NarratorError::SourceFailure {
                    frames: scheduler.state().frame_counter(),
                    error,
                })?;
            let tick = scheduler.on_frame_acquired();
            self.summary.frames_acquired += 1;

            if tick.analyze {
                self.summary.frames_analyzed += 1;
                let analysis = self.analyze(&frame, tick.frame);
                self.narrate(&analysis, tick.frame);
                let overlays: Vec<Overlay> =
                    analysis.detections.iter().map(Overlay::for_detection).collect();
                let annotated = self.draw(frame, &overlays, tick.frame, &cancel)?;
                last_rendered = Some((annotated, analysis.caption.text()));
            } else if last_rendered.is_none() {
                let annotated = self.draw(frame, &[], tick.frame, &cancel)?;
                last_rendered = Some((annotated, WAITING_CAPTION.to_string()));
            }

            if let Some((annotated, caption)) = &last_rendered {
                if let Err(error) = self.renderer.display(annotated, caption) {
                    return Err(render_failure(&cancel, tick.frame, error));
                }
            }

            if self.max_frames.is_some_and(|limit| tick.frame >= limit) {
                log::info!("frame limit {} reached", tick.frame);
                cancel.cancel();
            }

            if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
                let stats = source.stats();
                log::info!(
                    "source health={} frames={} url={} analyzed={} narrations={}",
                    source.is_healthy(),
                    stats.frames_captured,
                    stats.url,
                    self.summary.frames_analyzed,
                    self.summary.narrations
                );
                last_health_log = Instant::now();
            }
        }
        Ok(())
    }

    fn analyze(&mut self, frame: &Frame, frame_no: u64) -> FrameAnalysis {
        let detections = match self
            .detector
            .detect(frame.pixels(), frame.width, frame.height)
        {
            Ok(detections) => detections,
            Err(error) => {
                self.summary.detection_failures += 1;
                log::warn!(
                    "{}; treating frame as empty",
                    NarratorError::DetectionFailure {
                        frame: frame_no,
                        error
                    }
                );
                Vec::new()
            }
        };
        let analysis = assemble(
            detections,
            self.confidence_threshold,
            &self.thresholds,
            &self.composer,
            frame.width,
            frame.height,
        );
        log::debug!(
            "frame #{}: {} objects in {}ms: {}",
            frame_no,
            analysis.objects.len(),
            frame.age_ms(),
            analysis.caption
        );
        analysis
    }

    fn narrate(&mut self, analysis: &FrameAnalysis, frame_no: u64) {
        if !self.speech_enabled {
            return;
        }
        let now = self.clock.now();
        if !self.narration.should_speak(now, analysis.has_content()) {
            if analysis.has_content() {
                log::debug!("narration suppressed on frame #{}", frame_no);
            }
            return;
        }
        let text = analysis.caption.text();
        if self.speak(&text) {
            self.narration.record(now);
            self.summary.narrations += 1;
            log::info!(
                "narration #{} (frame #{}): {}",
                self.summary.narrations,
                frame_no,
                text
            );
        }
    }

    /// Hand `text` to the speech sink. A rejected utterance is skipped; an
    /// unavailable synthesizer mutes the rest of the run.
    fn speak(&mut self, text: &str) -> bool {
        if !self.speech_enabled {
            return false;
        }
        match self.speech.speak(text) {
            Ok(()) => true,
            Err(SpeechError::Rejected(reason)) => {
                log::debug!("speech skipped {:?}: {}", text, reason);
                false
            }
            Err(err) => {
                log::error!(
                    "{}; narration disabled for the rest of the run",
                    NarratorError::from(err)
                );
                self.speech_enabled = false;
                self.summary.speech_disabled = true;
                false
            }
        }
    }

    fn draw(
        &mut self,
        frame: Frame,
        overlays: &[Overlay],
        frame_no: u64,
        cancel: &CancelToken,
    ) -> Result<AnnotatedFrame, NarratorError> {
        self.renderer
            .draw(frame, overlays)
            .map_err(|error| render_failure(cancel, frame_no, error))
    }
}

/// A lost display stops the loop the same way a cancel request does.
fn render_failure(cancel: &CancelToken, frame: u64, error: anyhow::Error) -> NarratorError {
    cancel.cancel();
    NarratorError::RenderFailure { frame, error }
}
