use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};

use scene_narrator::config::{NarratorConfig, SourceSettings};
use scene_narrator::detect::{ScriptedBackend, ScriptedFrame};
use scene_narrator::engine::WAITING_CAPTION;
use scene_narrator::ingest::SourceStats;
use scene_narrator::render::RecordingRenderer;
use scene_narrator::speech::RecordingSpeechSink;
use scene_narrator::{
    AnnotatedFrame, BoundingBox, CancelToken, Clock, Detection, Frame, FrameSource, ManualClock,
    NarrationEngine, NarratorError, Overlay, Renderer, SpeechError, SpeechSink, SyntheticSource,
};

/// Clock that moves forward by `step` every time it is read.
struct SteppingClock {
    inner: ManualClock,
    step: Duration,
}

impl Clock for SteppingClock {
    fn now(&self) -> Duration {
        self.inner.advance(self.step);
        self.inner.now()
    }
}

struct Harness {
    renderer: RecordingRenderer,
    speech: RecordingSpeechSink,
}

fn config() -> NarratorConfig {
    let mut cfg = NarratorConfig::default();
    cfg.source = SourceSettings {
        url: "stub://test".into(),
        width: 300,
        height: 300,
        target_fps: 0,
    };
    cfg
}

fn source(cfg: &NarratorConfig) -> SyntheticSource {
    SyntheticSource::new(cfg.source.clone())
}

fn cup() -> Detection {
    Detection::new("cup", 0.9, BoundingBox::new(100.0, 100.0, 200.0, 200.0))
}

fn engine(
    cfg: &NarratorConfig,
    backend: ScriptedBackend,
    harness: &Harness,
    step: Duration,
) -> NarrationEngine {
    NarrationEngine::new(
        cfg,
        Box::new(backend),
        Box::new(harness.renderer.clone()),
        Box::new(harness.speech.clone()),
    )
    .with_clock(Box::new(SteppingClock {
        inner: ManualClock::new(),
        step,
    }))
}

fn harness() -> Harness {
    Harness {
        renderer: RecordingRenderer::new(),
        speech: RecordingSpeechSink::new(),
    }
}

#[test]
fn analyzes_every_nth_frame_and_throttles_speech() -> Result<()> {
    let cfg = config();
    let h = harness();
    let mut engine = engine(
        &cfg,
        ScriptedBackend::constant(vec![cup()]),
        &h,
        Duration::from_secs(2),
    )
    .with_max_frames(Some(18));
    let mut src = source(&cfg);

    let summary = engine.run(&mut src, CancelToken::new())?;

    assert_eq!(summary.frames_acquired, 18);
    assert_eq!(summary.frames_analyzed, 6);
    // Analyzed frames read the clock at 2s, 4s, ... 12s; only 2s and 8s
    // are more than five seconds apart.
    assert_eq!(summary.narrations, 2);
    assert_eq!(
        h.speech.spoken(),
        vec![
            "Camera is ready.",
            "A cup is on the center mid-distance.",
            "A cup is on the center mid-distance.",
        ]
    );
    assert_eq!(
        engine.narration_state().last_speech(),
        Some(Duration::from_secs(8))
    );
    assert!(!src.is_connected());
    Ok(())
}

#[test]
fn skipped_frames_redisplay_last_render() -> Result<()> {
    let cfg = config();
    let h = harness();
    let mut engine = engine(
        &cfg,
        ScriptedBackend::constant(vec![cup()]),
        &h,
        Duration::from_secs(1),
    )
    .with_max_frames(Some(7));

    engine.run(&mut source(&cfg), CancelToken::new())?;

    let displays = h.renderer.displays();
    assert_eq!(displays.len(), 7);
    assert_eq!(displays[0].caption, WAITING_CAPTION);
    assert_eq!(displays[0].sequence, 1);
    assert_eq!(displays[1].sequence, 1);
    assert_eq!(displays[2].sequence, 3);
    assert_eq!(displays[2].labels, vec!["cup 0.90"]);
    assert_eq!(displays[2].caption, "A cup is on the center mid-distance.");
    assert_eq!(displays[4].sequence, 3);
    assert_eq!(displays[5].sequence, 6);
    assert_eq!(displays[6].sequence, 6);
    Ok(())
}

#[test]
fn empty_scene_is_displayed_but_not_spoken() -> Result<()> {
    let mut cfg = config();
    cfg.frame_skip = 1;
    cfg.speech.greeting = String::new();
    let h = harness();
    let low_confidence = Detection::new("tv", 0.5, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    let mut engine = engine(
        &cfg,
        ScriptedBackend::constant(vec![low_confidence]),
        &h,
        Duration::from_secs(10),
    )
    .with_max_frames(Some(3));

    let summary = engine.run(&mut source(&cfg), CancelToken::new())?;

    assert_eq!(summary.narrations, 0);
    assert!(h.speech.spoken().is_empty());
    assert!(h
        .renderer
        .displays()
        .iter()
        .all(|d| d.caption == "No objects detected." && d.labels.is_empty()));
    Ok(())
}

#[test]
fn detection_failure_treats_frame_as_empty() -> Result<()> {
    let mut cfg = config();
    cfg.frame_skip = 1;
    let h = harness();
    let backend = ScriptedBackend::new(vec![
        ScriptedFrame::Failure("model crashed".into()),
        ScriptedFrame::Objects(vec![cup()]),
    ]);
    let mut engine = engine(&cfg, backend, &h, Duration::from_secs(1)).with_max_frames(Some(2));

    let summary = engine.run(&mut source(&cfg), CancelToken::new())?;

    assert_eq!(summary.detection_failures, 1);
    assert_eq!(summary.frames_analyzed, 2);
    let displays = h.renderer.displays();
    assert_eq!(displays[0].caption, "No objects detected.");
    assert_eq!(displays[1].caption, "A cup is on the center mid-distance.");
    Ok(())
}

#[test]
fn speech_failure_disables_narration_for_the_run() -> Result<()> {
    let mut cfg = config();
    cfg.frame_skip = 1;
    let renderer = RecordingRenderer::new();
    let speech = RecordingSpeechSink::failing_after(1);
    let mut engine = NarrationEngine::new(
        &cfg,
        Box::new(ScriptedBackend::constant(vec![cup()])),
        Box::new(renderer.clone()),
        Box::new(speech.clone()),
    )
    .with_max_frames(Some(4));

    let summary = engine.run(&mut source(&cfg), CancelToken::new())?;

    assert!(summary.speech_disabled);
    assert_eq!(summary.narrations, 0);
    assert_eq!(summary.frames_acquired, 4);
    assert_eq!(speech.spoken(), vec!["Camera is ready."]);
    assert_eq!(renderer.displays().len(), 4);
    Ok(())
}

#[test]
fn muted_run_speaks_nothing() -> Result<()> {
    let mut cfg = config();
    cfg.speech.enabled = false;
    let h = harness();
    let mut engine = engine(
        &cfg,
        ScriptedBackend::constant(vec![cup()]),
        &h,
        Duration::from_secs(10),
    )
    .with_max_frames(Some(6));

    let summary = engine.run(&mut source(&cfg), CancelToken::new())?;

    assert_eq!(summary.narrations, 0);
    assert!(h.speech.spoken().is_empty());
    Ok(())
}

#[test]
fn render_failure_ends_run_and_releases_source() {
    let cfg = config();
    let renderer = RecordingRenderer::failing_after(2);
    let mut engine = NarrationEngine::new(
        &cfg,
        Box::new(ScriptedBackend::constant(vec![cup()])),
        Box::new(renderer.clone()),
        Box::new(RecordingSpeechSink::new()),
    );
    let mut src = source(&cfg);
    let cancel = CancelToken::new();

    let err = engine.run(&mut src, cancel.clone()).unwrap_err();

    assert!(matches!(err, NarratorError::RenderFailure { frame: 3, .. }));
    assert!(cancel.is_cancelled());
    assert!(!src.is_connected());
    assert_eq!(renderer.displays().len(), 2);
}

#[test]
fn source_failure_reports_frames_acquired() {
    let cfg = config();
    let h = harness();
    let mut engine = engine(&cfg, ScriptedBackend::default(), &h, Duration::from_secs(1));
    let mut src = source(&cfg).with_frame_limit(4);

    let err = engine.run(&mut src, CancelToken::new()).unwrap_err();

    assert!(matches!(err, NarratorError::SourceFailure { frames: 4, .. }));
    assert_eq!(engine.summary().frames_acquired, 4);
    assert!(!src.is_connected());
}

#[test]
fn cancel_before_start_acquires_nothing() -> Result<()> {
    let cfg = config();
    let h = harness();
    let mut engine = engine(
        &cfg,
        ScriptedBackend::constant(vec![cup()]),
        &h,
        Duration::from_secs(1),
    );
    let cancel = CancelToken::new();
    cancel.cancel();

    let summary = engine.run(&mut source(&cfg), cancel)?;

    assert_eq!(summary.frames_acquired, 0);
    assert!(h.renderer.displays().is_empty());
    Ok(())
}

struct UnpluggedCamera;

impl FrameSource for UnpluggedCamera {
    fn connect(&mut self) -> Result<()> {
        Err(anyhow!("no such device /dev/video9"))
    }

    fn next_frame(&mut self) -> Result<Frame> {
        Err(anyhow!("not connected"))
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: 0,
            url: "/dev/video9".into(),
        }
    }
}

#[test]
fn connect_failure_is_a_startup_failure() {
    let cfg = config();
    let h = harness();
    let mut engine = engine(&cfg, ScriptedBackend::default(), &h, Duration::from_secs(1));

    let err = engine.run(&mut UnpluggedCamera, CancelToken::new()).unwrap_err();

    assert!(matches!(err, NarratorError::StartupFailure(_)));
    assert!(err.to_string().contains("/dev/video9"));
    assert!(h.speech.spoken().is_empty());
}

/// Renderer whose drawing surface is already gone.
struct ClosedWindow;

impl Renderer for ClosedWindow {
    fn draw(&mut self, _frame: Frame, _overlays: &[Overlay]) -> Result<AnnotatedFrame> {
        Err(anyhow!("window closed"))
    }

    fn display(&mut self, _frame: &AnnotatedFrame, _caption: &str) -> Result<()> {
        Ok(())
    }
}

#[test]
fn draw_failure_cancels_like_display_failure() {
    let cfg = config();
    let mut engine = NarrationEngine::new(
        &cfg,
        Box::new(ScriptedBackend::constant(vec![cup()])),
        Box::new(ClosedWindow),
        Box::new(RecordingSpeechSink::new()),
    );
    let mut src = source(&cfg);
    let cancel = CancelToken::new();

    let err = engine.run(&mut src, cancel.clone()).unwrap_err();

    assert!(matches!(err, NarratorError::RenderFailure { frame: 1, .. }));
    assert!(err.to_string().contains("window closed"));
    assert!(cancel.is_cancelled());
    assert!(!src.is_connected());
}

/// Sink that turns away the first `reject` utterances as if its queue were full.
struct BusySpeaker {
    reject: usize,
    accepted: Arc<Mutex<Vec<String>>>,
}

impl SpeechSink for BusySpeaker {
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        if self.reject > 0 {
            self.reject -= 1;
            return Err(SpeechError::Rejected("speech queue full".into()));
        }
        self.accepted.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

fn busy_engine(cfg: &NarratorConfig, reject: usize) -> (NarrationEngine, Arc<Mutex<Vec<String>>>) {
    let accepted = Arc::new(Mutex::new(Vec::new()));
    let engine = NarrationEngine::new(
        cfg,
        Box::new(ScriptedBackend::constant(vec![cup()])),
        Box::new(RecordingRenderer::new()),
        Box::new(BusySpeaker {
            reject,
            accepted: Arc::clone(&accepted),
        }),
    )
    .with_clock(Box::new(SteppingClock {
        inner: ManualClock::new(),
        step: Duration::from_secs(1),
    }));
    (engine, accepted)
}

#[test]
fn rejected_utterance_is_not_counted_and_keeps_speech_on() -> Result<()> {
    let mut cfg = config();
    cfg.frame_skip = 1;
    cfg.speech.greeting = String::new();
    let (engine, accepted) = busy_engine(&cfg, usize::MAX);
    let mut engine = engine.with_max_frames(Some(4));

    let summary = engine.run(&mut source(&cfg), CancelToken::new())?;

    assert_eq!(summary.narrations, 0);
    assert!(!summary.speech_disabled);
    assert_eq!(engine.narration_state().last_speech(), None);
    assert!(accepted.lock().unwrap().is_empty());
    Ok(())
}

#[test]
fn rejected_utterance_does_not_push_back_the_next_one() -> Result<()> {
    let mut cfg = config();
    cfg.frame_skip = 1;
    cfg.speech.greeting = String::new();
    let (engine, accepted) = busy_engine(&cfg, 1);
    let mut engine = engine.with_max_frames(Some(3));

    let summary = engine.run(&mut source(&cfg), CancelToken::new())?;

    // Frame 1 is turned away at 1s; frame 2 speaks at 2s; frame 3 is throttled.
    assert_eq!(summary.narrations, 1);
    assert!(!summary.speech_disabled);
    assert_eq!(
        engine.narration_state().last_speech(),
        Some(Duration::from_secs(2))
    );
    assert_eq!(
        *accepted.lock().unwrap(),
        vec!["A cup is on the center mid-distance."]
    );
    Ok(())
}
