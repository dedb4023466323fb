//! narratord - spoken scene narration from a camera feed
//!
//! This daemon:
//! 1. Loads configuration (file at $NARRATOR_CONFIG, env overrides, CLI flags)
//! 2. Opens the camera and detector
//! 3. Runs the narration loop until Ctrl-C, a "q" line on stdin, or a fatal error

use anyhow::Result;
use clap::Parser;
use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;

use scene_narrator::config::{interval_from_secs, NarratorConfig};
use scene_narrator::detect::build_backend;
use scene_narrator::ingest::open_source;
use scene_narrator::{
    CancelToken, CommandSpeechSink, LogRenderer, NarrationEngine, NarratorError, NullSpeechSink,
    Renderer, SpeechSink,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file (overrides $NARRATOR_CONFIG).
    #[arg(long, env = "NARRATOR_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source: stub://<name>, /dev/videoN or v4l2://<device>.
    #[arg(long)]
    source: Option<String>,
    /// Detector backend name.
    #[arg(long)]
    detector: Option<String>,
    /// ONNX model for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Analyze every Nth frame.
    #[arg(long)]
    frame_skip: Option<u64>,
    /// Minimum detection confidence (exclusive).
    #[arg(long)]
    confidence: Option<f32>,
    /// Minimum seconds between narrations.
    #[arg(long)]
    interval: Option<f64>,
    /// Disable speech output.
    #[arg(long)]
    mute: bool,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Do not watch stdin for "q".
    #[arg(long)]
    no_stdin: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args).map_err(NarratorError::StartupFailure)?;

    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received");
        handler_token.cancel();
    })
    .map_err(|err| NarratorError::StartupFailure(err.into()))?;
    if !args.no_stdin {
        spawn_quit_watcher(cancel.clone());
    }

    let mut source = open_source(&config.source).map_err(NarratorError::StartupFailure)?;
    let detector = build_backend(&config.detector).map_err(NarratorError::StartupFailure)?;
    let renderer = build_renderer(&config);
    let speech: Box<dyn SpeechSink> = if config.speech.enabled {
        Box::new(CommandSpeechSink::spawn(&config.speech))
    } else {
        log::info!("speech muted");
        Box::new(NullSpeechSink)
    };

    log::info!(
        "source={} {}x{}@{}fps",
        config.source.url,
        config.source.width,
        config.source.height,
        config.source.target_fps
    );

    let mut engine =
        NarrationEngine::new(&config, detector, renderer, speech).with_max_frames(args.max_frames);
    engine.run(source.as_mut(), cancel)?;
    Ok(())
}

fn load_config(args: &Args) -> Result<NarratorConfig> {
    let mut config = NarratorConfig::load_from(args.config.as_deref())?;
    if let Some(source) = &args.source {
        config.source.url = source.clone();
    }
    if let Some(detector) = &args.detector {
        config.detector.backend = detector.clone();
    }
    if let Some(model) = &args.model {
        config.detector.model_path = Some(model.clone());
    }
    if let Some(skip) = args.frame_skip {
        config.frame_skip = skip;
    }
    if let Some(confidence) = args.confidence {
        config.detector.confidence_threshold = confidence;
    }
    if let Some(secs) = args.interval {
        config.speech.min_interval = interval_from_secs(secs, "--interval")?;
    }
    if args.mute {
        config.speech.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "render-image")]
fn build_renderer(config: &NarratorConfig) -> Box<dyn Renderer> {
    match &config.render.snapshot_path {
        Some(path) => {
            log::info!("writing annotated snapshots to {}", path.display());
            Box::new(scene_narrator::render::SnapshotRenderer::new(
                path,
                config.render.caption_width,
            ))
        }
        None => Box::new(LogRenderer::new(config.render.caption_width)),
    }
}

#[cfg(not(feature = "render-image"))]
fn build_renderer(config: &NarratorConfig) -> Box<dyn Renderer> {
    if let Some(path) = &config.render.snapshot_path {
        log::warn!(
            "snapshot path {} ignored: built without render-image",
            path.display()
        );
    }
    Box::new(LogRenderer::new(config.render.caption_width))
}

/// Cancel when a line reading "q" arrives on stdin.
fn spawn_quit_watcher(cancel: CancelToken) {
    let spawned = std::thread::Builder::new()
        .name("stdin-quit".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if line.trim().eq_ignore_ascii_case("q") {
                    log::info!("quit requested");
                    cancel.cancel();
                    break;
                }
            }
        });
    if let Err(err) = spawned {
        log::warn!("stdin watcher not started: {}", err);
    }
}
