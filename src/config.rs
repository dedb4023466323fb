use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_SOURCE_URL: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_DETECTOR: &str = "stub";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_FRAME_SKIP: u64 = 3;
const DEFAULT_MAX_OBJECTS: usize = 3;
const DEFAULT_HORIZONTAL_SPLIT: f64 = 1.0 / 3.0;
const DEFAULT_NEAR_RATIO: f64 = 0.15;
const DEFAULT_FAR_RATIO: f64 = 0.05;
const DEFAULT_SPEECH_INTERVAL_SECS: f64 = 5.0;
const DEFAULT_SPEECH_COMMAND: &str = "espeak";
const DEFAULT_SPEECH_RATE_WPM: u32 = 150;
const DEFAULT_SPEECH_QUEUE_DEPTH: usize = 2;
const DEFAULT_GREETING: &str = "Camera is ready.";
const DEFAULT_CAPTION_WIDTH: usize = 80;

#[derive(Debug, Deserialize, Default)]
struct NarratorConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    scheduler: Option<SchedulerConfigFile>,
    caption: Option<CaptionConfigFile>,
    spatial: Option<SpatialConfigFile>,
    speech: Option<SpeechConfigFile>,
    render: Option<RenderConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    url: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct SchedulerConfigFile {
    frame_skip: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CaptionConfigFile {
    max_objects: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SpatialConfigFile {
    horizontal_split: Option<f64>,
    near_ratio: Option<f64>,
    far_ratio: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct SpeechConfigFile {
    enabled: Option<bool>,
    min_interval_secs: Option<f64>,
    command: Option<String>,
    args: Option<Vec<String>>,
    rate_wpm: Option<u32>,
    queue_depth: Option<usize>,
    greeting: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    snapshot_path: Option<PathBuf>,
    caption_width: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct NarratorConfig {
    pub source: SourceSettings,
    pub detector: DetectorSettings,
    /// Analyze one frame out of every `frame_skip`.
    pub frame_skip: u64,
    /// Upper bound on objects mentioned in one caption.
    pub max_objects: usize,
    pub spatial: SpatialSettings,
    pub speech: SpeechSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// `stub://name` for the synthetic source, `/dev/videoN` for a camera.
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// Frame pacing; 0 disables pacing on the synthetic source.
    pub target_fps: u32,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOURCE_URL.to_string(),
            width: DEFAULT_SOURCE_WIDTH,
            height: DEFAULT_SOURCE_HEIGHT,
            target_fps: DEFAULT_SOURCE_FPS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    /// Detections must score strictly above this to be narrated.
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    /// Square model input size in pixels.
    pub input_size: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DEFAULT_DETECTOR.to_string(),
            model_path: None,
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
            input_size: DEFAULT_INPUT_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpatialSettings {
    pub horizontal_split: f64,
    pub near_ratio: f64,
    pub far_ratio: f64,
}

impl Default for SpatialSettings {
    fn default() -> Self {
        Self {
            horizontal_split: DEFAULT_HORIZONTAL_SPLIT,
            near_ratio: DEFAULT_NEAR_RATIO,
            far_ratio: DEFAULT_FAR_RATIO,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechSettings {
    pub enabled: bool,
    pub min_interval: Duration,
    /// Synthesizer program, invoked as `command [args..] -s <rate> <text>`.
    pub command: String,
    pub args: Vec<String>,
    pub rate_wpm: u32,
    pub queue_depth: usize,
    /// Spoken once when the camera is ready; empty disables it.
    pub greeting: String,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval: Duration::from_secs_f64(DEFAULT_SPEECH_INTERVAL_SECS),
            command: DEFAULT_SPEECH_COMMAND.to_string(),
            args: Vec::new(),
            rate_wpm: DEFAULT_SPEECH_RATE_WPM,
            queue_depth: DEFAULT_SPEECH_QUEUE_DEPTH,
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    /// Where the annotated frame is written when `render-image` is enabled.
    pub snapshot_path: Option<PathBuf>,
    /// Displayed caption is cut to this many characters.
    pub caption_width: usize,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            caption_width: DEFAULT_CAPTION_WIDTH,
        }
    }
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            source: SourceSettings::default(),
            detector: DetectorSettings::default(),
            frame_skip: DEFAULT_FRAME_SKIP,
            max_objects: DEFAULT_MAX_OBJECTS,
            spatial: SpatialSettings::default(),
            speech: SpeechSettings::default(),
            render: RenderSettings::default(),
        }
    }
}

impl NarratorConfig {
    /// Load from `$NARRATOR_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NARRATOR_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (or defaults), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: NarratorConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let source = file.source.unwrap_or_default();
        let source = SourceSettings {
            url: source.url.unwrap_or(defaults.source.url),
            width: source.width.unwrap_or(defaults.source.width),
            height: source.height.unwrap_or(defaults.source.height),
            target_fps: source.target_fps.unwrap_or(defaults.source.target_fps),
        };

        let detector = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector.backend.unwrap_or(defaults.detector.backend),
            model_path: detector.model_path,
            confidence_threshold: detector
                .confidence_threshold
                .unwrap_or(defaults.detector.confidence_threshold),
            iou_threshold: detector
                .iou_threshold
                .unwrap_or(defaults.detector.iou_threshold),
            input_size: detector.input_size.unwrap_or(defaults.detector.input_size),
        };

        let spatial = file.spatial.unwrap_or_default();
        let spatial = SpatialSettings {
            horizontal_split: spatial
                .horizontal_split
                .unwrap_or(defaults.spatial.horizontal_split),
            near_ratio: spatial.near_ratio.unwrap_or(defaults.spatial.near_ratio),
            far_ratio: spatial.far_ratio.unwrap_or(defaults.spatial.far_ratio),
        };

        let speech = file.speech.unwrap_or_default();
        let speech = SpeechSettings {
            enabled: speech.enabled.unwrap_or(defaults.speech.enabled),
            min_interval: match speech.min_interval_secs {
                Some(secs) => interval_from_secs(secs, "speech.min_interval_secs")?,
                None => defaults.speech.min_interval,
            },
            command: speech.command.unwrap_or(defaults.speech.command),
            args: speech.args.unwrap_or(defaults.speech.args),
            rate_wpm: speech.rate_wpm.unwrap_or(defaults.speech.rate_wpm),
            queue_depth: speech.queue_depth.unwrap_or(defaults.speech.queue_depth),
            greeting: speech.greeting.unwrap_or(defaults.speech.greeting),
        };

        let render = file.render.unwrap_or_default();
        let render = RenderSettings {
            snapshot_path: render.snapshot_path,
            caption_width: render
                .caption_width
                .unwrap_or(defaults.render.caption_width),
        };

        Ok(Self {
            source,
            detector,
            frame_skip: file
                .scheduler
                .and_then(|s| s.frame_skip)
                .unwrap_or(defaults.frame_skip),
            max_objects: file
                .caption
                .and_then(|c| c.max_objects)
                .unwrap_or(defaults.max_objects),
            spatial,
            speech,
            render,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(url) = non_empty_env("NARRATOR_SOURCE_URL") {
            self.source.url = url;
        }
        if let Some(backend) = non_empty_env("NARRATOR_DETECTOR") {
            self.detector.backend = backend;
        }
        if let Some(path) = non_empty_env("NARRATOR_MODEL_PATH") {
            self.detector.model_path = Some(PathBuf::from(path));
        }
        if let Some(conf) = non_empty_env("NARRATOR_CONFIDENCE") {
            self.detector.confidence_threshold = conf
                .parse()
                .map_err(|_| anyhow!("NARRATOR_CONFIDENCE must be a number in [0, 1]"))?;
        }
        if let Some(skip) = non_empty_env("NARRATOR_FRAME_SKIP") {
            self.frame_skip = skip
                .parse()
                .map_err(|_| anyhow!("NARRATOR_FRAME_SKIP must be a positive integer"))?;
        }
        if let Some(secs) = non_empty_env("NARRATOR_SPEECH_INTERVAL_SECS") {
            let secs: f64 = secs
                .parse()
                .map_err(|_| anyhow!("NARRATOR_SPEECH_INTERVAL_SECS must be a number of seconds"))?;
            self.speech.min_interval = interval_from_secs(secs, "NARRATOR_SPEECH_INTERVAL_SECS")?;
        }
        if let Some(command) = non_empty_env("NARRATOR_SPEECH_COMMAND") {
            self.speech.command = command;
        }
        if let Some(mute) = non_empty_env("NARRATOR_MUTE") {
            self.speech.enabled = !parse_bool(&mute)
                .ok_or_else(|| anyhow!("NARRATOR_MUTE must be true or false"))?;
        }
        Ok(())
    }

    /// Check option ranges. Called by the loaders; call again after applying
    /// command-line overrides.
    pub fn validate(&self) -> Result<()> {
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        let frame_len = (self.source.width as usize)
            .checked_mul(self.source.height as usize)
            .and_then(|v| v.checked_mul(3));
        if frame_len.is_none() {
            return Err(anyhow!(
                "source frame {}x{} is too large",
                self.source.width,
                self.source.height
            ));
        }
        let conf = self.detector.confidence_threshold;
        if !(0.0..=1.0).contains(&conf) {
            return Err(anyhow!("confidence threshold must be in [0, 1], got {}", conf));
        }
        if self.frame_skip == 0 {
            return Err(anyhow!("frame_skip must be at least 1"));
        }
        if self.max_objects == 0 {
            return Err(anyhow!("max_objects must be at least 1"));
        }
        let split = self.spatial.horizontal_split;
        if !(split > 0.0 && split <= 0.5) {
            return Err(anyhow!("horizontal_split must be in (0, 0.5], got {}", split));
        }
        let near = self.spatial.near_ratio;
        let far = self.spatial.far_ratio;
        if !(0.0 <= far && far < near && near <= 1.0) {
            return Err(anyhow!(
                "depth ratios must satisfy 0 <= far ({}) < near ({}) <= 1",
                far,
                near
            ));
        }
        if self.speech.enabled && self.speech.command.trim().is_empty() {
            return Err(anyhow!("speech command must not be empty"));
        }
        if self.speech.queue_depth == 0 {
            return Err(anyhow!("speech queue_depth must be at least 1"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<NarratorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Seconds from a file, env var or flag; negative, NaN and huge values are errors.
pub fn interval_from_secs(secs: f64, what: &str) -> Result<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(anyhow!("{} must be a non-negative number of seconds, got {}", what, secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| anyhow!("{} is out of range: {}", what, secs))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
