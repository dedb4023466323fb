use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};

/// One scripted answer of a [`ScriptedBackend`].
#[derive(Clone, Debug)]
pub enum ScriptedFrame {
    Objects(Vec<Detection>),
    Failure(String),
}

/// Deterministic backend for tests and `stub://` runs.
///
/// Replays a fixed script of answers, one per `detect` call, wrapping around
/// at the end. An empty script always answers with no detections.
pub struct ScriptedBackend {
    script: Vec<ScriptedFrame>,
    cursor: usize,
    calls: u64,
    /// Script boxes are fractions of the frame, scaled on every call.
    relative: bool,
}

impl ScriptedBackend {
    pub fn new(script: Vec<ScriptedFrame>) -> Self {
        Self {
            script,
            cursor: 0,
            calls: 0,
            relative: false,
        }
    }

    /// Backend that reports the same detections on every call.
    pub fn constant(detections: Vec<Detection>) -> Self {
        Self::new(vec![ScriptedFrame::Objects(detections)])
    }

    /// A short living-room scene that fits whatever frame size it is given.
    pub fn demo() -> Self {
        let scaled = BoundingBox::new;
        let mut backend = Self::new(vec![
            ScriptedFrame::Objects(vec![
                Detection::new("person", 0.91, scaled(0.05, 0.10, 0.30, 0.95)),
                Detection::new("cup", 0.74, scaled(0.45, 0.55, 0.55, 0.70)),
            ]),
            ScriptedFrame::Objects(vec![
                Detection::new("chair", 0.66, scaled(0.70, 0.40, 0.95, 0.95)),
                Detection::new("tv", 0.42, scaled(0.40, 0.05, 0.60, 0.25)),
            ]),
            ScriptedFrame::Objects(Vec::new()),
            ScriptedFrame::Objects(vec![
                Detection::new("dog", 0.88, scaled(0.35, 0.30, 0.75, 0.90)),
                Detection::new("remote", 0.57, scaled(0.80, 0.80, 0.84, 0.83)),
                Detection::new("book", 0.61, scaled(0.02, 0.70, 0.12, 0.80)),
                Detection::new("bottle", 0.70, scaled(0.58, 0.50, 0.62, 0.62)),
            ]),
        ]);
        backend.relative = true;
        backend
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        self.calls += 1;
        if self.script.is_empty() {
            return Ok(Vec::new());
        }
        let frame = &self.script[self.cursor];
        self.cursor = (self.cursor + 1) % self.script.len();
        match frame {
            ScriptedFrame::Objects(detections) if self.relative => {
                let (w, h) = (width as f32, height as f32);
                Ok(detections
                    .iter()
                    .map(|d| {
                        let b = d.bbox;
                        let bbox = BoundingBox::new(b.x1 * w, b.y1 * h, b.x2 * w, b.y2 * h);
                        Detection::new(d.label.clone(), d.confidence, bbox)
                    })
                    .collect())
            }
            ScriptedFrame::Objects(detections) => Ok(detections.clone()),
            ScriptedFrame::Failure(msg) => Err(anyhow!("scripted detector failure: {}", msg)),
        }
    }
}
