//! Output sinks for annotated frames and captions.
//!
//! Renderers never feed anything back into the narration loop. A renderer
//! error means the display surface is gone and ends the run.

#[cfg(feature = "render-image")]
mod snapshot;

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use crate::detect::{BoundingBox, Detection};
use crate::frame::{AnnotatedFrame, Frame};

#[cfg(feature = "render-image")]
pub use snapshot::SnapshotRenderer;

/// A box plus the text drawn next to it.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub bbox: BoundingBox,
    pub text: String,
}

impl Overlay {
    /// `"<label> <confidence>"` with two decimals.
    pub fn for_detection(detection: &Detection) -> Self {
        Self {
            bbox: detection.bbox,
            text: format!("{} {:.2}", detection.label, detection.confidence),
        }
    }
}

pub trait Renderer {
    /// Burn `overlays` into `frame`.
    fn draw(&mut self, frame: Frame, overlays: &[Overlay]) -> Result<AnnotatedFrame>;

    /// Show an annotated frame with its caption line.
    fn display(&mut self, frame: &AnnotatedFrame, caption: &str) -> Result<()>;
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn draw(&mut self, frame: Frame, overlays: &[Overlay]) -> Result<AnnotatedFrame> {
        (**self).draw(frame, overlays)
    }

    fn display(&mut self, frame: &AnnotatedFrame, caption: &str) -> Result<()> {
        (**self).display(frame, caption)
    }
}

/// Cut `caption` to at most `width` characters.
pub fn truncate_caption(caption: &str, width: usize) -> &str {
    match caption.char_indices().nth(width) {
        Some((idx, _)) => &caption[..idx],
        None => caption,
    }
}

fn annotate(frame: Frame, overlays: &[Overlay]) -> AnnotatedFrame {
    let mut annotated = AnnotatedFrame::plain(frame);
    annotated.labels = overlays.iter().map(|o| o.text.clone()).collect();
    annotated
}

// ----------------------------------------------------------------------------
// LogRenderer: headless display
// ----------------------------------------------------------------------------

/// Headless renderer that writes the caption line to the log when it changes.
pub struct LogRenderer {
    caption_width: usize,
    last_line: Option<String>,
}

impl LogRenderer {
    pub fn new(caption_width: usize) -> Self {
        Self {
            caption_width,
            last_line: None,
        }
    }
}

impl Renderer for LogRenderer {
    fn draw(&mut self, frame: Frame, overlays: &[Overlay]) -> Result<AnnotatedFrame> {
        Ok(annotate(frame, overlays))
    }

    fn display(&mut self, frame: &AnnotatedFrame, caption: &str) -> Result<()> {
        let line = truncate_caption(caption, self.caption_width);
        if self.last_line.as_deref() != Some(line) {
            log::info!(
                "display frame #{} [{}]: {}",
                frame.sequence,
                frame.labels.join(", "),
                line
            );
            self.last_line = Some(line.to_string());
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// RecordingRenderer: test double
// ----------------------------------------------------------------------------

/// One `display` call seen by a [`RecordingRenderer`].
#[derive(Clone, Debug, PartialEq)]
pub struct DisplayRecord {
    pub sequence: u64,
    pub labels: Vec<String>,
    pub caption: String,
}

/// Renderer that records every display call. Clones share the record.
#[derive(Clone, Debug, Default)]
pub struct RecordingRenderer {
    displays: Arc<Mutex<Vec<DisplayRecord>>>,
    fail_after: Option<usize>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `count` display calls, then fail as if the window closed.
    pub fn failing_after(count: usize) -> Self {
        Self {
            displays: Arc::default(),
            fail_after: Some(count),
        }
    }

    pub fn displays(&self) -> Vec<DisplayRecord> {
        self.displays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl Renderer for RecordingRenderer {
    fn draw(&mut self, frame: Frame, overlays: &[Overlay]) -> Result<AnnotatedFrame> {
        Ok(annotate(frame, overlays))
    }

    fn display(&mut self, frame: &AnnotatedFrame, caption: &str) -> Result<()> {
        let mut displays = self
            .displays
            .lock()
            .map_err(|_| anyhow!("display record lock poisoned"))?;
        if self.fail_after.is_some_and(|limit| displays.len() >= limit) {
            return Err(anyhow!("display surface closed"));
        }
        displays.push(DisplayRecord {
            sequence: frame.sequence,
            labels: frame.labels.clone(),
            caption: caption.to_string(),
        });
        Ok(())
    }
}
