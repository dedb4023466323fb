//! JPEG snapshot renderer (feature: render-image).
//!
//! Draws box outlines into the frame and writes the latest annotated frame to
//! a fixed path, replacing it atomically so viewers never read half a file.

use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;

use super::{annotate, truncate_caption, Overlay, Renderer};
use crate::detect::BoundingBox;
use crate::frame::{AnnotatedFrame, Frame};

const BOX_COLOR: [u8; 3] = [0, 255, 0];
const BOX_THICKNESS: u32 = 2;

pub struct SnapshotRenderer {
    path: PathBuf,
    caption_width: usize,
    last_written: Option<u64>,
}

impl SnapshotRenderer {
    pub fn new(path: impl Into<PathBuf>, caption_width: usize) -> Self {
        Self {
            path: path.into(),
            caption_width,
            last_written: None,
        }
    }
}

impl Renderer for SnapshotRenderer {
    fn draw(&mut self, frame: Frame, overlays: &[Overlay]) -> Result<AnnotatedFrame> {
        let mut annotated = annotate(frame, overlays);
        for overlay in overlays {
            draw_box(
                &mut annotated.pixels,
                annotated.width,
                annotated.height,
                &overlay.bbox,
            );
        }
        Ok(annotated)
    }

    fn display(&mut self, frame: &AnnotatedFrame, caption: &str) -> Result<()> {
        if self.last_written == Some(frame.sequence) {
            return Ok(());
        }
        let img = image::RgbImage::from_raw(frame.width, frame.height, frame.pixels.clone())
            .ok_or_else(|| anyhow!("annotated frame buffer does not match its size"))?;
        let tmp = self.path.with_extension("tmp.jpg");
        img.save_with_format(&tmp, image::ImageFormat::Jpeg)
            .with_context(|| format!("writing snapshot {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing snapshot {}", self.path.display()))?;
        self.last_written = Some(frame.sequence);
        log::debug!(
            "snapshot #{} -> {}: {}",
            frame.sequence,
            self.path.display(),
            truncate_caption(caption, self.caption_width)
        );
        Ok(())
    }
}

/// Outline `bbox` in an RGB24 buffer.
fn draw_box(pixels: &mut [u8], width: u32, height: u32, bbox: &BoundingBox) {
    if width == 0 || height == 0 {
        return;
    }
    let b = bbox.clamp_to(width - 1, height - 1);
    let (x1, y1, x2, y2) = (b.x1 as u32, b.y1 as u32, b.x2 as u32, b.y2 as u32);
    let mut put = |x: u32, y: u32| {
        let idx = ((y * width + x) * 3) as usize;
        pixels[idx..idx + 3].copy_from_slice(&BOX_COLOR);
    };
    for t in 0..BOX_THICKNESS {
        for x in x1..=x2 {
            put(x, (y1 + t).min(y2));
            put(x, y2.saturating_sub(t).max(y1));
        }
        for y in y1..=y2 {
            put((x1 + t).min(x2), y);
            put(x2.saturating_sub(t).max(x1), y);
        }
    }
}
