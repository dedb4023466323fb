//! Captured frames.
//!
//! - `Frame`: one RGB24 image from a frame source, with its sequence number.
//! - `AnnotatedFrame`: a frame after the renderer drew overlays onto it.

use anyhow::{anyhow, Result};
use std::time::Instant;

// ----------------------------------------------------------------------------
// Frame: one acquired image
// ----------------------------------------------------------------------------

/// One RGB24 frame handed out by a frame source.
///
/// Frames are owned by a single loop iteration. The pixel buffer is private so
/// the only way to build a frame is through `Frame::new`, which checks the
/// buffer length against the dimensions.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Source-side sequence number, starting at 1.
    pub sequence: u64,
    captured_at: Instant,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// Read-only RGB24 pixels, row major.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Milliseconds since capture, for latency logging.
    pub fn age_ms(&self) -> u128 {
        self.captured_at.elapsed().as_millis()
    }

    pub(crate) fn into_pixels(self) -> Vec<u8> {
        self.data
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// AnnotatedFrame: renderer output
// ----------------------------------------------------------------------------

/// A frame with overlays burned in, plus the overlay text the renderer drew.
#[derive(Clone, Debug)]
pub struct AnnotatedFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u64,
    /// Overlay label texts, in draw order.
    pub labels: Vec<String>,
}

impl AnnotatedFrame {
    /// Wrap a frame without any overlays.
    pub fn plain(frame: Frame) -> Self {
        let width = frame.width;
        let height = frame.height;
        let sequence = frame.sequence;
        Self {
            pixels: frame.into_pixels(),
            width,
            height,
            sequence,
            labels: Vec::new(),
        }
    }
}
