use anyhow::Result;

use crate::detect::result::Detection;

/// Object detector backend.
///
/// The engine treats a backend as a synchronous black box: pixels go in,
/// labelled boxes in frame pixel coordinates come out. Backends are called
/// only on analyzed frames, so `detect` may be expensive.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on an RGB24 frame.
    ///
    /// An empty vector is a valid answer. Errors are isolated to the frame
    /// by the caller.
    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the loop starts.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: DetectorBackend + ?Sized> DetectorBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Vec<Detection>> {
        (**self).detect(pixels, width, height)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
