//! Frame sources.
//!
//! This module provides the sources the narration loop acquires frames from:
//! - Synthetic source (`stub://...`) for tests and demos
//! - USB/V4L2 cameras (feature: ingest-v4l2)
//!
//! Every source hands out RGB24 `Frame`s. A source that cannot connect is a
//! startup failure; a source that fails mid-run ends the run.

#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use anyhow::{anyhow, Result};

use crate::config::SourceSettings;
use crate::frame::Frame;

pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// Something that produces camera frames.
pub trait FrameSource {
    /// Open the underlying device. Called once before the loop.
    fn connect(&mut self) -> Result<()>;

    /// Capture the next frame.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the underlying device. Safe to call more than once.
    fn close(&mut self) {}

    /// Check if the source is healthy.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Get frame statistics.
    fn stats(&self) -> SourceStats;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn next_frame(&mut self) -> Result<Frame> {
        (**self).next_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_healthy(&self) -> bool {
        (**self).is_healthy()
    }

    fn stats(&self) -> SourceStats {
        (**self).stats()
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub url: String,
}

/// Open the source named by `settings.url`.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn FrameSource>> {
    if settings.url.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(settings.clone())));
    }
    if is_device_path(&settings.url) {
        #[cfg(feature = "ingest-v4l2")]
        {
            return Ok(Box::new(V4l2Source::new(settings.clone())));
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            return Err(anyhow!(
                "camera {} requires the ingest-v4l2 feature",
                settings.url
            ));
        }
    }
    Err(anyhow!("unsupported frame source url: {}", settings.url))
}

fn is_device_path(url: &str) -> bool {
    url.starts_with("/dev/") || url.starts_with("v4l2://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> SourceSettings {
        SourceSettings {
            url: url.to_string(),
            ..SourceSettings::default()
        }
    }

    #[test]
    fn stub_urls_open_synthetic_source() -> Result<()> {
        let mut source = open_source(&settings("stub://test"))?;
        source.connect()?;
        assert_eq!(source.stats().url, "stub://test");
        Ok(())
    }

    #[test]
    fn network_urls_are_rejected() {
        assert!(open_source(&settings("rtsp://camera/stream")).is_err());
        assert!(open_source(&settings("")).is_err());
    }
}
