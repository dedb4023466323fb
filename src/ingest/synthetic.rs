//! Synthetic frame source.
//!
//! `SyntheticSource` stands in for a camera on `stub://` urls. It produces
//! RGB24 gradient frames at the configured size and, when `target_fps` is set,
//! paces itself like a real device so the loop runs at camera speed.

use anyhow::{anyhow, Result};
use std::time::{Duration, Instant};

use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::Frame;

pub struct SyntheticSource {
    config: SourceSettings,
    frame_count: u64,
    /// Simulated scene state, shifted every 50 frames.
    scene_state: u8,
    connected: bool,
    /// Frames to produce before reporting end of stream.
    frame_limit: Option<u64>,
    next_due: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SourceSettings) -> Self {
        Self {
            config,
            frame_count: 0,
            scene_state: 0,
            connected: false,
            frame_limit: None,
            next_due: None,
        }
    }

    /// Report end of stream after `limit` frames.
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn pace(&mut self) {
        if self.config.target_fps == 0 {
            return;
        }
        let period = Duration::from_secs_f64(1.0 / self.config.target_fps as f64);
        let now = Instant::now();
        if let Some(due) = self.next_due {
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.next_due = Some(self.next_due.unwrap_or(now).max(now) + period);
    }

    fn generate_synthetic_pixels(&mut self) -> Result<Vec<u8>> {
        let pixel_count = (self.config.width as usize)
            .checked_mul(self.config.height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| {
                anyhow!(
                    "synthetic frame {}x{} is too large",
                    self.config.width,
                    self.config.height
                )
            })?;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        Ok(pixels)
    }
}

impl FrameSource for SyntheticSource {
    fn connect(&mut self) -> Result<()> {
        log::info!(
            "SyntheticSource: connected to {} ({}x{})",
            self.config.url,
            self.config.width,
            self.config.height
        );
        self.connected = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("synthetic source {} not connected", self.config.url));
        }
        if self.frame_limit.is_some_and(|limit| self.frame_count >= limit) {
            return Err(anyhow!("synthetic source {} ended", self.config.url));
        }
        self.pace();
        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels()?;
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }

    fn close(&mut self) {
        if self.connected {
            log::info!("SyntheticSource: released {}", self.config.url);
        }
        self.connected = false;
    }

    fn is_healthy(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_config() -> SourceSettings {
        SourceSettings {
            url: "stub://test".to_string(),
            width: 64,
            height: 48,
            target_fps: 0,
        }
    }

    #[test]
    fn synthetic_source_produces_frames() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        source.connect()?;

        let frame = source.next_frame()?;
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(frame.sequence, 1);
        assert_eq!(frame.pixels().len(), 64 * 48 * 3);
        assert_eq!(source.stats().frames_captured, 1);

        Ok(())
    }

    #[test]
    fn oversized_frames_error_instead_of_overflowing() -> Result<()> {
        let mut source = SyntheticSource::new(SourceSettings {
            width: u32::MAX,
            height: u32::MAX,
            ..stub_config()
        });
        source.connect()?;
        let err = source.next_frame().unwrap_err();
        assert!(err.to_string().contains("too large"));
        Ok(())
    }

    #[test]
    fn frames_require_connect() {
        let mut source = SyntheticSource::new(stub_config());
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn frame_limit_ends_stream() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config()).with_frame_limit(2);
        source.connect()?;
        source.next_frame()?;
        source.next_frame()?;
        assert!(source.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn close_releases_source() -> Result<()> {
        let mut source = SyntheticSource::new(stub_config());
        source.connect()?;
        source.close();
        assert!(!source.is_connected());
        assert!(!source.is_healthy());
        Ok(())
    }
}
