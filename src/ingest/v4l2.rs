//! V4L2 camera source.
//!
//! `V4l2Source` captures from a local device node (e.g. /dev/video0) through
//! an mmap stream. It asks the driver for RGB3 and falls back to YUYV, which
//! nearly every USB webcam supports; both are normalized to RGB24.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::time::{Duration, Instant};

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{FrameSource, SourceStats};
use crate::config::SourceSettings;
use crate::frame::Frame;

pub struct V4l2Source {
    config: SourceSettings,
    state: Option<DeviceV4l2State>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    last_error: Option<String>,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
}

#[self_referencing]
struct DeviceV4l2State {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    pub fn new(config: SourceSettings) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            config,
            state: None,
            frame_count: 0,
            last_frame_at: None,
            last_error: None,
            active_format: PixelFormat::Rgb24,
        }
    }

    fn device_path(&self) -> &str {
        self.config
            .url
            .strip_prefix("v4l2://")
            .unwrap_or(&self.config.url)
    }

    fn health_grace(&self) -> Duration {
        let base_ms = if self.config.target_fps == 0 {
            2_000
        } else {
            (1000 / self.config.target_fps).saturating_mul(6)
        };
        Duration::from_millis(base_ms.max(2_000) as u64)
    }
}

impl FrameSource for V4l2Source {
    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let path = self.device_path().to_string();
        let mut device =
            v4l::Device::with_path(&path).with_context(|| format!("open v4l2 device {}", path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = self.config.width;
        format.height = self.config.height;

        let mut negotiated = None;
        for fourcc in [b"RGB3", b"YUYV"] {
            format.fourcc = v4l::FourCC::new(fourcc);
            match device.set_format(&format) {
                Ok(actual) if actual.fourcc == format.fourcc => {
                    negotiated = Some(actual);
                    break;
                }
                Ok(actual) => log::debug!(
                    "V4l2Source: {} answered {} for {}",
                    path,
                    actual.fourcc,
                    format.fourcc
                ),
                Err(err) => log::warn!(
                    "V4l2Source: failed to set {} on {}: {}",
                    format.fourcc,
                    path,
                    err
                ),
            }
        }
        let format = negotiated
            .ok_or_else(|| anyhow!("{} supports neither RGB3 nor YUYV capture", path))?;
        self.active_format = PixelFormat::from_fourcc(&format.fourcc.repr)
            .ok_or_else(|| anyhow!("unexpected fourcc {} on {}", format.fourcc, path))?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!("V4l2Source: failed to set fps on {}: {}", path, err);
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.last_error = None;

        let state = DeviceV4l2StateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()
        .map_err(|err| {
            self.last_error = Some(err.to_string());
            err
        })?;
        self.state = Some(state);

        log::info!(
            "V4l2Source: connected to {} ({}x{} {:?})",
            path,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| {
                self.last_error = Some(err.to_string());
                anyhow::Error::new(err).context("capture v4l2 frame")
            })?;
        let rgb = normalize_to_rgb(
            buf,
            self.active_width,
            self.active_height,
            self.active_format,
        )?;

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());

        Frame::new(rgb, self.active_width, self.active_height, self.frame_count)
    }

    fn close(&mut self) {
        if self.state.take().is_some() {
            log::info!("V4l2Source: released {}", self.device_path());
        }
    }

    fn is_healthy(&self) -> bool {
        if self.last_error.is_some() {
            return false;
        }
        let Some(last_frame_at) = self.last_frame_at else {
            return true;
        };
        last_frame_at.elapsed() <= self.health_grace()
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}
