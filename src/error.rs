use thiserror::Error;

use crate::speech::SpeechError;

/// Failures the narration loop distinguishes.
///
/// Only `StartupFailure`, `SourceFailure` and `RenderFailure` end a run.
/// Detection and speech failures are absorbed at the iteration boundary and
/// surface only in logs and the run summary.
#[derive(Debug, Error)]
pub enum NarratorError {
    #[error("startup failure: {0:#}")]
    StartupFailure(anyhow::Error),

    #[error("detection failed on frame {frame}: {error:#}")]
    DetectionFailure { frame: u64, error: anyhow::Error },

    #[error("speech failure: {0}")]
    SpeechFailure(#[from] SpeechError),

    #[error("render failed on frame {frame}: {error:#}")]
    RenderFailure { frame: u64, error: anyhow::Error },

    #[error("frame source failed after {frames} frames: {error:#}")]
    SourceFailure { frames: u64, error: anyhow::Error },
}

impl NarratorError {
    /// Whether the loop keeps going after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            NarratorError::DetectionFailure { .. } | NarratorError::SpeechFailure(_)
        )
    }
}
