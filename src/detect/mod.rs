mod backend;
mod backends;
mod labels;
mod registry;
mod result;
pub mod yolo;

use anyhow::Result;

use crate::config::DetectorSettings;

pub use backend::DetectorBackend;
pub use backends::{ScriptedBackend, ScriptedFrame};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::{label_for, COCO_LABELS};
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection};

/// Build the configured detector backend.
///
/// `stub` is always available; `tract` needs the `backend-tract` feature and
/// a model path. Any failure here is a startup failure.
pub fn build_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let mut registry = BackendRegistry::new();
    registry.register(ScriptedBackend::demo());

    #[cfg(feature = "backend-tract")]
    if let Some(path) = &settings.model_path {
        let params = yolo::YoloParams {
            input_width: settings.input_size,
            input_height: settings.input_size,
            iou_threshold: settings.iou_threshold,
            ..yolo::YoloParams::default()
        };
        registry.register(TractBackend::new(path, params)?);
    }

    registry.set_default(&settings.backend)?;
    registry.take_default()
}
