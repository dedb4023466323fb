//! YOLOv8-style output decoding.
//!
//! The model emits one `[1, 4 + C, A]` tensor: for each of `A` anchors the
//! rows hold `cx, cy, w, h` in model-input pixels followed by `C` class
//! scores. Decoding picks the best class per anchor, drops anchors below the
//! score floor, rescales to frame pixels and runs greedy per-class NMS.

use anyhow::{anyhow, Result};

use crate::detect::labels::label_for;
use crate::detect::result::{BoundingBox, Detection};

/// Decoding parameters.
#[derive(Clone, Copy, Debug)]
pub struct YoloParams {
    /// Model input width in pixels.
    pub input_width: u32,
    /// Model input height in pixels.
    pub input_height: u32,
    /// Anchors scoring at or below this are dropped before NMS.
    pub score_floor: f32,
    /// Overlap above which the weaker of two same-class boxes is suppressed.
    pub iou_threshold: f32,
    /// Upper bound on decoded detections.
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_width: 640,
            input_height: 640,
            score_floor: 0.25,
            iou_threshold: 0.45,
            max_detections: 100,
        }
    }
}

struct Candidate {
    class_id: usize,
    score: f32,
    bbox: BoundingBox,
}

/// Decode a channels-first YOLO output into detections in frame pixels.
pub fn decode(
    output: &[f32],
    num_classes: usize,
    params: &YoloParams,
    frame_width: u32,
    frame_height: u32,
) -> Result<Vec<Detection>> {
    let rows = 4 + num_classes;
    if output.is_empty() || output.len() % rows != 0 {
        return Err(anyhow!(
            "output length {} is not a multiple of {} rows",
            output.len(),
            rows
        ));
    }
    let anchors = output.len() / rows;
    let at = |row: usize, anchor: usize| output[row * anchors + anchor];

    let sx = frame_width as f32 / params.input_width as f32;
    let sy = frame_height as f32 / params.input_height as f32;

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (0..num_classes)
            .map(|c| (c, at(4 + c, anchor)))
            .fold((0, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if !score.is_finite() || score <= params.score_floor {
            continue;
        }
        let cx = at(0, anchor);
        let cy = at(1, anchor);
        let w = at(2, anchor);
        let h = at(3, anchor);
        let bbox = BoundingBox::new(
            (cx - w / 2.0) * sx,
            (cy - h / 2.0) * sy,
            (cx + w / 2.0) * sx,
            (cy + h / 2.0) * sy,
        )
        .clamp_to(frame_width, frame_height);
        candidates.push(Candidate {
            class_id,
            score,
            bbox,
        });
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut kept: Vec<Candidate> = Vec::new();
    for cand in candidates {
        if kept.len() >= params.max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == cand.class_id && k.bbox.iou(&cand.bbox) > params.iou_threshold
        });
        if !suppressed {
            kept.push(cand);
        }
    }

    Ok(kept
        .into_iter()
        .map(|c| Detection::new(label_for(c.class_id), c.score, c.bbox))
        .collect())
}
