//! Plate detection
//!
//! Runs a YOLO-style single-class detector and post-processes its raw
//! `[1, C, N]` output: decode candidates, filter by confidence, deduplicate
//! via NMS, and pick the best surviving box. The selected box is returned in
//! display-space coordinates.

use anyhow::Result;
use parking_lot::Mutex;
use std::path::Path;
use tracing::debug;

use crate::capture::VideoFrame;
use crate::config::DetectionSettings;
use crate::vision::geometry::{nms, BBox, Detection};
use crate::vision::models::{ModelError, OnnxSession};
use crate::vision::preprocess::{frame_to_tensor, scale_factors};

/// Locates at most one license plate in a frame. Injected into the pipeline
/// so tests can substitute a fake.
pub trait PlateDetector: Send + Sync {
    /// Returns the best plate box in display-space coordinates, or `None`
    /// when nothing clears the confidence threshold.
    fn detect(&self, frame: &VideoFrame) -> Result<Option<Detection>>;
}

/// Decode a channel-major `[C, N]` output block into candidate detections.
///
/// Channels 0-3 are center-x, center-y, width, height in model-input pixels;
/// channel 4 is the combined objectness/class confidence. Candidates at or
/// below `conf_threshold` are dropped here, before NMS.
pub fn decode_candidates(
    data: &[f32],
    anchors: usize,
    conf_threshold: f32,
) -> Vec<Detection> {
    let mut candidates = Vec::new();

    for i in 0..anchors {
        let confidence = data[4 * anchors + i];
        if confidence <= conf_threshold {
            continue;
        }

        let cx = data[i];
        let cy = data[anchors + i];
        let w = data[2 * anchors + i];
        let h = data[3 * anchors + i];

        let raw = BBox::from_center(cx, cy, w, h);
        let bbox = BBox::new(raw.x.max(0.0), raw.y.max(0.0), raw.w, raw.h);
        if !bbox.is_valid() {
            continue;
        }

        candidates.push(Detection { bbox, confidence });
    }

    candidates
}

/// Deduplicate via NMS and pick the highest-confidence survivor. The box is
/// always an NMS survivor; suppressed candidates are never selected.
pub fn select_best(candidates: Vec<Detection>, iou_threshold: f32) -> Option<Detection> {
    nms(candidates, iou_threshold)
        .into_iter()
        .max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
}

/// ONNX-backed plate detector
pub struct OnnxPlateDetector {
    session: Mutex<OnnxSession>,
    settings: DetectionSettings,
}

impl OnnxPlateDetector {
    pub fn load(model_path: &Path, settings: DetectionSettings) -> Result<Self> {
        Ok(Self {
            session: Mutex::new(OnnxSession::load(model_path)?),
            settings,
        })
    }
}

impl PlateDetector for OnnxPlateDetector {
    fn detect(&self, frame: &VideoFrame) -> Result<Option<Detection>> {
        if !frame.is_ready() {
            return Ok(None);
        }

        let tensor = frame_to_tensor(frame, self.settings.input_size)?;
        let (shape, data) = self.session.lock().run_f32(&tensor)?;

        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(ModelError::UnexpectedShape {
                expected: "[1, C>=5, N]",
                actual: shape,
            }
            .into());
        }
        let anchors = shape[2] as usize;

        let candidates =
            decode_candidates(&data, anchors, self.settings.confidence_threshold);
        debug!("{} candidates above threshold", candidates.len());

        let best = select_best(candidates, self.settings.iou_threshold);
        let (scale_x, scale_y) = scale_factors(frame.width, frame.height, self.settings.input_size);

        Ok(best.map(|d| Detection {
            bbox: d.bbox.scaled(scale_x, scale_y),
            confidence: d.confidence,
        }))
    }
}
