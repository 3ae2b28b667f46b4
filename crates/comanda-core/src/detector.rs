//! UltraFace face detector via ONNX Runtime.
//!
//! Runs the version-RFB-320 UltraFace model: one forward pass emits per-anchor
//! confidences and normalized corner boxes, which are confidence-filtered and
//! de-duplicated with greedy NMS.

use crate::types::BoundingBox;
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const ULTRAFACE_INPUT_WIDTH: usize = 320;
const ULTRAFACE_INPUT_HEIGHT: usize = 240;
const ULTRAFACE_MEAN: f32 = 127.0;
const ULTRAFACE_STD: f32 = 128.0;
const ULTRAFACE_CONFIDENCE_THRESHOLD: f32 = 0.7;
const ULTRAFACE_NMS_THRESHOLD: f32 = 0.3;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — download version-RFB-320.onnx and place it in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// UltraFace-based face detector.
pub struct FaceDetector {
    session: Session,
    /// Output tensor indices for (scores, boxes). Discovered by name at load
    /// time; falls back to positional ordering for generically-named exports.
    score_output: usize,
    box_output: usize,
}

impl FaceDetector {
    /// Load the UltraFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "UltraFace model requires score and box outputs, got {}",
                output_names.len()
            )));
        }

        let score_output = output_names.iter().position(|n| n == "scores").unwrap_or(0);
        let box_output = output_names.iter().position(|n| n == "boxes").unwrap_or(1);

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded UltraFace model"
        );

        Ok(Self {
            session,
            score_output,
            box_output,
        })
    }

    /// Detect faces in an RGB image.
    ///
    /// Returns boxes in source-image pixel coordinates, ordered by descending
    /// confidence. That ordering is the only prominence signal callers get —
    /// it approximates "most prominent face first" but does not guarantee it.
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let (img_w, img_h) = (image.width() as f32, image.height() as f32);
        let input = Self::preprocess(image);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[self.score_output]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[self.box_output]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        // Scores are (background, face) pairs per anchor; boxes are
        // normalized [x1, y1, x2, y2] per anchor.
        let anchors = scores.len() / 2;
        if boxes.len() != anchors * 4 {
            return Err(DetectorError::InferenceFailed(format!(
                "anchor mismatch: {} score values vs {} box values",
                scores.len(),
                boxes.len()
            )));
        }

        let mut candidates = Vec::new();
        for i in 0..anchors {
            let confidence = scores[i * 2 + 1];
            if confidence < ULTRAFACE_CONFIDENCE_THRESHOLD {
                continue;
            }
            candidates.push(BoundingBox {
                x1: boxes[i * 4] * img_w,
                y1: boxes[i * 4 + 1] * img_h,
                x2: boxes[i * 4 + 2] * img_w,
                y2: boxes[i * 4 + 3] * img_h,
                confidence,
            });
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Ok(non_max_suppression(candidates, ULTRAFACE_NMS_THRESHOLD))
    }

    /// Resize to 320×240 and normalize into an NCHW float tensor.
    fn preprocess(image: &RgbImage) -> Array4<f32> {
        let resized = image::imageops::resize(
            image,
            ULTRAFACE_INPUT_WIDTH as u32,
            ULTRAFACE_INPUT_HEIGHT as u32,
            FilterType::Triangle,
        );

        let mut tensor =
            Array4::<f32>::zeros((1, 3, ULTRAFACE_INPUT_HEIGHT, ULTRAFACE_INPUT_WIDTH));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - ULTRAFACE_MEAN) / ULTRAFACE_STD;
            }
        }
        tensor
    }
}

/// Greedy NMS over confidence-sorted candidates: keep a box only when it does
/// not overlap an already-kept box past the IoU threshold.
fn non_max_suppression(candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    let mut kept: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if kept.iter().all(|k| k.iou(&candidate) < iou_threshold) {
            kept.push(candidate);
        }
    }
    kept
}
