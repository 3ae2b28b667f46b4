//! MobileFaceNet face encoder via ONNX Runtime.
//!
//! Crops a detected face out of the source image, resizes it to 112×112 and
//! produces an L2-normalized 128-dimensional embedding, widened to f64 for
//! persistence.

use crate::types::{BoundingBox, Embedding, EMBEDDING_DIM};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

// --- Named constants (different normalization from UltraFace) ---
const ENCODER_INPUT_SIZE: usize = 112;
const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 128.0;
/// Margin added around the detector box before cropping; MobileFaceNet was
/// trained on slightly loose crops.
const CROP_MARGIN: f32 = 0.1;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0} — download mobilefacenet.onnx and place it in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// MobileFaceNet-based face encoder.
pub struct FaceEncoder {
    session: Session,
}

impl FaceEncoder {
    /// Load the MobileFaceNet ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EncoderError> {
        if !Path::new(model_path).exists() {
            return Err(EncoderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded MobileFaceNet model"
        );

        Ok(Self { session })
    }

    /// Encode one detected face into an embedding.
    pub fn encode(
        &mut self,
        image: &RgbImage,
        face: &BoundingBox,
    ) -> Result<Embedding, EncoderError> {
        let crop = crop_face(image, face);
        let input = Self::preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(EncoderError::InferenceFailed(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        // L2-normalize, then widen to f64 — the stored representation.
        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values: Vec<f64> = if norm > 0.0 {
            raw.iter().map(|x| (x / norm) as f64).collect()
        } else {
            raw.iter().map(|x| *x as f64).collect()
        };

        Ok(Embedding { values })
    }

    /// Normalize a 112×112 RGB crop into an NCHW float tensor.
    fn preprocess(crop: &RgbImage) -> Array4<f32> {
        let size = ENCODER_INPUT_SIZE;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in crop.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    (pixel[c] as f32 - ENCODER_MEAN) / ENCODER_STD;
            }
        }
        tensor
    }
}

/// Cut the face region out of the source image, expanded by [`CROP_MARGIN`]
/// and clamped to the image bounds, then resize to the encoder input size.
fn crop_face(image: &RgbImage, face: &BoundingBox) -> RgbImage {
    let margin_x = face.width() * CROP_MARGIN;
    let margin_y = face.height() * CROP_MARGIN;

    let x1 = (face.x1 - margin_x).max(0.0) as u32;
    let y1 = (face.y1 - margin_y).max(0.0) as u32;
    let x2 = ((face.x2 + margin_x).min(image.width() as f32)) as u32;
    let y2 = ((face.y2 + margin_y).min(image.height() as f32)) as u32;

    let width = x2.saturating_sub(x1).max(1);
    let height = y2.saturating_sub(y1).max(1);

    let cropped = image::imageops::crop_imm(image, x1, y1, width, height).to_image();
    image::imageops::resize(
        &cropped,
        ENCODER_INPUT_SIZE as u32,
        ENCODER_INPUT_SIZE as u32,
        FilterType::Triangle,
    )
}
