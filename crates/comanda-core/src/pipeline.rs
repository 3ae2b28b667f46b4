//! Detection + encoding pipeline: one RGB photo in, one embedding out.

use crate::detector::{DetectorError, FaceDetector};
use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::Embedding;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Zero faces in the photo. A common, recoverable input condition — the
    /// caller should ask the user to retake the picture.
    #[error("no face detected in the submitted photo")]
    NoFaceDetected,
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("encoder error: {0}")]
    Encoder(#[from] EncoderError),
}

/// Owns both ONNX sessions. Inference needs `&mut self`, so callers keep the
/// pipeline on a single thread (see the daemon's engine module).
pub struct FacePipeline {
    detector: FaceDetector,
    encoder: FaceEncoder,
}

impl FacePipeline {
    /// Load both models, failing fast when either file is missing.
    pub fn load(detector_path: &str, encoder_path: &str) -> Result<Self, PipelineError> {
        Ok(Self {
            detector: FaceDetector::load(detector_path)?,
            encoder: FaceEncoder::load(encoder_path)?,
        })
    }

    /// Extract the embedding of one face from a photo.
    ///
    /// When several faces are present, the detector's first (highest
    /// confidence) entry is used. Enrollment UX should instruct users to
    /// submit single-face photos rather than rely on that ordering.
    pub fn embed(&mut self, image: &RgbImage) -> Result<Embedding, PipelineError> {
        let faces = self.detector.detect(image)?;
        let face = faces.first().ok_or(PipelineError::NoFaceDetected)?;
        tracing::debug!(
            faces = faces.len(),
            confidence = face.confidence,
            "face selected for encoding"
        );
        Ok(self.encoder.encode(image, face)?)
    }
}
