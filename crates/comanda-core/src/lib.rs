//! comanda-core — Face identification engine for the comanda service.
//!
//! Decodes submitted photo payloads, detects faces with UltraFace and encodes
//! them into 128-dimensional embeddings with MobileFaceNet, both running via
//! ONNX Runtime for CPU inference, and matches probe embeddings against the
//! enrolled chef roster.

pub mod decoder;
pub mod detector;
pub mod encoder;
pub mod matcher;
pub mod pipeline;
pub mod types;

use std::path::PathBuf;

pub use decoder::{decode_image_payload, DecodeError};
pub use matcher::{ChefMatch, EnrolledChef, Matcher, NearestMatcher, MATCH_THRESHOLD};
pub use pipeline::{FacePipeline, PipelineError};
pub use types::{BoundingBox, Embedding, EMBEDDING_DIM};

/// Default location for the ONNX model files.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/comanda/models")
}
