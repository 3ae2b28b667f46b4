//! Photo payload decoding.
//!
//! Clients submit photos as data-URI-style strings: a media-type prefix up to
//! the first comma, then base64-encoded image bytes.

use base64::Engine as _;
use image::RgbImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload has no media-type prefix separator")]
    MissingSeparator,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported or corrupt image bytes: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode a `"<prefix>,<base64>"` photo payload into 8-bit RGB pixels.
///
/// The prefix is everything up to the first comma and is not inspected; the
/// image format is sniffed from the decoded bytes instead. Alpha channels and
/// non-RGB color modes are normalized to RGB.
pub fn decode_image_payload(payload: &str) -> Result<RgbImage, DecodeError> {
    let (_, encoded) = payload
        .split_once(',')
        .ok_or(DecodeError::MissingSeparator)?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(encoded.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgb8())
}
