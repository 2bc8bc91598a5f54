//! Image encoding: rendered bitmap ⇄ `data:image/png;base64,…` reference.
//!
//! The data URL is what history persists (`qrDataUrl`) and what the PDF
//! exporter reads back, so an entry is self-contained: no side files.
//! PNG keeps module edges lossless.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Prefix of every image reference this crate produces.
pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode a rendered QR bitmap as a base64 PNG data URL.
pub fn encode_png_data_url(img: &RgbaImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img.clone()).write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded QR image → {} bytes base64", b64.len());

    Ok(format!("{PNG_DATA_URL_PREFIX}{b64}"))
}

/// Decode a data URL produced by [`encode_png_data_url`] back into an image.
pub fn decode_data_url(url: &str) -> Result<DynamicImage, String> {
    let (header, body) = url
        .split_once(',')
        .ok_or_else(|| "not a data URL".to_string())?;
    if !header.starts_with("data:image/") || !header.ends_with(";base64") {
        return Err(format!("unsupported data URL header '{header}'"));
    }
    let bytes = STANDARD
        .decode(body.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    image::load_from_memory(&bytes).map_err(|e| format!("invalid image: {e}"))
}
