/// Photo validation, bounded resize, and JPEG re-encoding
///
/// Every image entering the pipeline (file picker or camera frame) passes
/// through here exactly once. The output is always a lossy JPEG whose larger
/// dimension is capped by the call site's constraints, which bounds the
/// payload size for network transfer.

use base64::Engine;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, RgbImage};

use crate::error::CaptureError;

/// An encoded, lossy-compressed image plus its decoded pixel dimensions.
/// Immutable once produced; replaced wholesale when the user re-uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBuffer {
    /// Encoded bytes (always JPEG after normalization)
    pub bytes: Vec<u8>,
    /// Declared MIME type of the encoded bytes
    pub mime: String,
    /// Pixel width of the encoded image
    pub width: u32,
    /// Pixel height of the encoded image
    pub height: u32,
}

impl ImageBuffer {
    /// Base64 data URI form used for all network payloads
    pub fn to_data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&self.bytes);
        format!("data:{};base64,{}", self.mime, encoded)
    }

    /// Decode back to pixels (used by the pattern crop)
    pub fn decode(&self) -> Result<DynamicImage, CaptureError> {
        image::load_from_memory(&self.bytes).map_err(|e| CaptureError::Decode(e.to_string()))
    }
}

/// Per-call-site normalization limits
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeConstraints {
    /// Maximum accepted raw payload before decoding
    pub max_size_mb: f64,
    /// Upper bound on output width
    pub max_width: u32,
    /// Upper bound on output height
    pub max_height: u32,
    /// JPEG quality factor (1-100)
    pub quality: u8,
}

impl NormalizeConstraints {
    /// Side-view photos feed the weight estimator and can stay larger
    pub const fn side_photo() -> Self {
        Self {
            max_size_mb: 10.0,
            max_width: 1920,
            max_height: 1920,
            quality: 80,
        }
    }

    /// Muzzle photos only need enough detail for the pattern service
    pub const fn muzzle_photo() -> Self {
        Self {
            max_size_mb: 5.0,
            max_width: 1280,
            max_height: 1280,
            quality: 80,
        }
    }
}

/// Validate and normalize a user-supplied image file.
///
/// Rejects non-image declared types before any decode attempt and oversized
/// payloads before they cost CPU. Images already within bounds are re-encoded
/// but never upscaled.
pub fn normalize(
    declared_type: &str,
    raw: &[u8],
    constraints: &NormalizeConstraints,
) -> Result<ImageBuffer, CaptureError> {
    if !declared_type.starts_with("image/") {
        return Err(CaptureError::InvalidFileType(declared_type.to_string()));
    }

    let limit_bytes = (constraints.max_size_mb * 1024.0 * 1024.0) as usize;
    if raw.len() > limit_bytes {
        return Err(CaptureError::FileTooLarge {
            actual_mb: raw.len() as f64 / (1024.0 * 1024.0),
            limit_mb: constraints.max_size_mb,
        });
    }

    let decoded = image::load_from_memory(raw).map_err(|e| CaptureError::Decode(e.to_string()))?;
    reencode(decoded, constraints)
}

/// Camera variant: the current video frame goes through the same
/// resize/re-encode path as picked files.
pub fn normalize_frame(
    frame: RgbImage,
    constraints: &NormalizeConstraints,
) -> Result<ImageBuffer, CaptureError> {
    reencode(DynamicImage::ImageRgb8(frame), constraints)
}

/// Shared resize + JPEG re-encode tail
fn reencode(
    img: DynamicImage,
    constraints: &NormalizeConstraints,
) -> Result<ImageBuffer, CaptureError> {
    let (w, h) = (img.width(), img.height());
    let (target_w, target_h) =
        bounded_dimensions(w, h, constraints.max_width, constraints.max_height);

    let img = if (target_w, target_h) != (w, h) {
        img.resize(target_w, target_h, FilterType::Lanczos3)
    } else {
        img
    };

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();
    let (out_w, out_h) = rgb.dimensions();

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, constraints.quality);
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;

    Ok(ImageBuffer {
        bytes,
        mime: "image/jpeg".to_string(),
        width: out_w,
        height: out_h,
    })
}

/// Compute the output dimensions for a bounded, aspect-preserving downscale.
///
/// If either dimension exceeds its bound, both are scaled by the same ratio
/// so the binding dimension lands exactly on its bound. Images already within
/// bounds come back unchanged.
pub fn bounded_dimensions(w: u32, h: u32, max_w: u32, max_h: u32) -> (u32, u32) {
    if w <= max_w && h <= max_h {
        return (w, h);
    }

    let ratio = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    let new_w = ((w as f64 * ratio).round() as u32).max(1);
    let new_h = ((h as f64 * ratio).round() as u32).max(1);
    (new_w, new_h)
}
