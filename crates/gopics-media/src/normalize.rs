use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use thiserror::Error;
use tracing::debug;

/// 2 MiB.
pub const MAX_PICTURE_BYTES: u64 = 2_097_152;
pub const MAX_WIDTH: u32 = 800;
pub const MAX_HEIGHT: u32 = 600;

/// Extension of every normalized picture.
pub const CANONICAL_EXTENSION: &str = "jpeg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub max_bytes: u64,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_bytes: MAX_PICTURE_BYTES,
            max_width: MAX_WIDTH,
            max_height: MAX_HEIGHT,
        }
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("declared length is missing")]
    LengthRequired,
    #[error("upload exceeds {0} bytes")]
    PayloadTooLarge(u64),
    #[error("unsupported or corrupt image: {0}")]
    UnsupportedMedia(String),
    #[error("failed to encode image: {0}")]
    EncodeFailure(String),
}

/// A re-encoded picture ready to be stored.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Cheap rejection on the declared request length, before any body is read.
pub fn check_declared_length(declared: Option<u64>, limits: &ImageLimits) -> Result<(), MediaError> {
    match declared {
        None => Err(MediaError::LengthRequired),
        Some(len) if len > limits.max_bytes => Err(MediaError::PayloadTooLarge(limits.max_bytes)),
        Some(_) => Ok(()),
    }
}

/// Size an image should have after normalization.
///
/// Images within bounds keep their size. Wider-than-tall images get the
/// maximum width; all others get the maximum height. The other side follows
/// the aspect ratio.
pub fn target_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let d = f64::from(width) / f64::from(height);
    if width > height {
        let h = (f64::from(max_width) / d).round() as u32;
        (max_width, h.max(1))
    } else {
        let w = (d * f64::from(max_height)).round() as u32;
        (w.max(1), max_height)
    }
}

/// Decode `raw`, shrink it to fit `limits` and re-encode it as JPEG.
///
/// CPU bound; run it on a blocking thread.
pub fn normalize(raw: &[u8], limits: &ImageLimits) -> Result<Normalized, MediaError> {
    if raw.len() as u64 > limits.max_bytes {
        return Err(MediaError::PayloadTooLarge(limits.max_bytes));
    }

    let src = image::load_from_memory(raw).map_err(|e| MediaError::UnsupportedMedia(e.to_string()))?;
    let (width, height) = (src.width(), src.height());
    let (w, h) = target_dimensions(width, height, limits.max_width, limits.max_height);

    let img = if (w, h) == (width, height) {
        src
    } else {
        debug!("Resizing {}x{} to {}x{}", width, height, w, h);
        src.resize_exact(w, h, FilterType::Lanczos3)
    };

    let rgb = img.to_rgb8();
    let mut bytes = Vec::new();
    JpegEncoder::new(&mut bytes)
        .encode_image(&rgb)
        .map_err(|e| MediaError::EncodeFailure(e.to_string()))?;

    Ok(Normalized {
        bytes,
        width: w,
        height: h,
    })
}
