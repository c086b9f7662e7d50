//! Transform Policy Module
//!
//! Pure decision logic: given image metadata and thresholds, what should happen.

use image::ImageFormat;

// == Transform Policy ==
/// Thresholds and format preferences applied to every fetched image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformPolicy {
    pub max_width: u32,
    pub max_height: u32,
    /// Quality for lossy encoders (1-100)
    pub quality: u8,
    /// Inputs below this many bytes are never touched
    pub min_bytes_to_touch: usize,
    /// Re-encode PNGs without alpha as a photo format
    pub convert_opaque_png_to_photo: bool,
    /// Photo format is WebP instead of JPEG
    pub prefer_webp: bool,
}

impl Default for TransformPolicy {
    fn default() -> Self {
        Self {
            max_width: 1800,
            max_height: 1800,
            quality: 78,
            min_bytes_to_touch: 200_000,
            convert_opaque_png_to_photo: true,
            prefer_webp: false,
        }
    }
}

// == Image Meta ==
/// What the engine learns from probing the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMeta {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
    pub has_alpha: bool,
}

// == Target Format ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
    WebP,
}

impl TargetFormat {
    fn from_source(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(TargetFormat::Jpeg),
            ImageFormat::Png => Some(TargetFormat::Png),
            ImageFormat::WebP => Some(TargetFormat::WebP),
            _ => None,
        }
    }
}

// == Transform Decision ==
/// Outcome of [`decide`]. `target == None` means leave the bytes alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformDecision {
    /// New dimensions, set only when the image exceeds the bounds
    pub resize_to: Option<(u32, u32)>,
    /// Encoding for the output
    pub target: Option<TargetFormat>,
}

impl TransformDecision {
    pub fn is_noop(&self) -> bool {
        self.target.is_none()
    }
}

/// Only these source formats are worth decoding.
pub fn is_eligible(format: ImageFormat) -> bool {
    matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP | ImageFormat::Tiff
    )
}

// == Decide ==
/// Works out whether to resize and which encoding to produce.
///
/// JPEG and WebP inputs within bounds are left alone. PNG with alpha is never
/// turned into a photo format. TIFF always becomes JPEG.
pub fn decide(meta: &ImageMeta, policy: &TransformPolicy) -> TransformDecision {
    let resize_to = fit_within(meta.width, meta.height, policy.max_width, policy.max_height);
    let resize_to = (resize_to != (meta.width, meta.height)).then_some(resize_to);

    let photo = if policy.prefer_webp {
        TargetFormat::WebP
    } else {
        TargetFormat::Jpeg
    };

    let converted = match meta.format {
        ImageFormat::Tiff => Some(TargetFormat::Jpeg),
        ImageFormat::Png if !meta.has_alpha && policy.convert_opaque_png_to_photo => Some(photo),
        _ => None,
    };

    let target = match (converted, resize_to) {
        (Some(format), _) => Some(format),
        (None, Some(_)) => TargetFormat::from_source(meta.format),
        (None, None) => None,
    };

    TransformDecision { resize_to, target }
}

// == Fit Within ==
/// Scales `(width, height)` down to fit the bounds, keeping aspect ratio.
///
/// Never enlarges. Each side is at least 1 pixel.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return (width, height);
    }

    let scale = f64::min(
        f64::from(max_width) / f64::from(width),
        f64::from(max_height) / f64::from(height),
    );
    let scaled = |side: u32, bound: u32| -> u32 {
        ((f64::from(side) * scale).round() as u32).clamp(1, bound.max(1))
    };

    (scaled(width, max_width), scaled(height, max_height))
}
