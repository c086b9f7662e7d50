//! Transform Engine Module
//!
//! Resizes and re-encodes fetched images when it makes them meaningfully smaller.
//! Every failure degrades to returning the input untouched.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageDecoder, ImageEncoder, ImageReader};
use tracing::{debug, warn};

use crate::error::TransformError;
use crate::transform::policy::{decide, is_eligible, ImageMeta, TargetFormat, TransformPolicy};

/// Output must come in under this share of the input size (percent).
pub const KEEP_THRESHOLD_PERCENT: usize = 97;

// == Transform Engine ==
/// Applies a [`TransformPolicy`] to image bytes.
#[derive(Debug, Clone, Default)]
pub struct TransformEngine {
    policy: TransformPolicy,
}

impl TransformEngine {
    pub fn new(policy: TransformPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TransformPolicy {
        &self.policy
    }

    /// Runs [`transform`] on the blocking pool so codec work never stalls the runtime.
    pub async fn transform(&self, input: Bytes) -> Bytes {
        let policy = self.policy.clone();
        let original = input.clone();
        match tokio::task::spawn_blocking(move || transform(input, &policy)).await {
            Ok(out) => out,
            Err(e) => {
                warn!("transform task failed, keeping original bytes: {}", e);
                original
            }
        }
    }
}

// == Transform ==
/// Returns transformed bytes, or `input` itself when nothing worthwhile happened.
pub fn transform(input: Bytes, policy: &TransformPolicy) -> Bytes {
    if input.len() < policy.min_bytes_to_touch {
        return input;
    }

    match try_transform(&input, policy) {
        Ok(Some(out)) if out.len() * 100 < input.len() * KEEP_THRESHOLD_PERCENT => {
            debug!("transformed image {}B -> {}B", input.len(), out.len());
            Bytes::from(out)
        }
        Ok(Some(out)) => {
            debug!(
                "discarding transform: {}B is not below {}% of {}B",
                out.len(),
                KEEP_THRESHOLD_PERCENT,
                input.len()
            );
            input
        }
        Ok(None) => input,
        Err(e) => {
            debug!("leaving image untouched: {}", e);
            input
        }
    }
}

// == Probe ==
/// Reads format, dimensions and alpha without decoding pixels.
pub fn probe(bytes: &[u8]) -> Result<ImageMeta, TransformError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TransformError::Probe(e.to_string()))?;

    let format = reader
        .format()
        .ok_or_else(|| TransformError::Probe("unrecognised image signature".to_string()))?;
    if !is_eligible(format) {
        return Err(TransformError::UnsupportedFormat(format!("{:?}", format)));
    }

    let decoder = reader
        .into_decoder()
        .map_err(|e| TransformError::Probe(e.to_string()))?;
    let (width, height) = decoder.dimensions();
    if width == 0 || height == 0 {
        return Err(TransformError::Probe("zero-sized image".to_string()));
    }

    Ok(ImageMeta {
        width,
        height,
        format,
        has_alpha: decoder.color_type().has_alpha(),
    })
}

fn try_transform(input: &[u8], policy: &TransformPolicy) -> Result<Option<Vec<u8>>, TransformError> {
    let meta = probe(input)?;
    let decision = decide(&meta, policy);
    let Some(target) = decision.target else {
        return Ok(None);
    };

    let mut image = ImageReader::new(Cursor::new(input))
        .with_guessed_format()
        .map_err(|e| TransformError::Probe(e.to_string()))?
        .decode()
        .map_err(|e| TransformError::Probe(e.to_string()))?;

    if let Some((width, height)) = decision.resize_to {
        image = image.resize_exact(width, height, FilterType::Lanczos3);
    }

    encode(&image, target, policy.quality).map(Some)
}

fn encode(image: &DynamicImage, target: TargetFormat, quality: u8) -> Result<Vec<u8>, TransformError> {
    let (width, height) = (image.width(), image.height());
    let mut out = Vec::new();

    let result = match target {
        TargetFormat::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100)).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )
        }
        TargetFormat::Png => {
            let encoder =
                PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive);
            if image.color().has_alpha() {
                let rgba = image.to_rgba8();
                encoder.write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
            } else {
                let rgb = image.to_rgb8();
                encoder.write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            }
        }
        // The bundled WebP encoder is lossless only; quality does not apply.
        TargetFormat::WebP => {
            let encoder = WebPEncoder::new_lossless(&mut out);
            if image.color().has_alpha() {
                let rgba = image.to_rgba8();
                encoder.write_image(rgba.as_raw(), width, height, ExtendedColorType::Rgba8)
            } else {
                let rgb = image.to_rgb8();
                encoder.write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            }
        }
    };

    result.map_err(|e| TransformError::Encode(e.to_string()))?;
    Ok(out)
}
