//! Transform Module
//!
//! Bounded resize and re-encode of fetched images.

mod engine;
mod policy;

pub use engine::{probe, transform, TransformEngine, KEEP_THRESHOLD_PERCENT};
pub use policy::{decide, fit_within, is_eligible, ImageMeta, TargetFormat, TransformDecision, TransformPolicy};

#[cfg(test)]
pub(crate) mod test_images;
