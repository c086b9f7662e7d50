//! Deterministic test image generators.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};

/// Gradient with mild pseudo-random grain, so encoders have real work to do.
fn grain(x: u32, y: u32, seed: u32) -> u8 {
    let mut v = x.wrapping_mul(73_856_093) ^ y.wrapping_mul(19_349_663) ^ seed;
    v ^= v >> 13;
    v = v.wrapping_mul(0x5bd1_e995);
    v ^= v >> 15;
    (v % 24) as u8
}

pub fn noisy_rgb(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let base = ((x * 255) / width.max(1)) as u8;
        image::Rgb([
            base.saturating_add(grain(x, y, 1)),
            (((y * 255) / height.max(1)) as u8).saturating_add(grain(x, y, 2)),
            128u8.saturating_add(grain(x, y, 3)),
        ])
    })
}

pub fn noisy_rgba(width: u32, height: u32) -> RgbaImage {
    let rgb = noisy_rgb(width, height);
    RgbaImage::from_fn(width, height, |x, y| {
        let p = rgb.get_pixel(x, y);
        image::Rgba([p[0], p[1], p[2], if (x / 8 + y / 8) % 2 == 0 { 255 } else { 96 }])
    })
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

pub fn noisy_png(width: u32, height: u32, alpha: bool) -> Vec<u8> {
    if alpha {
        encode(DynamicImage::ImageRgba8(noisy_rgba(width, height)), ImageFormat::Png)
    } else {
        encode(DynamicImage::ImageRgb8(noisy_rgb(width, height)), ImageFormat::Png)
    }
}

pub fn noisy_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(noisy_rgb(width, height)), ImageFormat::Jpeg)
}

pub fn noisy_tiff(width: u32, height: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(noisy_rgb(width, height)), ImageFormat::Tiff)
}
