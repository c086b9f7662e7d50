//! Display sizing for embedded images.

/// `(width, height)` to render an image at, no wider than `max_width`.
///
/// Reads only the header. Unreadable input renders as 1x1.
pub fn display_size(bytes: &[u8], max_width: u32) -> (u32, u32) {
    let Ok(size) = imagesize::blob_size(bytes) else {
        return (1, 1);
    };
    if size.width == 0 || size.height == 0 {
        return (1, 1);
    }

    let natural_w = u32::try_from(size.width).unwrap_or(u32::MAX);
    let width = natural_w.min(max_width.max(1));
    let scale = width as f64 / size.width as f64;
    let height = (size.height as f64 * scale).round().max(1.0) as u32;
    (width, height)
}
