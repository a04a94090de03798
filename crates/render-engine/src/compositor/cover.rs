//! Cover-fit scaling: fill the canvas, keep the aspect ratio, crop overflow.

use image::imageops::{crop_imm, resize, FilterType};
use image::RgbaImage;

/// Region of the source that remains visible after a centered cover fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoverRect {
    /// Source-to-canvas scale.
    pub scale: f64,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the centered source crop that, scaled by `scale`, exactly covers
/// a `dst_w × dst_h` canvas. `None` for degenerate sizes.
pub fn cover_rect(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Option<CoverRect> {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return None;
    }

    let scale = (dst_w as f64 / src_w as f64).max(dst_h as f64 / src_h as f64);
    let width = ((dst_w as f64 / scale).round() as u32).clamp(1, src_w);
    let height = ((dst_h as f64 / scale).round() as u32).clamp(1, src_h);

    Some(CoverRect {
        scale,
        x: (src_w - width) / 2,
        y: (src_h - height) / 2,
        width,
        height,
    })
}

/// Scale `src` to cover a `dst_w × dst_h` canvas.
pub fn cover_fit(src: &RgbaImage, dst_w: u32, dst_h: u32) -> Option<RgbaImage> {
    let rect = cover_rect(src.width(), src.height(), dst_w, dst_h)?;

    let visible = crop_imm(src, rect.x, rect.y, rect.width, rect.height).to_image();
    if rect.width == dst_w && rect.height == dst_h {
        return Some(visible);
    }
    Some(resize(&visible, dst_w, dst_h, FilterType::Triangle))
}
