//! Thumbnail codec: premultiplied contain-resize and opaque compositing
//!
//! **Why**: Resampling straight-alpha pixels blends the (arbitrary) color
//! values of fully transparent pixels into visible edges, producing
//! fringes. Premultiplying color by alpha before the filter pass makes
//! transparent pixels contribute nothing.
//!
//! **Used by**: Worker jobs (decode + resize + compose per cache miss)
//!
//! The order is fixed: premultiply-resize first, composite onto the
//! opaque tile background second. Compositing before the resize would
//! reintroduce fringing against the background color.

use anyhow::{Context, Result};
use image::imageops::FilterType;
use image::{Rgb, RgbImage, Rgba, RgbaImage};
use std::path::Path;

/// Resize to the largest size that fits `(box_w, box_h)` preserving
/// aspect ratio, premultiplying color by alpha before resampling.
/// Output dimensions are floored, minimum 1 px per side.
pub fn resize_contain_premultiplied(img: &RgbaImage, box_w: u32, box_h: u32) -> RgbaImage {
    let (w, h) = img.dimensions();
    let scale = f64::min(
        box_w as f64 / w.max(1) as f64,
        box_h as f64 / h.max(1) as f64,
    );
    let new_w = ((w as f64 * scale) as u32).max(1);
    let new_h = ((h as f64 * scale) as u32).max(1);

    let mut premultiplied = RgbaImage::new(w, h);
    for (dst, src) in premultiplied.pixels_mut().zip(img.pixels()) {
        let Rgba([r, g, b, a]) = *src;
        *dst = Rgba([mul8(r, a), mul8(g, a), mul8(b, a), a]);
    }

    image::imageops::resize(&premultiplied, new_w, new_h, FilterType::Lanczos3)
}

/// Composite a resized (premultiplied) image centered on an opaque
/// `size`x`size` canvas filled with `bg`, flattening to RGB.
pub fn compose_on_opaque(img: &RgbaImage, size: u32, bg: Rgb<u8>) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(size, size, bg);

    let (w, h) = img.dimensions();
    let x0 = (size.saturating_sub(w) / 2) as i64;
    let y0 = (size.saturating_sub(h) / 2) as i64;

    for (x, y, px) in img.enumerate_pixels() {
        let cx = x0 + x as i64;
        let cy = y0 + y as i64;
        if cx < 0 || cy < 0 || cx >= size as i64 || cy >= size as i64 {
            continue;
        }
        let Rgba([r, g, b, a]) = *px;
        let dst = canvas.get_pixel_mut(cx as u32, cy as u32);
        let inv = 255 - a;
        *dst = Rgb([
            mul8(r, a).saturating_add(mul8(dst[0], inv)),
            mul8(g, a).saturating_add(mul8(dst[1], inv)),
            mul8(b, a).saturating_add(mul8(dst[2], inv)),
        ]);
    }

    canvas
}

/// Decode a source frame and render the final tile bitmap: contain-resize
/// into a `size` box, then compose on the opaque tile background.
/// One call per cache miss, always on a worker thread.
pub fn render(path: &Path, size: u32, bg: Rgb<u8>) -> Result<RgbImage> {
    let img = image::open(path)
        .with_context(|| format!("decode {}", path.display()))?
        .to_rgba8();
    let resized = resize_contain_premultiplied(&img, size, size);
    Ok(compose_on_opaque(&resized, size, bg))
}

/// Rounded (c * a) / 255
#[inline]
fn mul8(c: u8, a: u8) -> u8 {
    ((c as u16 * a as u16 + 127) / 255) as u8
}
