// ============================================================================
// TRANSFORM OPERATIONS — crop, padding and normalized-region resampling
// ============================================================================
//
// Pixel-level functions take and return `RgbaImage`; the `RasterImage`
// wrappers at the bottom decode, call them, and PNG-encode the result.

use image::{Rgba, RgbaImage, imageops};
use rayon::prelude::*;

use crate::components::crop::CropRect;
use crate::error::Result;
use crate::raster::RasterImage;

/// Opaque black used to fill padding around AI request images.
pub const PAD_FILL: Rgba<u8> = Rgba([0, 0, 0, 255]);

// ---------------------------------------------------------------------------
//  Crop
// ---------------------------------------------------------------------------

/// Crop to a normalized rectangle. Pixel bounds use floor rounding.
/// Returns `None` when the rectangle rounds to zero width or height.
pub fn crop_pixels(src: &RgbaImage, rect: &CropRect) -> Option<RgbaImage> {
    let (w, h) = src.dimensions();
    let (px, py, pw, ph) = rect.pixel_bounds(w, h)?;
    if px >= w || py >= h {
        return None;
    }
    Some(imageops::crop_imm(src, px, py, pw, ph).to_image())
}

// ---------------------------------------------------------------------------
//  Padding
// ---------------------------------------------------------------------------

/// Smallest canvas of exactly `ratio` (width / height) that contains a
/// `w × h` image, ceiling-rounded to whole pixels.
pub fn aspect_canvas_size(w: u32, h: u32, ratio: f64) -> (u32, u32) {
    if w == 0 || h == 0 || !ratio.is_finite() || ratio <= 0.0 {
        return (w, h);
    }
    let current = w as f64 / h as f64;
    let (target_w, target_h) = if current > ratio {
        // Wider than the target: pad top/bottom.
        (w as f64, w as f64 / ratio)
    } else {
        // Taller (or equal): pad left/right.
        (h as f64 * ratio, h as f64)
    };
    (
        (ceil_px(target_w) as u32).max(w),
        (ceil_px(target_h) as u32).max(h),
    )
}

/// Ceiling that ignores float noise: 225.00000000000003 is 225, not 226.
fn ceil_px(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < 1e-6 { r } else { v.ceil() }
}

/// Centre `src` on a `ratio` canvas filled with opaque black.
///
/// Returns the padded image and the inset rect locating `src` inside it.
/// The offset is snapped to whole pixels and the inset is expressed against
/// the final integer canvas, so resampling the inset back out is lossless.
pub fn pad_pixels_to_aspect_ratio(src: &RgbaImage, ratio: f64) -> (RgbaImage, CropRect) {
    let (w, h) = src.dimensions();
    let (cw, ch) = aspect_canvas_size(w, h, ratio);
    let ox = (cw - w) / 2;
    let oy = (ch - h) / 2;

    let mut canvas = RgbaImage::from_pixel(cw, ch, PAD_FILL);
    imageops::overlay(&mut canvas, src, ox as i64, oy as i64);

    let inset = if cw == 0 || ch == 0 {
        CropRect::FULL
    } else {
        CropRect {
            x: ox as f64 / cw as f64,
            y: oy as f64 / ch as f64,
            width: w as f64 / cw as f64,
            height: h as f64 / ch as f64,
        }
    };
    (canvas, inset)
}

/// Centre `src` on a `target_w × target_h` canvas filled with `bg`.
/// A source larger than the target is clipped evenly on both sides.
pub fn pad_pixels_to_size(src: &RgbaImage, target_w: u32, target_h: u32, bg: Rgba<u8>) -> RgbaImage {
    let (w, h) = src.dimensions();
    let offset_x = (target_w as i64 - w as i64) / 2;
    let offset_y = (target_h as i64 - h as i64) / 2;

    let mut canvas = RgbaImage::from_pixel(target_w, target_h, bg);
    imageops::overlay(&mut canvas, src, offset_x, offset_y);
    canvas
}

// ---------------------------------------------------------------------------
//  Normalized region resampling
// ---------------------------------------------------------------------------

/// Extract the normalized sub-rect `region` of `src` and stretch it to exactly
/// `out_w × out_h`.
///
/// When the region maps onto whole source pixels at 1:1 scale this is a plain
/// copy; otherwise it is a bilinear resample with edge clamping.
pub fn extract_normalized_region(src: &RgbaImage, region: &CropRect, out_w: u32, out_h: u32) -> RgbaImage {
    let (sw, sh) = src.dimensions();
    if out_w == 0 || out_h == 0 || sw == 0 || sh == 0 {
        return RgbaImage::new(out_w, out_h);
    }

    let rx = region.x * sw as f64;
    let ry = region.y * sh as f64;
    let rw = region.width * sw as f64;
    let rh = region.height * sh as f64;

    // Fast path: integer offset, 1:1 scale.
    const SNAP: f64 = 1e-6;
    let snapped = |v: f64| (v - v.round()).abs() < SNAP;
    if snapped(rx)
        && snapped(ry)
        && (rw - out_w as f64).abs() < SNAP
        && (rh - out_h as f64).abs() < SNAP
    {
        let x0 = rx.round().max(0.0) as u32;
        let y0 = ry.round().max(0.0) as u32;
        if x0 + out_w <= sw && y0 + out_h <= sh {
            return imageops::crop_imm(src, x0, y0, out_w, out_h).to_image();
        }
    }

    let scale_x = rw / out_w as f64;
    let scale_y = rh / out_h as f64;
    let stride = out_w as usize * 4;
    let mut out = vec![0u8; stride * out_h as usize];

    out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        let fy = ry + (y as f64 + 0.5) * scale_y - 0.5;
        for x in 0..out_w as usize {
            let fx = rx + (x as f64 + 0.5) * scale_x - 0.5;
            let px = bilinear_sample_clamped(src, fx, fy);
            row[x * 4..x * 4 + 4].copy_from_slice(&px.0);
        }
    });

    RgbaImage::from_raw(out_w, out_h, out).unwrap_or_else(|| RgbaImage::new(out_w, out_h))
}

/// Bilinear sample with coordinates clamped to the image (edge pixels extend).
fn bilinear_sample_clamped(img: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let max_x = (img.width() - 1) as f64;
    let max_y = (img.height() - 1) as f64;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let x0 = x0 as u32;
    let y0 = y0 as u32;
    let x1 = (x0 + 1).min(img.width() - 1);
    let y1 = (y0 + 1).min(img.height() - 1);

    let tl = img.get_pixel(x0, y0);
    let tr = img.get_pixel(x1, y0);
    let bl = img.get_pixel(x0, y1);
    let br = img.get_pixel(x1, y1);

    let lerp = |a: f64, b: f64, t: f64| a + (b - a) * t;
    let mut out = [0u8; 4];
    for c in 0..4 {
        let top = lerp(tl[c] as f64, tr[c] as f64, fx);
        let bot = lerp(bl[c] as f64, br[c] as f64, fx);
        out[c] = lerp(top, bot, fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

// ---------------------------------------------------------------------------
//  RasterImage entry points
// ---------------------------------------------------------------------------

/// Crop an encoded image. A rectangle that rounds to zero area returns the
/// input unchanged.
pub fn crop(image: &RasterImage, rect: &CropRect) -> Result<RasterImage> {
    if rect.pixel_bounds(image.width(), image.height()).is_none() {
        log::debug!("crop rect {:?} rounds to zero area, keeping image", rect);
        return Ok(image.clone());
    }
    let src = image.to_rgba()?;
    match crop_pixels(&src, rect) {
        Some(out) => RasterImage::from_rgba(&out),
        None => Ok(image.clone()),
    }
}

/// Encoded-image result of [`pad_to_aspect_ratio`].
#[derive(Clone, Debug)]
pub struct PaddedImage {
    pub image: RasterImage,
    /// Where the original sits inside `image`, normalized.
    pub inset: CropRect,
}

pub fn pad_to_aspect_ratio(image: &RasterImage, ratio: f64) -> Result<PaddedImage> {
    let src = image.to_rgba()?;
    let (padded, inset) = pad_pixels_to_aspect_ratio(&src, ratio);
    Ok(PaddedImage {
        image: RasterImage::from_rgba(&padded)?,
        inset,
    })
}

pub fn pad_to_size(image: &RasterImage, target_w: u32, target_h: u32, bg: Rgba<u8>) -> Result<RasterImage> {
    let src = image.to_rgba()?;
    RasterImage::from_rgba(&pad_pixels_to_size(&src, target_w, target_h, bg))
}

/// Undo [`pad_to_aspect_ratio`]: cut `inset` out of `padded` and stretch it to
/// `out_w × out_h`.
pub fn unpad(padded: &RasterImage, inset: &CropRect, out_w: u32, out_h: u32) -> Result<RasterImage> {
    let src = padded.to_rgba()?;
    RasterImage::from_rgba(&extract_normalized_region(&src, inset, out_w, out_h))
}
