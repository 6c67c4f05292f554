// ============================================================================
// LUMINANCE MASK — turn a black/white silhouette into a real cutout
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;

use crate::components::crop::CropRect;
use crate::error::Result;
use crate::ops::transform::extract_normalized_region;
use crate::raster::RasterImage;

/// Rec. 601 luma of an RGB triple, 0–255.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32)
        .round()
        .clamp(0.0, 255.0) as u8
}

/// Set the alpha of every `original` pixel to the luminance of the matching
/// `mask` pixel. RGB is left untouched; output is straight alpha.
///
/// `mask` must already have the original's dimensions.
pub fn apply_luminance_alpha(original: &RgbaImage, mask: &RgbaImage) -> RgbaImage {
    let (w, h) = original.dimensions();
    debug_assert_eq!(mask.dimensions(), (w, h));
    let stride = w as usize * 4;
    let src_raw = original.as_raw();
    let mask_raw = mask.as_raw();
    let mut dst_raw = src_raw.clone();

    if stride > 0 {
        dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
            let row_mask = &mask_raw[y * stride..(y + 1) * stride];
            for x in 0..w as usize {
                let pi = x * 4;
                row_out[pi + 3] = luminance(row_mask[pi], row_mask[pi + 1], row_mask[pi + 2]);
            }
        });
    }

    RgbaImage::from_raw(w, h, dst_raw).unwrap_or_else(|| original.clone())
}

/// Un-pad `mask` with `inset` (in the mask's own normalized space), stretch
/// it to the original's size, and use its luminance as the original's alpha.
pub fn apply_luminance_mask_pixels(original: &RgbaImage, mask: &RgbaImage, inset: &CropRect) -> RgbaImage {
    let (w, h) = original.dimensions();
    let resampled = extract_normalized_region(mask, inset, w, h);
    apply_luminance_alpha(original, &resampled)
}

pub fn apply_luminance_mask(original: &RasterImage, mask: &RasterImage, inset: &CropRect) -> Result<RasterImage> {
    let original_px = original.to_rgba()?;
    let mask_px = mask.to_rgba()?;
    log::debug!(
        "applying {}x{} luminance mask to {}x{} image, inset {:?}",
        mask.width(),
        mask.height(),
        original.width(),
        original.height(),
        inset
    );
    RasterImage::from_rgba(&apply_luminance_mask_pixels(&original_px, &mask_px, inset))
}
