// ============================================================================
// PALETTE & IMAGE INFO — dominant colours and the properties panel data
// ============================================================================

use std::collections::HashMap;

use image::{RgbaImage, imageops};
use serde::Serialize;

use crate::error::Result;
use crate::raster::RasterImage;

/// Tuning for [`extract_palette`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaletteOptions {
    /// Maximum number of swatches returned.
    pub color_count: usize,
    /// Channel bucket width; 32 gives 8 levels per channel.
    pub quantization: u8,
    /// Pixels with alpha below this are ignored.
    pub alpha_threshold: u8,
    /// Width the image is downsampled to before counting.
    pub working_width: u32,
}

impl Default for PaletteOptions {
    fn default() -> Self {
        Self {
            color_count: 5,
            quantization: 32,
            alpha_threshold: 128,
            working_width: 100,
        }
    }
}

/// Quantized colour bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Swatch {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Swatch {
    /// Lowercase `#rrggbb`.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Most frequent quantized colours of `src`, most frequent first.
///
/// Buckets with equal counts keep the order in which they were first seen
/// (row-major over the downsampled image). Fully transparent images yield
/// an empty list.
pub fn extract_palette(src: &RgbaImage, opts: &PaletteOptions) -> Vec<Swatch> {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 || opts.color_count == 0 {
        return Vec::new();
    }

    let work_w = opts.working_width.max(1);
    let work_h = ((work_w as f64 * h as f64 / w as f64) as u32).max(1);
    let small = imageops::resize(src, work_w, work_h, imageops::FilterType::Triangle);

    let q = opts.quantization.max(1);
    let bucket = |v: u8| (v / q) * q;

    // bucket -> (count, first seen)
    let mut counts: HashMap<Swatch, (u32, usize)> = HashMap::new();
    for px in small.pixels() {
        if px[3] < opts.alpha_threshold {
            continue;
        }
        let key = Swatch {
            r: bucket(px[0]),
            g: bucket(px[1]),
            b: bucket(px[2]),
        };
        let next = counts.len();
        counts.entry(key).or_insert((0, next)).0 += 1;
    }

    let mut ranked: Vec<(Swatch, u32, usize)> =
        counts.into_iter().map(|(k, (n, first))| (k, n, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(opts.color_count).map(|(k, _, _)| k).collect()
}

/// Human-readable byte count, 1024 based: `0 Bytes`, `512 Bytes`, `2.4 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const SIZES: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut i = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && i < SIZES.len() - 1 {
        value /= 1024.0;
        i += 1;
    }
    let text = format!("{:.2}", value);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, SIZES[i])
}

/// Data shown in the image properties panel.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    /// e.g. `"2.4 MB"`
    pub size: String,
    /// e.g. `"PNG"`
    pub format: String,
    /// `#rrggbb` swatches, most frequent first.
    pub palette: Vec<String>,
}

impl ImageInfo {
    pub fn of(image: &RasterImage, opts: &PaletteOptions) -> Result<Self> {
        let pixels = image.to_rgba()?;
        let size_bytes = image.encoded_len() as u64;
        Ok(Self {
            width: image.width(),
            height: image.height(),
            size_bytes,
            size: format_bytes(size_bytes),
            format: image.format().label().to_string(),
            palette: extract_palette(&pixels, opts).iter().map(Swatch::hex).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn dominant_colour_comes_first() {
        // 3/4 red, 1/4 blue.
        let img = RgbaImage::from_fn(100, 100, |x, _| {
            if x < 75 { Rgba([250, 10, 10, 255]) } else { Rgba([5, 5, 200, 255]) }
        });
        let swatches = extract_palette(&img, &PaletteOptions::default());
        assert!(swatches.len() <= 5);
        assert_eq!(swatches[0], Swatch { r: 224, g: 0, b: 0 });
        assert!(swatches.contains(&Swatch { r: 0, g: 0, b: 192 }));
    }

    #[test]
    fn never_more_than_colour_count() {
        let img = RgbaImage::from_fn(64, 64, |x, y| Rgba([(x * 4) as u8, (y * 4) as u8, 128, 255]));
        let opts = PaletteOptions { color_count: 3, ..Default::default() };
        assert_eq!(extract_palette(&img, &opts).len(), 3);
    }

    #[test]
    fn transparent_image_has_no_palette() {
        let img = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 0]));
        assert!(extract_palette(&img, &PaletteOptions::default()).is_empty());
    }

    #[test]
    fn palette_is_deterministic() {
        let img = RgbaImage::from_fn(37, 23, |x, y| Rgba([(x * 7) as u8, (y * 11) as u8, (x ^ y) as u8, 255]));
        let opts = PaletteOptions::default();
        assert_eq!(extract_palette(&img, &opts), extract_palette(&img, &opts));
    }

    #[test]
    fn hex_is_lowercase() {
        assert_eq!(Swatch { r: 224, g: 160, b: 0 }.hex(), "#e0a000");
    }

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(0), "0 Bytes");
        assert_eq!(format_bytes(512), "512 Bytes");
        assert_eq!(format_bytes(1024), "1 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(2_516_582), "2.4 MB");
    }

    #[test]
    fn info_reports_header_facts() {
        let img = RgbaImage::from_pixel(30, 20, Rgba([33, 66, 99, 255]));
        let raster = RasterImage::from_rgba(&img).unwrap();
        let info = ImageInfo::of(&raster, &PaletteOptions::default()).unwrap();
        assert_eq!((info.width, info.height), (30, 20));
        assert_eq!(info.format, "PNG");
        assert_eq!(info.palette, vec!["#204060".to_string()]);
        assert_eq!(info.size_bytes, raster.encoded_len() as u64);
    }
}
