// ============================================================================
// FILTER OPERATIONS — CSS-style filter chains and intensity blending
// ============================================================================
//
// A filter expression is a whitespace-separated list of CSS filter functions,
// e.g. `contrast(1.1) brightness(90%) hue-rotate(-10deg)`. Functions apply
// left-to-right; colour functions use the Filter Effects matrices and the
// result is clamped to [0, 255] after every step. Runs of colour functions
// are fused into one parallel pass; `blur()` splits the chain.
// ============================================================================

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use rayon::prelude::*;

use crate::error::{EditorError, Result};
use crate::raster::RasterImage;

// ---------------------------------------------------------------------------
//  Filter functions
// ---------------------------------------------------------------------------

/// One parsed filter function. Amounts are fractions (1.0 = 100%).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterOp {
    Brightness(f32),
    Contrast(f32),
    Saturate(f32),
    Grayscale(f32),
    Sepia(f32),
    Invert(f32),
    Opacity(f32),
    /// Degrees.
    HueRotate(f32),
    /// Standard deviation in pixels.
    Blur(f32),
}

impl FilterOp {
    fn is_spatial(&self) -> bool {
        matches!(self, FilterOp::Blur(_))
    }

    /// Apply a colour function to one straight-alpha pixel in 0..255 space.
    fn apply_color(&self, px: &mut [f32; 4]) {
        match *self {
            FilterOp::Brightness(a) => {
                for c in &mut px[..3] {
                    *c *= a;
                }
            }
            FilterOp::Contrast(a) => {
                let intercept = (0.5 - 0.5 * a) * 255.0;
                for c in &mut px[..3] {
                    *c = *c * a + intercept;
                }
            }
            FilterOp::Saturate(s) => mat3(px, &saturate_matrix(s)),
            FilterOp::Grayscale(g) => {
                let a = 1.0 - g.min(1.0);
                mat3(
                    px,
                    &[
                        [0.2126 + 0.7874 * a, 0.7152 - 0.7152 * a, 0.0722 - 0.0722 * a],
                        [0.2126 - 0.2126 * a, 0.7152 + 0.2848 * a, 0.0722 - 0.0722 * a],
                        [0.2126 - 0.2126 * a, 0.7152 - 0.7152 * a, 0.0722 + 0.9278 * a],
                    ],
                );
            }
            FilterOp::Sepia(g) => {
                let a = 1.0 - g.min(1.0);
                mat3(
                    px,
                    &[
                        [0.393 + 0.607 * a, 0.769 - 0.769 * a, 0.189 - 0.189 * a],
                        [0.349 - 0.349 * a, 0.686 + 0.314 * a, 0.168 - 0.168 * a],
                        [0.272 - 0.272 * a, 0.534 - 0.534 * a, 0.131 + 0.869 * a],
                    ],
                );
            }
            FilterOp::Invert(a) => {
                let a = a.min(1.0);
                for c in &mut px[..3] {
                    *c = a * (255.0 - *c) + (1.0 - a) * *c;
                }
            }
            FilterOp::Opacity(a) => px[3] *= a.min(1.0),
            FilterOp::HueRotate(deg) => mat3(px, &hue_rotate_matrix(deg)),
            FilterOp::Blur(_) => {}
        }
        for c in px.iter_mut() {
            *c = c.clamp(0.0, 255.0);
        }
    }
}

fn mat3(px: &mut [f32; 4], m: &[[f32; 3]; 3]) {
    let (r, g, b) = (px[0], px[1], px[2]);
    for (i, row) in m.iter().enumerate() {
        px[i] = row[0] * r + row[1] * g + row[2] * b;
    }
}

fn saturate_matrix(s: f32) -> [[f32; 3]; 3] {
    [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ]
}

fn hue_rotate_matrix(deg: f32) -> [[f32; 3]; 3] {
    let (sin, cos) = deg.to_radians().sin_cos();
    [
        [
            0.213 + cos * 0.787 - sin * 0.213,
            0.715 - cos * 0.715 - sin * 0.715,
            0.072 - cos * 0.072 + sin * 0.928,
        ],
        [
            0.213 - cos * 0.213 + sin * 0.143,
            0.715 + cos * 0.285 + sin * 0.140,
            0.072 - cos * 0.072 - sin * 0.283,
        ],
        [
            0.213 - cos * 0.213 - sin * 0.787,
            0.715 - cos * 0.715 + sin * 0.715,
            0.072 + cos * 0.928 + sin * 0.072,
        ],
    ]
}

// ---------------------------------------------------------------------------
//  Parsing
// ---------------------------------------------------------------------------

/// A parsed filter expression.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterChain {
    ops: Vec<FilterOp>,
}

impl FilterChain {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn parse(expr: &str) -> Result<Self> {
        let expr = expr.trim();
        if expr.is_empty() || expr.eq_ignore_ascii_case("none") {
            return Ok(Self::identity());
        }

        let mut ops = Vec::new();
        let mut rest = expr;
        while !rest.is_empty() {
            let open = rest
                .find('(')
                .ok_or_else(|| EditorError::Filter(format!("expected '(' in `{}`", rest)))?;
            let name = rest[..open].trim().to_ascii_lowercase();
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphabetic() || c == '-') {
                return Err(EditorError::Filter(format!("bad function name `{}`", name)));
            }

            // Find the matching ')' (drop-shadow may nest rgba(...)).
            let mut depth = 0usize;
            let mut close = None;
            for (i, ch) in rest[open..].char_indices() {
                match ch {
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            close = Some(open + i);
                            break;
                        }
                    }
                    _ => {}
                }
            }
            let close = close
                .ok_or_else(|| EditorError::Filter(format!("unclosed `{}(`", name)))?;
            let args = rest[open + 1..close].trim();

            if let Some(op) = parse_function(&name, args)? {
                ops.push(op);
            }
            rest = rest[close + 1..].trim_start();
        }
        Ok(Self { ops })
    }

    pub fn ops(&self) -> &[FilterOp] {
        &self.ops
    }

    pub fn is_identity(&self) -> bool {
        self.ops.is_empty()
    }

    /// Render a fully filtered copy of `src`.
    pub fn apply(&self, src: &RgbaImage) -> RgbaImage {
        let mut img = src.clone();
        let mut run: Vec<FilterOp> = Vec::new();
        for op in &self.ops {
            if let FilterOp::Blur(sigma) = *op {
                apply_color_run(&mut img, &run);
                run.clear();
                if sigma > 0.0 {
                    img = parallel_gaussian_blur(&img, sigma);
                }
            } else {
                run.push(*op);
            }
        }
        apply_color_run(&mut img, &run);
        img
    }
}

impl FromStr for FilterChain {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_function(name: &str, args: &str) -> Result<Option<FilterOp>> {
    let op = match name {
        "brightness" => FilterOp::Brightness(parse_amount(name, args)?),
        "contrast" => FilterOp::Contrast(parse_amount(name, args)?),
        "saturate" => FilterOp::Saturate(parse_amount(name, args)?),
        "grayscale" => FilterOp::Grayscale(parse_amount(name, args)?),
        "sepia" => FilterOp::Sepia(parse_amount(name, args)?),
        "invert" => FilterOp::Invert(parse_amount(name, args)?),
        "opacity" => FilterOp::Opacity(parse_amount(name, args)?),
        "hue-rotate" => FilterOp::HueRotate(parse_angle(args)?),
        "blur" => FilterOp::Blur(parse_length(args)?),
        // No geometric effect on a flat opaque raster.
        "drop-shadow" => return Ok(None),
        other => return Err(EditorError::Filter(format!("unknown filter function `{}`", other))),
    };
    Ok(Some(op))
}

/// Split `"-10.5deg"` into `(-10.5, "deg")`.
fn split_number(s: &str) -> Option<(f32, &str)> {
    let end = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+'))
        .unwrap_or(s.len());
    let value: f32 = s[..end].parse().ok()?;
    value.is_finite().then_some((value, s[end..].trim()))
}

/// `<number> | <percentage>`, non-negative; empty means 1.
fn parse_amount(name: &str, args: &str) -> Result<f32> {
    if args.is_empty() {
        return Ok(1.0);
    }
    let bad = || EditorError::Filter(format!("bad argument `{}` for {}()", args, name));
    let (value, unit) = split_number(args).ok_or_else(bad)?;
    let amount = match unit {
        "" => value,
        "%" => value / 100.0,
        _ => return Err(bad()),
    };
    if amount < 0.0 {
        return Err(bad());
    }
    Ok(amount)
}

/// `<angle>` in degrees; a bare zero is allowed.
fn parse_angle(args: &str) -> Result<f32> {
    if args.is_empty() {
        return Ok(0.0);
    }
    let bad = || EditorError::Filter(format!("bad angle `{}` for hue-rotate()", args));
    let (value, unit) = split_number(args).ok_or_else(bad)?;
    match unit {
        "deg" => Ok(value),
        "rad" => Ok(value.to_degrees()),
        "grad" => Ok(value * 0.9),
        "turn" => Ok(value * 360.0),
        "" if value == 0.0 => Ok(0.0),
        _ => Err(bad()),
    }
}

/// `<length>` in px; a bare zero is allowed.
fn parse_length(args: &str) -> Result<f32> {
    if args.is_empty() {
        return Ok(0.0);
    }
    let bad = || EditorError::Filter(format!("bad length `{}` for blur()", args));
    let (value, unit) = split_number(args).ok_or_else(bad)?;
    if value < 0.0 {
        return Err(bad());
    }
    match unit {
        "px" => Ok(value),
        "" if value == 0.0 => Ok(0.0),
        _ => Err(bad()),
    }
}

// ---------------------------------------------------------------------------
//  Evaluation
// ---------------------------------------------------------------------------

fn apply_color_run(img: &mut RgbaImage, run: &[FilterOp]) {
    if run.is_empty() {
        return;
    }
    debug_assert!(run.iter().all(|op| !op.is_spatial()));
    let stride = img.width() as usize * 4;
    if stride == 0 {
        return;
    }
    let raw: &mut [u8] = img;
    raw.par_chunks_mut(stride).for_each(|row| {
        for chunk in row.chunks_exact_mut(4) {
            let mut px = [
                chunk[0] as f32,
                chunk[1] as f32,
                chunk[2] as f32,
                chunk[3] as f32,
            ];
            for op in run {
                op.apply_color(&mut px);
            }
            for (dst, v) in chunk.iter_mut().zip(px) {
                *dst = v.round().clamp(0.0, 255.0) as u8;
            }
        }
    });
}

/// Build a 1-D Gaussian kernel truncated at ceil(3*sigma), and at
/// `max_radius` since edge clamping makes any wider tap a repeat.
fn build_gaussian_kernel(sigma: f32, max_radius: usize) -> Vec<f32> {
    let radius = ((sigma * 3.0).ceil() as usize).min(max_radius);
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let inv = 1.0 / kernel.iter().sum::<f32>();
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Separable Gaussian blur, rows in parallel, edges clamped.
fn parallel_gaussian_blur(src: &RgbaImage, sigma: f32) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }

    let kernel = build_gaussian_kernel(sigma, w.max(h));
    let radius = kernel.len() / 2;
    let buf_in: Vec<f32> = src.as_raw().iter().map(|&b| b as f32).collect();

    // --- Horizontal pass ---
    let mut buf_h = vec![0.0f32; w * h * 4];
    buf_h.par_chunks_mut(w * 4).enumerate().for_each(|(y, row_out)| {
        let row_start = y * w * 4;
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                let idx = row_start + sx * 4;
                for c in 0..4 {
                    acc[c] += buf_in[idx + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    // --- Vertical pass ---
    let mut buf_v = vec![0.0f32; w * h * 4];
    buf_v.par_chunks_mut(w * 4).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                let idx = sy * w * 4 + x * 4;
                for c in 0..4 {
                    acc[c] += buf_h[idx + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    let dst_raw: Vec<u8> = buf_v.iter().map(|&v| v.round().clamp(0.0, 255.0) as u8).collect();
    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

// ---------------------------------------------------------------------------
//  Intensity blend
// ---------------------------------------------------------------------------

/// Source-over composite of `top` onto `base` with extra layer opacity
/// `opacity` (0..1). Both images are straight alpha and the same size.
pub fn blend_over(base: &RgbaImage, top: &RgbaImage, opacity: f32) -> RgbaImage {
    let (w, h) = base.dimensions();
    debug_assert_eq!(top.dimensions(), (w, h));
    let opacity = opacity.clamp(0.0, 1.0);
    let stride = w as usize * 4;
    let mut out = base.clone();
    if stride == 0 {
        return out;
    }
    let top_raw = top.as_raw();
    let raw: &mut [u8] = &mut out;
    raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        let row_top = &top_raw[y * stride..(y + 1) * stride];
        for (dst, src) in row.chunks_exact_mut(4).zip(row_top.chunks_exact(4)) {
            let a_s = src[3] as f32 / 255.0 * opacity;
            let a_b = dst[3] as f32 / 255.0;
            let a_o = a_s + a_b * (1.0 - a_s);
            if a_o <= 0.0 {
                dst.copy_from_slice(&[0, 0, 0, 0]);
                continue;
            }
            for c in 0..3 {
                let v = (src[c] as f32 * a_s + dst[c] as f32 * a_b * (1.0 - a_s)) / a_o;
                dst[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            dst[3] = (a_o * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    });
    out
}

/// Base layer plus a filtered copy composited at `intensity` percent.
pub fn apply_filter_blend_pixels(src: &RgbaImage, chain: &FilterChain, intensity: f32) -> RgbaImage {
    let intensity = if intensity.is_finite() { intensity.clamp(0.0, 100.0) } else { 0.0 };
    if intensity <= 0.0 || chain.is_identity() {
        return src.clone();
    }
    let filtered = chain.apply(src);
    blend_over(src, &filtered, intensity / 100.0)
}

/// Apply `expr` to `image` at `intensity` (0–100). The result is always a
/// freshly encoded PNG, even at intensity 0.
pub fn apply_filter_blend(image: &RasterImage, expr: &str, intensity: f32) -> Result<RasterImage> {
    let chain = FilterChain::parse(expr)?;
    let src = image.to_rgba()?;
    log::debug!("filter `{}` at {}% on {}x{}", expr, intensity, src.width(), src.height());
    RasterImage::from_rgba(&apply_filter_blend_pixels(&src, &chain, intensity))
}

// ---------------------------------------------------------------------------
//  Slider adjustments
// ---------------------------------------------------------------------------

/// Values of the colour panel sliders.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorAdjustments {
    /// Percent, 0..200.
    pub brightness: f32,
    /// Percent, 0..200.
    pub contrast: f32,
    /// Percent, 0..200.
    pub saturate: f32,
    /// Degrees, -180..180.
    pub hue: f32,
}

impl Default for ColorAdjustments {
    fn default() -> Self {
        Self {
            brightness: 100.0,
            contrast: 100.0,
            saturate: 100.0,
            hue: 0.0,
        }
    }
}

impl ColorAdjustments {
    /// Slider values clamped to their ranges.
    pub fn clamped(self) -> Self {
        Self {
            brightness: self.brightness.clamp(0.0, 200.0),
            contrast: self.contrast.clamp(0.0, 200.0),
            saturate: self.saturate.clamp(0.0, 200.0),
            hue: self.hue.clamp(-180.0, 180.0),
        }
    }

    pub fn to_filter_expression(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ColorAdjustments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "brightness({}%) contrast({}%) saturate({}%) hue-rotate({}deg)",
            self.brightness, self.contrast, self.saturate, self.hue
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(px: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(4, 3, Rgba(px))
    }

    fn run(expr: &str, px: [u8; 4]) -> [u8; 4] {
        FilterChain::parse(expr).unwrap().apply(&solid(px)).get_pixel(1, 1).0
    }

    #[test]
    fn none_and_empty_are_identity() {
        assert!(FilterChain::parse("none").unwrap().is_identity());
        assert!(FilterChain::parse("  ").unwrap().is_identity());
        assert_eq!(run("none", [1, 2, 3, 4]), [1, 2, 3, 4]);
    }

    #[test]
    fn parses_mixed_units() {
        let chain = FilterChain::parse("brightness(90%) contrast(1.1) hue-rotate(-10deg) blur(1px)").unwrap();
        assert_eq!(
            chain.ops(),
            &[
                FilterOp::Brightness(0.9),
                FilterOp::Contrast(1.1),
                FilterOp::HueRotate(-10.0),
                FilterOp::Blur(1.0),
            ]
        );
        let turn = FilterChain::parse("hue-rotate(0.5turn)").unwrap();
        assert_eq!(turn.ops(), &[FilterOp::HueRotate(180.0)]);
    }

    #[test]
    fn drop_shadow_is_accepted_and_ignored() {
        let chain = FilterChain::parse("contrast(1.5) drop-shadow(0 0 1px #000)").unwrap();
        assert_eq!(chain.ops(), &[FilterOp::Contrast(1.5)]);
    }

    #[test]
    fn rejects_bad_expressions() {
        for expr in ["wobble(2)", "brightness(abc)", "brightness(-1)", "contrast(1.2", "hue-rotate(10)", "blur(2em)", "sepia"] {
            assert!(
                matches!(FilterChain::parse(expr), Err(EditorError::Filter(_))),
                "{expr} should fail"
            );
        }
    }

    #[test]
    fn brightness_scales_channels() {
        assert_eq!(run("brightness(0.5)", [200, 100, 50, 255]), [100, 50, 25, 255]);
        assert_eq!(run("brightness(50%)", [200, 100, 50, 255]), [100, 50, 25, 255]);
    }

    #[test]
    fn each_step_is_clamped() {
        // 200 * 2 saturates at 255 before halving.
        assert_eq!(run("brightness(2) brightness(0.5)", [200, 200, 200, 255])[0], 128);
    }

    #[test]
    fn contrast_zero_is_mid_gray() {
        assert_eq!(run("contrast(0)", [10, 240, 90, 255]), [128, 128, 128, 255]);
    }

    #[test]
    fn grayscale_and_invert() {
        assert_eq!(run("grayscale(1)", [255, 0, 0, 255]), [54, 54, 54, 255]);
        assert_eq!(run("invert(1)", [10, 20, 30, 200]), [245, 235, 225, 200]);
        assert_eq!(run("opacity(0.5)", [10, 20, 30, 255])[3], 128);
    }

    #[test]
    fn full_hue_turn_is_near_identity() {
        let out = run("hue-rotate(360deg)", [180, 90, 30, 255]);
        for (a, b) in out.iter().zip([180u8, 90, 30, 255]) {
            assert!((*a as i32 - b as i32).abs() <= 1);
        }
    }

    #[test]
    fn blur_keeps_flat_images_flat() {
        let out = FilterChain::parse("blur(2px)").unwrap().apply(&solid([40, 80, 120, 255]));
        assert!(out.pixels().all(|p| p.0 == [40, 80, 120, 255]));
    }

    #[test]
    fn huge_blur_radius_is_bounded_by_image() {
        let chain = FilterChain::parse("blur(100000000000000000000px)").unwrap();
        let flat = chain.apply(&solid([40, 80, 120, 255]));
        assert!(flat.pixels().all(|p| p.0 == [40, 80, 120, 255]));

        let split = RgbaImage::from_fn(4, 3, |x, _| if x < 2 { Rgba([0, 0, 0, 255]) } else { Rgba([200, 200, 200, 255]) });
        let out = chain.apply(&split);
        assert_eq!(out.dimensions(), (4, 3));
        assert!(out.pixels().all(|p| p.0[0] > 0 && p.0[0] < 200));
        assert_eq!(build_gaussian_kernel(1e20, 4).len(), 9);
    }

    #[test]
    fn intensity_zero_returns_base() {
        let chain = FilterChain::parse("invert(1)").unwrap();
        let src = solid([0, 0, 0, 255]);
        assert_eq!(apply_filter_blend_pixels(&src, &chain, 0.0), src);
        assert_eq!(apply_filter_blend_pixels(&src, &chain, -20.0), src);
    }

    #[test]
    fn half_intensity_blends_halfway() {
        let chain = FilterChain::parse("invert(1)").unwrap();
        let out = apply_filter_blend_pixels(&solid([0, 0, 0, 255]), &chain, 50.0);
        assert_eq!(out.get_pixel(0, 0).0, [128, 128, 128, 255]);
        let full = apply_filter_blend_pixels(&solid([0, 0, 0, 255]), &chain, 150.0);
        assert_eq!(full.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn encoded_blend_rejects_bad_filter() {
        let raster = RasterImage::from_rgba(&solid([1, 2, 3, 255])).unwrap();
        assert!(apply_filter_blend(&raster, "nope()", 100.0).is_err());
        let same = apply_filter_blend(&raster, "none", 100.0).unwrap();
        assert_eq!(same.to_rgba().unwrap(), solid([1, 2, 3, 255]));
    }

    #[test]
    fn adjustments_render_slider_expression() {
        let adj = ColorAdjustments::default();
        assert_eq!(
            adj.to_filter_expression(),
            "brightness(100%) contrast(100%) saturate(100%) hue-rotate(0deg)"
        );
        let tweaked = ColorAdjustments { brightness: 120.0, hue: -45.0, ..adj };
        let chain = FilterChain::parse(&tweaked.to_filter_expression()).unwrap();
        assert_eq!(chain.ops()[0], FilterOp::Brightness(1.2));
        assert_eq!(chain.ops()[3], FilterOp::HueRotate(-45.0));
    }
}
