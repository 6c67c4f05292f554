// ============================================================================
// MASK STROKES — freehand brush strokes, their undo cursor, rasterization
// ============================================================================
//
// Strokes live in natural image pixel space. Each stroke is rendered like a
// single round-capped, round-joined path: overlapping segments of one stroke
// never double up their alpha, separate strokes do.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// A point in natural image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One continuous brush gesture.
#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    points: Vec<Point>,
    /// Brush diameter in natural pixels.
    size: f32,
}

impl Stroke {
    pub fn new(start: Point, size: f32) -> Self {
        Self {
            points: vec![start],
            size: size.max(0.0),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn size(&self) -> f32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn push(&mut self, p: Point) {
        self.points.push(p);
    }

    /// Integer pixel bounds `(x0, y0, x1, y1)` (exclusive end) touched by the
    /// stroke inside a `w × h` image, or `None` if it lies fully outside.
    fn pixel_bounds(&self, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
        let pad = self.size / 2.0 + 1.0;
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for p in &self.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let x0 = (min_x - pad).floor().max(0.0);
        let y0 = (min_y - pad).floor().max(0.0);
        let x1 = (max_x + pad).ceil().min(w as f32);
        let y1 = (max_y + pad).ceil().min(h as f32);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }

    /// Anti-aliased coverage (0..1) of the pixel centred at `(px, py)`.
    fn coverage(&self, px: f32, py: f32) -> f32 {
        let radius = self.size / 2.0;
        let mut best = f32::MAX;
        match self.points.as_slice() {
            [] => return 0.0,
            [only] => best = dist(px, py, only.x, only.y),
            pts => {
                for seg in pts.windows(2) {
                    best = best.min(dist_to_segment(px, py, seg[0], seg[1]));
                }
            }
        }
        (radius + 0.5 - best).clamp(0.0, 1.0)
    }
}

fn dist(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

fn dist_to_segment(px: f32, py: f32, a: Point, b: Point) -> f32 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len2 = dx * dx + dy * dy;
    if len2 < 1e-12 {
        return dist(px, py, a.x, a.y);
    }
    let t = (((px - a.x) * dx + (py - a.y) * dy) / len2).clamp(0.0, 1.0);
    dist(px, py, a.x + t * dx, a.y + t * dy)
}

// ============================================================================
// MASK HISTORY
// ============================================================================

/// Committed strokes plus an undo cursor.
///
/// `cursor` counts the active strokes: strokes `[0, cursor)` are rendered,
/// the rest are redo candidates. Starting a new stroke drops the redo tail.
#[derive(Clone, Debug, Default)]
pub struct MaskHistory {
    strokes: Vec<Stroke>,
    cursor: usize,
    drawing: Option<Stroke>,
}

impl MaskHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a stroke at `start`. Discards strokes after the cursor.
    pub fn begin_stroke(&mut self, start: Point, size: f32) {
        self.strokes.truncate(self.cursor);
        self.drawing = Some(Stroke::new(start, size));
    }

    pub fn extend_stroke(&mut self, p: Point) {
        if let Some(stroke) = self.drawing.as_mut() {
            stroke.push(p);
        }
    }

    /// Commit the stroke in progress. Returns whether anything was committed.
    pub fn end_stroke(&mut self) -> bool {
        match self.drawing.take() {
            Some(stroke) if !stroke.is_empty() => {
                self.strokes.push(stroke);
                self.cursor = self.strokes.len();
                true
            }
            _ => {
                log::debug!("empty stroke ignored");
                false
            }
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.drawing.is_some()
    }

    /// The stroke currently being drawn, if any.
    pub fn in_progress(&self) -> Option<&Stroke> {
        self.drawing.as_ref()
    }

    pub fn undo(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn redo(&mut self) {
        self.cursor = (self.cursor + 1).min(self.strokes.len());
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.strokes.len()
    }

    /// Drop every stroke (cursor back to "nothing drawn").
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.cursor = 0;
        self.drawing = None;
    }

    /// Strokes at or before the cursor.
    pub fn active(&self) -> &[Stroke] {
        &self.strokes[..self.cursor]
    }

    /// All committed strokes, including the redo tail.
    pub fn all(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Index of the last active stroke, `-1` when none is active.
    pub fn step(&self) -> isize {
        self.cursor as isize - 1
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

// ============================================================================
// RASTERIZATION
// ============================================================================

/// Paint `strokes` onto `target` in `color` (straight alpha), source-over.
pub fn paint_strokes<'a>(target: &mut RgbaImage, strokes: impl IntoIterator<Item = &'a Stroke>, color: Rgba<u8>) {
    for stroke in strokes {
        paint_stroke(target, stroke, color);
    }
}

fn paint_stroke(target: &mut RgbaImage, stroke: &Stroke, color: Rgba<u8>) {
    let (w, h) = target.dimensions();
    let Some((x0, y0, x1, y1)) = stroke.pixel_bounds(w, h) else {
        return;
    };
    let stride = w as usize * 4;
    let alpha = color[3] as f32 / 255.0;
    let raw: &mut [u8] = target;

    raw.par_chunks_mut(stride)
        .enumerate()
        .skip(y0 as usize)
        .take((y1 - y0) as usize)
        .for_each(|(y, row)| {
            let cy = y as f32 + 0.5;
            for x in x0..x1 {
                let cov = stroke.coverage(x as f32 + 0.5, cy);
                if cov <= 0.0 {
                    continue;
                }
                let i = x as usize * 4;
                source_over(&mut row[i..i + 4], [color[0], color[1], color[2]], alpha * cov);
            }
        });
}

/// Straight-alpha source-over of one colour with alpha `a_s` onto `dst`.
fn source_over(dst: &mut [u8], src: [u8; 3], a_s: f32) {
    let a_b = dst[3] as f32 / 255.0;
    let a_o = a_s + a_b * (1.0 - a_s);
    if a_o <= 0.0 {
        return;
    }
    for c in 0..3 {
        let v = (src[c] as f32 * a_s + dst[c] as f32 * a_b * (1.0 - a_s)) / a_o;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (a_o * 255.0).round().clamp(0.0, 255.0) as u8;
}
