// ============================================================================
// CROP RECTANGLE — normalized crop geometry and handle dragging
// ============================================================================
//
// All coordinates are fractions of the natural image size, so the rectangle
// survives zoom, pan and container resizes untouched. Only explicit handle
// drags and ratio presets move it.

/// Smallest allowed crop side, as a fraction of the image side.
pub const MIN_CROP_SIZE: f64 = 0.05;

/// Normalized rectangle `{x, y, width, height}` in image-space fractions.
///
/// Also used as the "inset rect" describing where an original image sits
/// inside a padded canvas (those may be thinner than [`MIN_CROP_SIZE`]).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for CropRect {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CropRect {
    /// Rectangle shown when crop mode is entered.
    pub const DEFAULT: CropRect = CropRect { x: 0.1, y: 0.1, width: 0.8, height: 0.8 };

    /// The whole image.
    pub const FULL: CropRect = CropRect { x: 0.0, y: 0.0, width: 1.0, height: 1.0 };

    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Whether the rectangle satisfies every crop invariant.
    pub fn is_valid(&self) -> bool {
        const EPS: f64 = 1e-9;
        self.x >= -EPS
            && self.y >= -EPS
            && self.right() <= 1.0 + EPS
            && self.bottom() <= 1.0 + EPS
            && self.width >= MIN_CROP_SIZE - EPS
            && self.height >= MIN_CROP_SIZE - EPS
    }

    /// Force the rectangle inside [0,1] with at least the minimum size.
    /// Size is settled first, then position, so the result is always valid.
    pub fn clamped(self) -> CropRect {
        let width = sanitize(self.width, MIN_CROP_SIZE).clamp(MIN_CROP_SIZE, 1.0);
        let height = sanitize(self.height, MIN_CROP_SIZE).clamp(MIN_CROP_SIZE, 1.0);
        let x = sanitize(self.x, 0.0).clamp(0.0, 1.0 - width);
        let y = sanitize(self.y, 0.0).clamp(0.0, 1.0 - height);
        CropRect { x, y, width, height }
    }

    /// Result of dragging `handle` by `(dx, dy)` (normalized units) starting
    /// from `self`. Edges not owned by the handle stay put; a `Move` drag
    /// translates without resizing and stops at the image border.
    pub fn dragged(&self, handle: CropHandle, dx: f64, dy: f64) -> CropRect {
        let dx = sanitize(dx, 0.0);
        let dy = sanitize(dy, 0.0);
        let start = self.clamped();

        if handle == CropHandle::Move {
            return CropRect {
                x: (start.x + dx).clamp(0.0, 1.0 - start.width),
                y: (start.y + dy).clamp(0.0, 1.0 - start.height),
                ..start
            };
        }

        let (mut left, mut top) = (start.x, start.y);
        let (mut right, mut bottom) = (start.right(), start.bottom());

        if handle.moves_west() {
            left = (left + dx).clamp(0.0, right - MIN_CROP_SIZE);
        }
        if handle.moves_east() {
            right = (right + dx).clamp(left + MIN_CROP_SIZE, 1.0);
        }
        if handle.moves_north() {
            top = (top + dy).clamp(0.0, bottom - MIN_CROP_SIZE);
        }
        if handle.moves_south() {
            bottom = (bottom + dy).clamp(top + MIN_CROP_SIZE, 1.0);
        }

        CropRect {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        }
    }

    /// Centred preset rectangle of `ratio` (width / height, in pixels) for an
    /// image of `natural_w × natural_h`. The constrained side spans 80%.
    /// `None` restores the free [`CropRect::DEFAULT`].
    pub fn for_ratio(ratio: Option<f64>, natural_w: u32, natural_h: u32) -> CropRect {
        let Some(ratio) = ratio.filter(|r| r.is_finite() && *r > 0.0) else {
            return CropRect::DEFAULT;
        };
        if natural_w == 0 || natural_h == 0 {
            return CropRect::DEFAULT;
        }
        let img_ratio = natural_w as f64 / natural_h as f64;
        let (w, h) = if img_ratio > ratio {
            (0.8 * ratio / img_ratio, 0.8)
        } else {
            (0.8, 0.8 * img_ratio / ratio)
        };
        CropRect {
            x: (1.0 - w) / 2.0,
            y: (1.0 - h) / 2.0,
            width: w,
            height: h,
        }
        .clamped()
    }

    /// Integer pixel bounds `(x, y, w, h)` using floor rounding, or `None`
    /// when the rectangle rounds to zero area.
    pub fn pixel_bounds(&self, natural_w: u32, natural_h: u32) -> Option<(u32, u32, u32, u32)> {
        let px = (self.x * natural_w as f64).floor().max(0.0) as u32;
        let py = (self.y * natural_h as f64).floor().max(0.0) as u32;
        let pw = (self.width * natural_w as f64).floor().max(0.0) as u32;
        let ph = (self.height * natural_h as f64).floor().max(0.0) as u32;
        if pw == 0 || ph == 0 {
            return None;
        }
        Some((px, py, pw, ph))
    }

    /// Pixel size shown in the crop tooltip (rounded, not floored).
    pub fn preview_size(&self, natural_w: u32, natural_h: u32) -> (u32, u32) {
        (
            (self.width * natural_w as f64).round().max(0.0) as u32,
            (self.height * natural_h as f64).round().max(0.0) as u32,
        )
    }
}

fn sanitize(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v } else { fallback }
}

/// Grab point on the crop overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CropHandle {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
    /// Drag from inside the rectangle.
    Move,
}

impl CropHandle {
    pub fn all() -> &'static [CropHandle] {
        &[
            CropHandle::NorthWest,
            CropHandle::North,
            CropHandle::NorthEast,
            CropHandle::West,
            CropHandle::East,
            CropHandle::SouthWest,
            CropHandle::South,
            CropHandle::SouthEast,
            CropHandle::Move,
        ]
    }

    /// Parse the overlay's handle ids (`"nw"`, `"e"`, `"center"` …).
    pub fn parse(id: &str) -> Option<CropHandle> {
        Some(match id.trim().to_ascii_lowercase().as_str() {
            "n" => CropHandle::North,
            "s" => CropHandle::South,
            "e" => CropHandle::East,
            "w" => CropHandle::West,
            "ne" => CropHandle::NorthEast,
            "nw" => CropHandle::NorthWest,
            "se" => CropHandle::SouthEast,
            "sw" => CropHandle::SouthWest,
            "center" | "move" => CropHandle::Move,
            _ => return None,
        })
    }

    fn moves_west(self) -> bool {
        matches!(self, CropHandle::West | CropHandle::NorthWest | CropHandle::SouthWest)
    }

    fn moves_east(self) -> bool {
        matches!(self, CropHandle::East | CropHandle::NorthEast | CropHandle::SouthEast)
    }

    fn moves_north(self) -> bool {
        matches!(self, CropHandle::North | CropHandle::NorthEast | CropHandle::NorthWest)
    }

    fn moves_south(self) -> bool {
        matches!(self, CropHandle::South | CropHandle::SouthEast | CropHandle::SouthWest)
    }
}
