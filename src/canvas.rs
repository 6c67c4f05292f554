// ============================================================================
// CANVAS SURFACE — the displayed image, its mask strokes, crop rect and view
// ============================================================================
//
// The surface owns everything tied to the *currently displayed* history entry:
// decoded pixels, the stroke mask, the crop rectangle and the pan/zoom view.
// Loading a new image resets all of it.
//
// Coordinate spaces:
//   screen  — pointer positions, relative to the container's top-left
//   image   — natural image pixels (strokes live here)
//   normal  — [0,1] fractions of the natural size (crop rect lives here)
//
// Pointer gestures are routed through a single `Gesture` state machine keyed
// by the active `Mode`; the middle button always pans.

use image::{Rgba, RgbaImage};

use crate::components::crop::{CropHandle, CropRect};
use crate::components::strokes::{MaskHistory, Point, Stroke, paint_strokes};
use crate::error::Result;
use crate::ops::transform::pad_pixels_to_size;
use crate::raster::RasterImage;
use crate::settings::EditorSettings;

/// Half the size of a crop handle's hit box, in screen pixels.
const HANDLE_HIT_RADIUS: f32 = 6.0;

/// Interaction mode, chosen by the active tool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Pan/zoom only.
    #[default]
    View,
    /// Freehand mask painting.
    Draw,
    /// Crop rectangle manipulation.
    Crop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
}

/// On-screen presentation only; never part of the edit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewTransform {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self { scale: 1.0, offset_x: 0.0, offset_y: 0.0 }
    }
}

impl ViewTransform {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Pan the view by a screen-space delta
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.offset_x += dx;
        self.offset_y += dy;
    }
}

/// Drag in progress.
#[derive(Clone, Copy, Debug)]
enum Gesture {
    Idle,
    /// `anchor` is pointer minus offset at press time.
    Panning { anchor_x: f32, anchor_y: f32 },
    Drawing,
    CropDrag { handle: CropHandle, start_x: f32, start_y: f32, start_rect: CropRect },
}

pub struct CanvasSurface {
    image: Option<RasterImage>,
    pixels: Option<RgbaImage>,
    mode: Mode,
    strokes: MaskHistory,
    crop: CropRect,
    view: ViewTransform,
    /// Container size in screen pixels; zero means "not laid out".
    viewport: (f32, f32),
    /// Brush diameter in screen pixels.
    brush_size: f32,
    zoom_step: f32,
    min_zoom: f32,
    max_zoom: f32,
    fit_fraction: f32,
    preview_color: Rgba<u8>,
    gesture: Gesture,
}

impl Default for CanvasSurface {
    fn default() -> Self {
        Self::new(&EditorSettings::default())
    }
}

impl CanvasSurface {
    pub fn new(settings: &EditorSettings) -> Self {
        Self {
            image: None,
            pixels: None,
            mode: Mode::View,
            strokes: MaskHistory::new(),
            crop: CropRect::DEFAULT,
            view: ViewTransform::default(),
            viewport: (0.0, 0.0),
            brush_size: settings.brush_size,
            zoom_step: settings.zoom_step,
            min_zoom: settings.min_zoom,
            max_zoom: settings.max_zoom,
            fit_fraction: settings.fit_fraction,
            preview_color: settings.mask_overlay_color(),
            gesture: Gesture::Idle,
        }
    }

    // ========================================================================
    // IMAGE
    // ========================================================================

    /// Replace the raster and reset view, mask and crop rect.
    pub fn load_image(&mut self, image: RasterImage) -> Result<()> {
        let pixels = image.to_rgba()?;
        self.image = Some(image);
        self.pixels = Some(pixels);
        self.reset_per_image_state();
        Ok(())
    }

    /// Drop the raster entirely.
    pub fn unload(&mut self) {
        self.image = None;
        self.pixels = None;
        self.reset_per_image_state();
    }

    fn reset_per_image_state(&mut self) {
        self.view.reset();
        self.strokes.clear();
        self.crop = CropRect::DEFAULT;
        self.gesture = Gesture::Idle;
    }

    pub fn has_image(&self) -> bool {
        self.pixels.is_some()
    }

    pub fn image(&self) -> Option<&RasterImage> {
        self.image.as_ref()
    }

    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }

    /// Natural size, `(0, 0)` when nothing is loaded.
    pub fn natural_size(&self) -> (u32, u32) {
        self.pixels.as_ref().map_or((0, 0), |p| p.dimensions())
    }

    // ========================================================================
    // MODE & SETTINGS
    // ========================================================================

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch interaction mode. Any drag in progress is abandoned.
    pub fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            self.cancel_gesture();
            self.mode = mode;
        }
    }

    pub fn brush_size(&self) -> f32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, screen_px: f32) {
        if screen_px.is_finite() && screen_px > 0.0 {
            self.brush_size = screen_px;
        }
    }

    pub fn set_preview_color(&mut self, color: Rgba<u8>) {
        self.preview_color = color;
    }

    // ========================================================================
    // LAYOUT & VIEW
    // ========================================================================

    pub fn set_viewport(&mut self, container_w: f32, container_h: f32) {
        self.viewport = (container_w.max(0.0), container_h.max(0.0));
    }

    pub fn view(&self) -> ViewTransform {
        self.view
    }

    /// On-screen size of the image: contain-fit into the container at
    /// `fit_fraction`, times the zoom. Without a viewport the image is shown
    /// at natural size times the zoom.
    pub fn rendered_size(&self) -> Option<(f32, f32)> {
        let (nw, nh) = self.natural_size();
        if nw == 0 || nh == 0 {
            return None;
        }
        let (nw, nh) = (nw as f32, nh as f32);
        let (cw, ch) = self.viewport;
        let (base_w, base_h) = if cw > 0.0 && ch > 0.0 {
            let img_aspect = nw / nh;
            if cw / ch > img_aspect {
                let h = ch * self.fit_fraction;
                (h * img_aspect, h)
            } else {
                let w = cw * self.fit_fraction;
                (w, w / img_aspect)
            }
        } else {
            (nw, nh)
        };
        Some((base_w * self.view.scale, base_h * self.view.scale))
    }

    /// Natural pixels per screen pixel.
    pub fn render_scale(&self) -> f32 {
        match self.rendered_size() {
            Some((rw, _)) if rw > 0.0 => self.natural_size().0 as f32 / rw,
            _ => 1.0,
        }
    }

    /// Screen position of the rendered image's top-left corner.
    pub fn image_origin(&self) -> (f32, f32) {
        let (cw, ch) = self.viewport;
        let (rw, rh) = self.rendered_size().unwrap_or((0.0, 0.0));
        if cw > 0.0 && ch > 0.0 {
            ((cw - rw) / 2.0 + self.view.offset_x, (ch - rh) / 2.0 + self.view.offset_y)
        } else {
            (self.view.offset_x, self.view.offset_y)
        }
    }

    pub fn screen_to_image(&self, x: f32, y: f32) -> Point {
        let (ox, oy) = self.image_origin();
        let s = self.render_scale();
        Point::new((x - ox) * s, (y - oy) * s)
    }

    pub fn set_scale(&mut self, scale: f32) {
        if scale.is_finite() {
            self.view.scale = scale.clamp(self.min_zoom, self.max_zoom);
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_scale(self.view.scale + self.zoom_step);
    }

    pub fn zoom_out(&mut self) {
        self.set_scale(self.view.scale - self.zoom_step);
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.view.pan_by(dx, dy);
    }

    /// Mouse wheel. Draw mode keeps the plain wheel for itself; holding a
    /// modifier zooms anyway. Returns whether the zoom changed.
    pub fn wheel(&mut self, delta_y: f32, modifier: bool) -> bool {
        if self.mode == Mode::Draw && !modifier {
            return false;
        }
        let before = self.view.scale;
        if delta_y > 0.0 {
            self.zoom_out();
        } else {
            self.zoom_in();
        }
        self.view.scale != before
    }

    // ========================================================================
    // POINTER ROUTING
    // ========================================================================

    pub fn pointer_down(&mut self, button: PointerButton, x: f32, y: f32) {
        if !self.has_image() {
            return;
        }
        match (button, self.mode) {
            (PointerButton::Middle, _) | (PointerButton::Primary, Mode::View) => {
                self.gesture = Gesture::Panning {
                    anchor_x: x - self.view.offset_x,
                    anchor_y: y - self.view.offset_y,
                };
            }
            (PointerButton::Primary, Mode::Draw) => self.begin_stroke(x, y),
            (PointerButton::Primary, Mode::Crop) => {
                if let Some(handle) = self.hit_test_crop(x, y) {
                    self.gesture = Gesture::CropDrag {
                        handle,
                        start_x: x,
                        start_y: y,
                        start_rect: self.crop,
                    };
                }
            }
            (PointerButton::Secondary, _) => {}
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        match self.gesture {
            Gesture::Idle => {}
            Gesture::Panning { anchor_x, anchor_y } => {
                self.view.offset_x = x - anchor_x;
                self.view.offset_y = y - anchor_y;
            }
            Gesture::Drawing => self.extend_stroke(x, y),
            Gesture::CropDrag { handle, start_x, start_y, start_rect } => {
                let Some((rw, rh)) = self.rendered_size() else { return };
                let dx = (x - start_x) / rw;
                let dy = (y - start_y) / rh;
                self.crop = start_rect.dragged(handle, dx as f64, dy as f64);
            }
        }
    }

    pub fn pointer_up(&mut self) {
        if let Gesture::Drawing = self.gesture {
            self.end_stroke();
        }
        self.gesture = Gesture::Idle;
    }

    /// Pointer left the surface: same as releasing.
    pub fn pointer_leave(&mut self) {
        self.pointer_up();
    }

    fn cancel_gesture(&mut self) {
        self.pointer_up();
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.gesture, Gesture::Panning { .. })
    }

    // ========================================================================
    // STROKES
    // ========================================================================

    /// Start a stroke at a screen position. Draw mode only.
    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        if self.mode != Mode::Draw || !self.has_image() {
            return;
        }
        let p = self.screen_to_image(x, y);
        let size = self.brush_size * self.render_scale();
        self.strokes.begin_stroke(p, size);
        self.gesture = Gesture::Drawing;
    }

    pub fn extend_stroke(&mut self, x: f32, y: f32) {
        if self.mode != Mode::Draw || !self.strokes.is_drawing() {
            return;
        }
        let p = self.screen_to_image(x, y);
        self.strokes.extend_stroke(p);
    }

    pub fn end_stroke(&mut self) {
        self.strokes.end_stroke();
        if let Gesture::Drawing = self.gesture {
            self.gesture = Gesture::Idle;
        }
    }

    pub fn undo_stroke(&mut self) {
        self.strokes.undo();
    }

    pub fn redo_stroke(&mut self) {
        self.strokes.redo();
    }

    pub fn can_undo_stroke(&self) -> bool {
        self.strokes.can_undo()
    }

    pub fn can_redo_stroke(&self) -> bool {
        self.strokes.can_redo()
    }

    pub fn clear_mask(&mut self) {
        self.strokes.clear();
        if let Gesture::Drawing = self.gesture {
            self.gesture = Gesture::Idle;
        }
    }

    pub fn mask(&self) -> &MaskHistory {
        &self.strokes
    }

    // ========================================================================
    // CROP
    // ========================================================================

    pub fn crop_rect(&self) -> CropRect {
        self.crop
    }

    pub fn set_crop_rect(&mut self, rect: CropRect) {
        self.crop = rect.clamped();
    }

    /// Centre a preset-ratio rect, or restore the free default with `None`.
    pub fn set_crop_ratio(&mut self, ratio: Option<f64>) {
        let (nw, nh) = self.natural_size();
        self.crop = CropRect::for_ratio(ratio, nw, nh);
    }

    /// Drag `handle` by a normalized delta from the current rect.
    pub fn resize_crop_handle(&mut self, handle: CropHandle, dx: f64, dy: f64) {
        if self.mode != Mode::Crop {
            return;
        }
        self.crop = self.crop.dragged(handle, dx, dy);
    }

    /// Which crop handle (if any) sits under a screen position. Corner and
    /// edge handles win over the interior.
    pub fn hit_test_crop(&self, x: f32, y: f32) -> Option<CropHandle> {
        let (rw, rh) = self.rendered_size()?;
        let (ox, oy) = self.image_origin();
        let left = ox + self.crop.x as f32 * rw;
        let top = oy + self.crop.y as f32 * rh;
        let right = left + self.crop.width as f32 * rw;
        let bottom = top + self.crop.height as f32 * rh;
        let (mid_x, mid_y) = ((left + right) / 2.0, (top + bottom) / 2.0);

        let near = |hx: f32, hy: f32| (x - hx).abs() <= HANDLE_HIT_RADIUS && (y - hy).abs() <= HANDLE_HIT_RADIUS;
        let handles = [
            (CropHandle::NorthWest, left, top),
            (CropHandle::North, mid_x, top),
            (CropHandle::NorthEast, right, top),
            (CropHandle::West, left, mid_y),
            (CropHandle::East, right, mid_y),
            (CropHandle::SouthWest, left, bottom),
            (CropHandle::South, mid_x, bottom),
            (CropHandle::SouthEast, right, bottom),
        ];
        if let Some((h, _, _)) = handles.iter().find(|(_, hx, hy)| near(*hx, *hy)) {
            return Some(*h);
        }
        (x >= left && x <= right && y >= top && y <= bottom).then_some(CropHandle::Move)
    }

    /// Tooltip text: crop size in natural pixels.
    pub fn crop_preview_label(&self) -> Option<String> {
        if !self.has_image() {
            return None;
        }
        let (nw, nh) = self.natural_size();
        let (w, h) = self.crop.preview_size(nw, nh);
        Some(format!("{} x {} px", w, h))
    }

    // ========================================================================
    // OUTPUT
    // ========================================================================

    /// Base image with every active stroke flattened on top in `color`.
    /// `None` when no image is loaded.
    pub fn composite(&self, color: Rgba<u8>) -> Result<Option<RasterImage>> {
        let Some(base) = self.pixels.as_ref() else { return Ok(None) };
        let mut out = base.clone();
        paint_strokes(&mut out, self.strokes.active(), color);
        RasterImage::from_rgba(&out).map(Some)
    }

    /// Current image centred on a `target_w × target_h` canvas of `bg`.
    pub fn padded_image(&self, target_w: u32, target_h: u32, bg: Rgba<u8>) -> Result<Option<RasterImage>> {
        let Some(base) = self.pixels.as_ref() else { return Ok(None) };
        RasterImage::from_rgba(&pad_pixels_to_size(base, target_w, target_h, bg)).map(Some)
    }

    /// Transparent natural-size layer holding the visible strokes (committed
    /// ones plus the one being drawn) in the preview colour.
    pub fn render_mask_overlay(&self) -> Option<RgbaImage> {
        let (nw, nh) = self.natural_size();
        if nw == 0 || nh == 0 {
            return None;
        }
        let mut layer = RgbaImage::new(nw, nh);
        let live: Option<&Stroke> = self.strokes.in_progress();
        paint_strokes(&mut layer, self.strokes.active().iter().chain(live), self.preview_color);
        Some(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_with(w: u32, h: u32) -> CanvasSurface {
        let mut c = CanvasSurface::default();
        let img = RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255]));
        c.load_image(RasterImage::from_rgba(&img).unwrap()).unwrap();
        c
    }

    #[test]
    fn loading_resets_per_image_state() {
        let mut c = surface_with(100, 100);
        c.set_mode(Mode::Draw);
        c.begin_stroke(10.0, 10.0);
        c.end_stroke();
        c.set_crop_rect(CropRect::new(0.0, 0.0, 0.5, 0.5));
        c.pan_by(20.0, 5.0);
        c.zoom_in();

        let img = RgbaImage::new(50, 40);
        c.load_image(RasterImage::from_rgba(&img).unwrap()).unwrap();
        assert_eq!(c.view(), ViewTransform::default());
        assert!(c.mask().is_empty());
        assert_eq!(c.crop_rect(), CropRect::DEFAULT);
        assert_eq!(c.natural_size(), (50, 40));
    }

    #[test]
    fn pointer_maps_into_natural_pixels() {
        let mut c = surface_with(1000, 500);
        // 500x500 container: image fits to 450 px wide, 225 tall, centred.
        c.set_viewport(500.0, 500.0);
        let (rw, rh) = c.rendered_size().unwrap();
        assert!((rw - 450.0).abs() < 1e-3 && (rh - 225.0).abs() < 1e-3);
        let (ox, oy) = c.image_origin();
        assert!((ox - 25.0).abs() < 1e-3 && (oy - 137.5).abs() < 1e-3);
        let p = c.screen_to_image(ox + 45.0, oy + 22.5);
        assert!((p.x - 100.0).abs() < 1e-2 && (p.y - 50.0).abs() < 1e-2);
    }

    #[test]
    fn stroke_size_scales_with_render_scale() {
        let mut c = surface_with(1000, 1000);
        c.set_viewport(500.0, 500.0); // rendered 450 px
        c.set_mode(Mode::Draw);
        c.set_brush_size(30.0);
        c.pointer_down(PointerButton::Primary, 100.0, 100.0);
        c.pointer_move(120.0, 100.0);
        c.pointer_up();
        let stroke = &c.mask().active()[0];
        assert!((stroke.size() - 30.0 * 1000.0 / 450.0).abs() < 1e-2);
        assert_eq!(stroke.points().len(), 2);
    }

    #[test]
    fn strokes_require_draw_mode() {
        let mut c = surface_with(20, 20);
        c.begin_stroke(1.0, 1.0);
        c.end_stroke();
        assert!(c.mask().is_empty());
    }

    #[test]
    fn operations_without_image_are_no_ops() {
        let mut c = CanvasSurface::default();
        c.set_mode(Mode::Draw);
        c.pointer_down(PointerButton::Primary, 1.0, 1.0);
        c.pointer_up();
        assert!(c.mask().is_empty());
        assert!(c.composite(Rgba([255, 0, 0, 255])).unwrap().is_none());
        assert!(c.padded_image(10, 10, Rgba([0, 0, 0, 255])).unwrap().is_none());
        assert!(c.render_mask_overlay().is_none());
        assert!(c.crop_preview_label().is_none());
    }

    #[test]
    fn wheel_is_reserved_in_draw_mode() {
        let mut c = surface_with(10, 10);
        assert!(c.wheel(-1.0, false));
        assert!((c.view().scale - 1.1).abs() < 1e-6);
        c.set_mode(Mode::Draw);
        assert!(!c.wheel(-1.0, false));
        assert!(c.wheel(1.0, true));
        assert!((c.view().scale - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut c = surface_with(10, 10);
        for _ in 0..100 {
            c.zoom_in();
        }
        assert_eq!(c.view().scale, 5.0);
        for _ in 0..100 {
            c.zoom_out();
        }
        assert!((c.view().scale - 0.1).abs() < 1e-6);
    }

    #[test]
    fn primary_drag_pans_only_in_view_mode() {
        let mut c = surface_with(10, 10);
        c.pointer_down(PointerButton::Primary, 5.0, 5.0);
        c.pointer_move(15.0, 8.0);
        c.pointer_up();
        assert_eq!((c.view().offset_x, c.view().offset_y), (10.0, 3.0));

        c.set_mode(Mode::Draw);
        c.pointer_down(PointerButton::Middle, 0.0, 0.0);
        c.pointer_move(5.0, 5.0);
        c.pointer_up();
        assert_eq!((c.view().offset_x, c.view().offset_y), (15.0, 8.0));
        assert!(c.mask().is_empty());
    }

    #[test]
    fn crop_drag_moves_rect_and_leaves_view_alone() {
        let mut c = surface_with(100, 100);
        c.set_mode(Mode::Crop);
        // No viewport: image at natural size, origin (0,0). Rect spans 10..90.
        assert_eq!(c.hit_test_crop(50.0, 50.0), Some(CropHandle::Move));
        assert_eq!(c.hit_test_crop(90.0, 90.0), Some(CropHandle::SouthEast));
        assert_eq!(c.hit_test_crop(2.0, 2.0), None);

        c.pointer_down(PointerButton::Primary, 50.0, 50.0);
        c.pointer_move(60.0, 40.0);
        c.pointer_up();
        let r = c.crop_rect();
        assert!((r.x - 0.2).abs() < 1e-6 && (r.y - 0.0).abs() < 1e-6);
        assert_eq!(c.view(), ViewTransform::default());

        c.zoom_in();
        assert_eq!(c.crop_rect(), r);
    }

    #[test]
    fn crop_ratio_and_label() {
        let mut c = surface_with(1000, 1000);
        c.set_crop_ratio(Some(16.0 / 9.0));
        assert_eq!(c.crop_preview_label().as_deref(), Some("800 x 450 px"));
        c.set_crop_ratio(None);
        assert_eq!(c.crop_rect(), CropRect::DEFAULT);
    }

    #[test]
    fn composite_flattens_active_strokes_only() {
        let mut c = surface_with(40, 40);
        c.set_mode(Mode::Draw);
        c.begin_stroke(20.0, 20.0);
        c.extend_stroke(21.0, 20.0);
        c.end_stroke();
        let red = Rgba([255, 0, 0, 255]);

        let out = c.composite(red).unwrap().unwrap().to_rgba().unwrap();
        assert_eq!(out.dimensions(), (40, 40));
        assert_eq!(out.get_pixel(20, 20).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 30, 255]);

        c.undo_stroke();
        let out = c.composite(red).unwrap().unwrap().to_rgba().unwrap();
        assert_eq!(out.get_pixel(20, 20).0, [10, 20, 30, 255]);
    }

    #[test]
    fn overlay_shows_stroke_in_progress() {
        let mut c = surface_with(40, 40);
        c.set_mode(Mode::Draw);
        c.pointer_down(PointerButton::Primary, 20.0, 20.0);
        let overlay = c.render_mask_overlay().unwrap();
        assert_eq!(overlay.get_pixel(20, 20).0, [255, 0, 0, 153]);
        assert_eq!(overlay.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn padded_image_centres_on_background() {
        let c = surface_with(2, 2);
        let out = c.padded_image(4, 4, Rgba([0, 0, 0, 255])).unwrap().unwrap().to_rgba().unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 1).0, [10, 20, 30, 255]);
    }
}
