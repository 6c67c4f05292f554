// ============================================================================
// EDIT SESSION — one open image: history, library, canvas, tool dispatch
// ============================================================================
//
// The session is the only owner of the canvas surface and the edit history;
// outer code drives both through it. `apply` is the tool orchestrator: it
// builds the request for a tool from the current state, awaits the generator
// and commits the result, or leaves everything untouched on failure.
//
// Single-flight: a `BusyFlag` is held for the whole of `apply`. Clones of the
// flag can be handed to a UI to grey out tool buttons.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use image::Rgba;
use uuid::Uuid;

use crate::canvas::{CanvasSurface, Mode};
use crate::components::crop::CropRect;
use crate::components::history::EditHistory;
use crate::components::library::AssetLibrary;
use crate::error::{EditorError, Result};
use crate::ops::ai::{
    self, Analysis, GenerationRequest, ImageAnalyzer, ImageGenerator, ModelHint,
};
use crate::ops::aspect::AspectRatio;
use crate::ops::filters::{ColorAdjustments, apply_filter_blend};
use crate::ops::luts::find_preset;
use crate::ops::mask::apply_luminance_mask;
use crate::ops::palette::ImageInfo;
use crate::ops::transform::{self, PAD_FILL};
use crate::raster::RasterImage;
use crate::settings::EditorSettings;

// ============================================================================
// BUSY FLAG
// ============================================================================

/// Shared "an operation is outstanding" flag.
#[derive(Clone, Debug, Default)]
pub struct BusyFlag(Arc<AtomicBool>);

/// Releases the flag when dropped.
#[derive(Debug)]
pub struct BusyGuard(Arc<AtomicBool>);

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `None` if someone else holds the flag.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard(Arc::clone(&self.0)))
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

// ============================================================================
// TOOLS
// ============================================================================

/// Tool panel selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum EditorTool {
    #[default]
    None,
    Crop,
    Upscale,
    Cleanup,
    /// `manual` paints the subject; otherwise it is described in text.
    Cutout { manual: bool },
    Inpaint,
    Outpaint,
    Color,
}

impl EditorTool {
    /// Canvas interaction mode the tool needs.
    pub fn canvas_mode(self) -> Mode {
        match self {
            EditorTool::Cleanup | EditorTool::Inpaint | EditorTool::Cutout { manual: true } => Mode::Draw,
            EditorTool::Crop => Mode::Crop,
            _ => Mode::View,
        }
    }
}

/// One tool invocation with its parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolRequest {
    Upscale,
    /// Remove the painted region.
    Cleanup,
    /// Replace the painted region with `prompt`.
    Inpaint { prompt: String, strict: bool },
    /// Expand to `width × height`, filling the border.
    Outpaint { width: u32, height: u32, prompt: String, keep_background: bool },
    /// Transparent cutout of the painted or described subject.
    Cutout { manual: bool, description: Option<String> },
    /// Crop to the canvas crop rectangle.
    Crop,
    /// Colour grade with a filter expression at `intensity` percent.
    Filter { expression: String, intensity: f32 },
}

impl ToolRequest {
    /// Colour-panel sliders at full strength.
    pub fn adjust(adjustments: ColorAdjustments) -> Self {
        ToolRequest::Filter {
            expression: adjustments.clamped().to_filter_expression(),
            intensity: 100.0,
        }
    }

    /// Built-in look by id.
    pub fn preset(id: &str, intensity: f32) -> Option<Self> {
        find_preset(id).map(|p| ToolRequest::Filter {
            expression: p.filter.to_string(),
            intensity,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ToolRequest::Upscale => "upscale",
            ToolRequest::Cleanup => "cleanup",
            ToolRequest::Inpaint { .. } => "inpaint",
            ToolRequest::Outpaint { .. } => "outpaint",
            ToolRequest::Cutout { manual: true, .. } => "cutout (manual)",
            ToolRequest::Cutout { manual: false, .. } => "cutout (auto)",
            ToolRequest::Crop => "crop",
            ToolRequest::Filter { .. } => "filter",
        }
    }
}

/// What a generative tool sends and how its answer becomes the new image.
struct Plan {
    input: RasterImage,
    instruction: String,
    aspect_ratio: AspectRatio,
    model_hint: ModelHint,
    finish: Finish,
}

enum Finish {
    /// The generated image is the result.
    AsIs,
    /// The generated image is a silhouette mask for `original`, which sits at
    /// `inset` inside the request image.
    LuminanceMask { original: RasterImage, inset: CropRect },
}

// ============================================================================
// SESSION
// ============================================================================

pub struct EditSession {
    history: EditHistory,
    library: AssetLibrary,
    canvas: CanvasSurface,
    settings: EditorSettings,
    busy: BusyFlag,
    tool: EditorTool,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new(EditorSettings::default())
    }
}

impl EditSession {
    pub fn new(settings: EditorSettings) -> Self {
        Self {
            history: EditHistory::new(),
            library: AssetLibrary::new(),
            canvas: CanvasSurface::new(&settings),
            settings,
            busy: BusyFlag::new(),
            tool: EditorTool::None,
        }
    }

    // -- Accessors -----------------------------------------------------

    pub fn history(&self) -> &EditHistory {
        &self.history
    }

    pub fn library(&self) -> &AssetLibrary {
        &self.library
    }

    pub fn canvas(&self) -> &CanvasSurface {
        &self.canvas
    }

    /// For pointer, wheel and crop input.
    pub fn canvas_mut(&mut self) -> &mut CanvasSurface {
        &mut self.canvas
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn busy_flag(&self) -> BusyFlag {
        self.busy.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn active_tool(&self) -> EditorTool {
        self.tool
    }

    pub fn current_image(&self) -> Option<&RasterImage> {
        self.history.current()
    }

    /// Comparison view: the entry before the cursor, or the current one
    /// when showing the original.
    pub fn previous_image(&self) -> Option<&RasterImage> {
        self.history.previous()
    }

    pub fn original_image(&self) -> Option<&RasterImage> {
        self.history.original()
    }

    // -- Opening ---------------------------------------------------------

    /// Start over from `image`: history becomes `[image]`.
    pub fn open(&mut self, image: RasterImage) -> Result<()> {
        self.canvas.load_image(image.clone())?;
        log::info!("opened {}x{} {} image", image.width(), image.height(), image.format().label());
        self.history.open(image);
        self.select_tool(EditorTool::None);
        Ok(())
    }

    /// Open a saved library entry as a fresh original.
    pub fn open_from_library(&mut self, id: Uuid) -> Result<bool> {
        let Some(image) = self.library.get(id).map(|e| e.image.clone()) else {
            return Ok(false);
        };
        self.open(image)?;
        Ok(true)
    }

    // -- History navigation ----------------------------------------------

    pub fn undo(&mut self) -> Result<bool> {
        if self.history.undo() {
            self.reload_canvas()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn redo(&mut self) -> Result<bool> {
        if self.history.redo() {
            self.reload_canvas()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn select_history(&mut self, index: usize) -> Result<bool> {
        if self.history.select(index) {
            self.reload_canvas()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Delete history entry `index`; the original cannot be deleted.
    pub fn delete_history(&mut self, index: usize) -> Result<bool> {
        let shown = self.history.index();
        if !self.history.delete_at(index) {
            return Ok(false);
        }
        if shown == Some(index) {
            self.reload_canvas()?;
        }
        Ok(true)
    }

    pub fn reset_to_original(&mut self) -> Result<()> {
        if self.history.is_empty() {
            return Ok(());
        }
        self.history.reset();
        self.reload_canvas()
    }

    fn reload_canvas(&mut self) -> Result<()> {
        match self.history.current() {
            Some(image) => self.canvas.load_image(image.clone()),
            None => {
                self.canvas.unload();
                Ok(())
            }
        }
    }

    // -- Tools -----------------------------------------------------------

    /// Switch tool: sets the canvas mode and drops any painted mask.
    pub fn select_tool(&mut self, tool: EditorTool) {
        self.tool = tool;
        self.canvas.set_mode(tool.canvas_mode());
        self.canvas.clear_mask();
        let color = match tool {
            EditorTool::Cutout { manual: true } => self.settings.cutout_overlay_color(),
            _ => self.settings.mask_overlay_color(),
        };
        self.canvas.set_preview_color(color);
    }

    /// Run one tool against the displayed image.
    ///
    /// On success the result is committed to history, the canvas reloads it
    /// and the mask is cleared. On any failure history, canvas and mask are
    /// left exactly as they were.
    pub async fn apply<G: ImageGenerator>(&mut self, generator: &G, request: ToolRequest) -> Result<()> {
        let _guard = self.busy.try_acquire().ok_or(EditorError::Busy)?;
        let current = self.history.current().cloned().ok_or(EditorError::NoImage)?;

        let result = match &request {
            ToolRequest::Crop => {
                let rect = self.canvas.crop_rect();
                if rect.pixel_bounds(current.width(), current.height()).is_none() {
                    log::debug!("crop: degenerate rect {:?}, nothing to do", rect);
                    return Ok(());
                }
                transform::crop(&current, &rect)?
            }
            ToolRequest::Filter { expression, intensity } => apply_filter_blend(&current, expression, *intensity)?,
            _ => {
                let plan = self.plan(&request, &current)?;
                self.generate(generator, &request, plan).await?
            }
        };

        self.canvas.load_image(result.clone())?;
        self.history.commit(result);
        log::info!("{}: committed history entry {}", request.name(), self.history.len() - 1);
        Ok(())
    }

    /// Input image, instruction and ratio for a generative tool.
    fn plan(&self, request: &ToolRequest, current: &RasterImage) -> Result<Plan> {
        let closest = AspectRatio::closest(current.width(), current.height());
        let plan = match request {
            ToolRequest::Upscale => Plan {
                input: current.clone(),
                instruction: ai::upscale_instruction(),
                aspect_ratio: closest,
                model_hint: ModelHint::Standard,
                finish: Finish::AsIs,
            },
            ToolRequest::Cleanup => Plan {
                input: self.masked_composite(self.settings.mask_overlay_color())?,
                instruction: ai::cleanup_instruction(),
                aspect_ratio: closest,
                model_hint: ModelHint::Standard,
                finish: Finish::AsIs,
            },
            ToolRequest::Inpaint { prompt, strict } => {
                if prompt.trim().is_empty() {
                    return Err(EditorError::Config("inpaint needs a description".into()));
                }
                Plan {
                    input: self.masked_composite(self.settings.mask_overlay_color())?,
                    instruction: ai::inpaint_instruction(prompt.trim(), *strict),
                    aspect_ratio: closest,
                    model_hint: ModelHint::Standard,
                    finish: Finish::AsIs,
                }
            }
            ToolRequest::Outpaint { width, height, prompt, keep_background } => {
                if *width == 0 || *height == 0 {
                    return Err(EditorError::Config(format!("invalid outpaint size {}x{}", width, height)));
                }
                let input = self
                    .canvas
                    .padded_image(*width, *height, PAD_FILL)?
                    .ok_or(EditorError::NoImage)?;
                Plan {
                    input,
                    instruction: ai::outpaint_instruction(prompt, *keep_background),
                    aspect_ratio: AspectRatio::closest(*width, *height),
                    model_hint: ModelHint::Standard,
                    finish: Finish::AsIs,
                }
            }
            ToolRequest::Cutout { manual, description } => {
                let source = if *manual {
                    self.masked_composite(self.settings.cutout_overlay_color())?
                } else {
                    current.clone()
                };
                let padded = transform::pad_to_aspect_ratio(&source, closest.value())?;
                let instruction = if *manual {
                    ai::manual_cutout_instruction()
                } else {
                    ai::auto_cutout_instruction(description.as_deref())
                };
                Plan {
                    input: padded.image,
                    instruction,
                    aspect_ratio: closest,
                    model_hint: ModelHint::HighFidelity,
                    finish: Finish::LuminanceMask { original: current.clone(), inset: padded.inset },
                }
            }
            ToolRequest::Crop | ToolRequest::Filter { .. } => {
                return Err(EditorError::Config(format!("{} is not a generative tool", request.name())));
            }
        };
        Ok(plan)
    }

    fn masked_composite(&self, color: Rgba<u8>) -> Result<RasterImage> {
        self.canvas.composite(color)?.ok_or(EditorError::NoImage)
    }

    async fn generate<G: ImageGenerator>(&self, generator: &G, request: &ToolRequest, plan: Plan) -> Result<RasterImage> {
        let model = self.settings.model_for(plan.model_hint).to_string();
        log::info!(
            "{}: requesting {} image from {} ({:?})",
            request.name(),
            plan.aspect_ratio,
            model,
            plan.model_hint
        );
        let gen_request = GenerationRequest {
            image: plan.input.normalize_for_upload(self.settings.jpeg_quality)?,
            instruction: plan.instruction,
            aspect_ratio: plan.aspect_ratio,
            model_hint: plan.model_hint,
            model,
        };

        let generated = match generator.generate(&gen_request).await {
            Ok(Some(image)) => image,
            Ok(None) => {
                log::warn!("{}: generator returned no image", request.name());
                return Err(EditorError::GenerationDeclined);
            }
            Err(e) => {
                log::error!("{}: generation failed: {}", request.name(), e);
                return Err(match e {
                    EditorError::Generation(_) | EditorError::GenerationDeclined => e,
                    other => EditorError::Generation(other.to_string()),
                });
            }
        };

        match plan.finish {
            Finish::AsIs => Ok(generated),
            Finish::LuminanceMask { original, inset } => apply_luminance_mask(&original, &generated, &inset),
        }
    }

    // -- Library ---------------------------------------------------------

    /// Save history entry `index` to the library.
    pub fn save_to_library(&mut self, index: usize) -> Option<Uuid> {
        let image = self.history.get(index)?.clone();
        Some(self.library.save(image))
    }

    pub fn save_current_to_library(&mut self) -> Option<Uuid> {
        let index = self.history.index()?;
        self.save_to_library(index)
    }

    pub fn delete_library_entry(&mut self, id: Uuid) -> bool {
        self.library.delete(id)
    }

    // -- Info, export, analysis ------------------------------------------

    pub fn info(&self) -> Result<ImageInfo> {
        let image = self.history.current().ok_or(EditorError::NoImage)?;
        ImageInfo::of(image, &self.settings.palette_options())
    }

    /// Write the displayed image as a timestamped PNG in `dir`.
    pub fn export_current(&self, dir: &Path) -> Result<PathBuf> {
        let image = self.history.current().ok_or(EditorError::NoImage)?;
        crate::io::export_png(image, dir, &self.settings.export_prefix)
    }

    /// Describe the displayed image. Failures become [`Analysis::failed`].
    pub async fn analyze_current<A: ImageAnalyzer>(&self, analyzer: &A) -> Analysis {
        let Some(image) = self.history.current() else {
            return Analysis::failed();
        };
        let upload = match image.normalize_for_upload(self.settings.jpeg_quality) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("analysis: could not prepare image: {}", e);
                return Analysis::failed();
            }
        };
        match analyzer.analyze(&upload).await {
            Ok(analysis) => analysis,
            Err(e) => {
                log::warn!("analysis failed: {}", e);
                Analysis::failed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    fn img(w: u32, h: u32, px: [u8; 4]) -> RasterImage {
        RasterImage::from_rgba(&RgbaImage::from_pixel(w, h, Rgba(px))).unwrap()
    }

    /// Never called by local tools.
    struct Unreachable;

    impl ImageGenerator for Unreachable {
        async fn generate(&self, _request: &GenerationRequest) -> Result<Option<RasterImage>> {
            panic!("local tool reached the generator");
        }
    }

    #[test]
    fn busy_flag_is_single_flight() {
        let flag = BusyFlag::new();
        let guard = flag.try_acquire().unwrap();
        assert!(flag.is_busy());
        assert!(flag.try_acquire().is_none());
        drop(guard);
        assert!(!flag.is_busy());
        assert!(flag.try_acquire().is_some());
    }

    #[test]
    fn tool_modes() {
        assert_eq!(EditorTool::Cleanup.canvas_mode(), Mode::Draw);
        assert_eq!(EditorTool::Cutout { manual: true }.canvas_mode(), Mode::Draw);
        assert_eq!(EditorTool::Cutout { manual: false }.canvas_mode(), Mode::View);
        assert_eq!(EditorTool::Crop.canvas_mode(), Mode::Crop);
        assert_eq!(EditorTool::Upscale.canvas_mode(), Mode::View);
    }

    #[test]
    fn selecting_a_tool_clears_the_mask() {
        let mut s = EditSession::default();
        s.open(img(20, 20, [0, 0, 0, 255])).unwrap();
        s.select_tool(EditorTool::Cleanup);
        s.canvas_mut().begin_stroke(5.0, 5.0);
        s.canvas_mut().end_stroke();
        assert_eq!(s.canvas().mask().len(), 1);
        s.select_tool(EditorTool::Inpaint);
        assert!(s.canvas().mask().is_empty());
        assert_eq!(s.canvas().mode(), Mode::Draw);
    }

    #[test]
    fn crop_commits_locally() {
        let mut s = EditSession::default();
        s.open(img(100, 50, [9, 9, 9, 255])).unwrap();
        s.select_tool(EditorTool::Crop);
        pollster::block_on(s.apply(&Unreachable, ToolRequest::Crop)).unwrap();
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.current_image().unwrap().dimensions(), (80, 40));
        assert_eq!(s.canvas().natural_size(), (80, 40));
    }

    #[test]
    fn full_frame_crop_is_still_a_new_entry() {
        let mut s = EditSession::default();
        s.open(img(100, 50, [9, 9, 9, 255])).unwrap();
        s.select_tool(EditorTool::Crop);
        s.canvas_mut().set_crop_rect(CropRect::FULL);
        pollster::block_on(s.apply(&Unreachable, ToolRequest::Crop)).unwrap();
        assert_eq!(s.history().len(), 2);
        assert_eq!(s.current_image().unwrap().dimensions(), (100, 50));
    }

    #[test]
    fn zero_area_crop_commits_nothing() {
        let mut s = EditSession::default();
        s.open(img(10, 10, [9, 9, 9, 255])).unwrap();
        s.select_tool(EditorTool::Crop);
        s.canvas_mut().set_crop_rect(CropRect::new(0.0, 0.0, 0.05, 0.05));
        pollster::block_on(s.apply(&Unreachable, ToolRequest::Crop)).unwrap();
        assert_eq!(s.history().len(), 1);
        assert!(!s.is_busy());
    }

    #[test]
    fn filter_commits_locally() {
        let mut s = EditSession::default();
        s.open(img(4, 4, [200, 100, 50, 255])).unwrap();
        let req = ToolRequest::Filter { expression: "invert(1)".into(), intensity: 100.0 };
        pollster::block_on(s.apply(&Unreachable, req)).unwrap();
        let px = s.current_image().unwrap().to_rgba().unwrap();
        assert_eq!(px.get_pixel(0, 0).0, [55, 155, 205, 255]);
    }

    #[test]
    fn bad_filter_leaves_history_alone() {
        let mut s = EditSession::default();
        s.open(img(4, 4, [1, 2, 3, 255])).unwrap();
        let req = ToolRequest::Filter { expression: "wobble(3)".into(), intensity: 100.0 };
        let err = pollster::block_on(s.apply(&Unreachable, req)).unwrap_err();
        assert!(matches!(err, EditorError::Filter(_)));
        assert_eq!(s.history().len(), 1);
        assert!(!s.is_busy());
    }

    #[test]
    fn apply_without_image() {
        let mut s = EditSession::default();
        let err = pollster::block_on(s.apply(&Unreachable, ToolRequest::Crop)).unwrap_err();
        assert!(matches!(err, EditorError::NoImage));
    }

    #[test]
    fn apply_while_busy_is_rejected() {
        let mut s = EditSession::default();
        s.open(img(10, 10, [0, 0, 0, 255])).unwrap();
        let flag = s.busy_flag();
        let _held = flag.try_acquire().unwrap();
        let err = pollster::block_on(s.apply(&Unreachable, ToolRequest::Crop)).unwrap_err();
        assert!(matches!(err, EditorError::Busy));
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn navigation_reloads_canvas() {
        let mut s = EditSession::default();
        s.open(img(100, 100, [0, 0, 0, 255])).unwrap();
        pollster::block_on(s.apply(&Unreachable, ToolRequest::Crop)).unwrap();
        assert_eq!(s.canvas().natural_size(), (80, 80));
        assert!(s.undo().unwrap());
        assert_eq!(s.canvas().natural_size(), (100, 100));
        assert!(!s.undo().unwrap());
        assert!(s.redo().unwrap());
        assert_eq!(s.canvas().natural_size(), (80, 80));
        assert!(!s.delete_history(0).unwrap());
        assert!(s.delete_history(1).unwrap());
        assert_eq!(s.canvas().natural_size(), (100, 100));
    }

    #[test]
    fn library_round_trip() {
        let mut s = EditSession::default();
        s.open(img(10, 10, [0, 0, 0, 255])).unwrap();
        pollster::block_on(s.apply(&Unreachable, ToolRequest::Crop)).unwrap();
        let id = s.save_current_to_library().unwrap();
        assert!(s.save_to_library(7).is_none());
        s.reset_to_original().unwrap();
        assert_eq!(s.history().len(), 1);

        assert!(s.open_from_library(id).unwrap());
        assert_eq!(s.history().len(), 1);
        assert_eq!(s.current_image().unwrap().dimensions(), (8, 8));
        assert!(s.delete_library_entry(id));
        assert!(!s.open_from_library(id).unwrap());
    }

    #[test]
    fn presets_and_adjustments_build_filter_requests() {
        assert!(ToolRequest::preset("no-such-look", 50.0).is_none());
        let none = ToolRequest::preset("none", 50.0).unwrap();
        assert_eq!(none, ToolRequest::Filter { expression: "none".into(), intensity: 50.0 });
        match ToolRequest::adjust(ColorAdjustments::default()) {
            ToolRequest::Filter { expression, intensity } => {
                assert_eq!(expression, "brightness(100%) contrast(100%) saturate(100%) hue-rotate(0deg)");
                assert_eq!(intensity, 100.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn info_reports_displayed_image() {
        let mut s = EditSession::default();
        assert!(matches!(s.info(), Err(EditorError::NoImage)));
        s.open(img(6, 3, [255, 0, 0, 255])).unwrap();
        let info = s.info().unwrap();
        assert_eq!((info.width, info.height), (6, 3));
        assert_eq!(info.format, "PNG");
        assert_eq!(info.palette.len(), 1);
    }
}
