// ============================================================================
// VISIONARY — AI-assisted image editing engine
// ============================================================================
//
//   raster.rs    — encoded image value type, data URIs, upload normalization
//   canvas.rs    — displayed image, mask strokes, crop rect, pan/zoom
//   project.rs   — edit session and tool orchestrator
//   components/  — history, library, strokes, crop rect
//   ops/         — pixel operations and AI request building
//   io.rs        — file load and export
//   settings.rs  — persisted editor defaults
//   logger.rs    — session log file backend for `log`
//   cli.rs       — headless batch processor
// ============================================================================

pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod raster;
pub mod settings;

pub use canvas::{CanvasSurface, Mode, PointerButton, ViewTransform};
pub use error::{EditorError, Result};
pub use ops::AspectRatio;
pub use project::{BusyFlag, EditSession, EditorTool, ToolRequest};
pub use raster::{RasterFormat, RasterImage};
pub use settings::EditorSettings;
