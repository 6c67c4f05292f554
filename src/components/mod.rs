// ============================================================================
// COMPONENTS — stateful building blocks owned by the canvas and the session
// ============================================================================
//
//   strokes.rs — brush strokes, mask undo cursor, stroke rasterization
//   crop.rs    — normalized crop rectangle and handle dragging
//   history.rs — linear edit history of whole-image states
//   library.rs — saved-image library
// ============================================================================

pub mod crop;
pub mod history;
pub mod library;
pub mod strokes;
