// ============================================================================
// OPS MODULE — stateless image operations
// ============================================================================
//
//   aspect.rs    — supported aspect ratios and the closest-ratio classifier
//   transform.rs — crop, aspect-ratio padding, normalized region resampling
//   mask.rs      — luminance alpha masking (silhouette -> cutout)
//   filters.rs   — CSS-style filter chains, intensity blend, slider adjustments
//   luts.rs      — built-in filter presets
//   palette.rs   — dominant colour extraction and image info
//   ai.rs        — generation/analysis collaborator traits and instructions
// ============================================================================

pub mod ai;
pub mod aspect;
pub mod filters;
pub mod luts;
pub mod mask;
pub mod palette;
pub mod transform;

pub use aspect::AspectRatio;
