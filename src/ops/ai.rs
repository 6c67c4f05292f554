// ============================================================================
// AI COLLABORATORS — generation/analysis contracts and instruction text
// ============================================================================
//
// The editor never talks to a model itself. Callers plug in something that
// implements `ImageGenerator` (and optionally `ImageAnalyzer`); this module
// defines those seams plus the exact instruction wording per tool.

use std::future::Future;

use serde::Deserialize;

use crate::error::{EditorError, Result};
use crate::ops::aspect::AspectRatio;
use crate::raster::RasterImage;

// ---------------------------------------------------------------------------
//  Collaborator traits
// ---------------------------------------------------------------------------

/// Which class of model a request should go to. The concrete model names
/// come from the editor settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModelHint {
    /// General image editing.
    Standard,
    /// Higher-fidelity model used for silhouette masks.
    HighFidelity,
}

/// Everything the generation service needs for one call.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
    /// Already normalized to an upload-safe format.
    pub image: RasterImage,
    pub instruction: String,
    pub aspect_ratio: AspectRatio,
    pub model_hint: ModelHint,
    /// Concrete model name resolved from `model_hint`.
    pub model: String,
}

/// External generative-image service.
///
/// `Ok(None)` means the service answered but declined to produce an image;
/// `Err` means the call itself failed. The session treats both as a failed
/// operation that leaves history untouched.
pub trait ImageGenerator {
    fn generate(&self, request: &GenerationRequest) -> impl Future<Output = Result<Option<RasterImage>>>;
}

/// Result of the analysis collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Analysis {
    pub description: String,
    pub tags: Vec<String>,
}

impl Analysis {
    /// What callers see when analysis fails.
    pub fn failed() -> Self {
        Self {
            description: "Analysis failed".to_string(),
            tags: Vec::new(),
        }
    }

    /// Decode the service's `{"description": .., "tags": [..]}` reply.
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text.trim()).map_err(|e| EditorError::Generation(format!("malformed analysis reply: {}", e)))
    }
}

/// External image-understanding service.
pub trait ImageAnalyzer {
    fn analyze(&self, image: &RasterImage) -> impl Future<Output = Result<Analysis>>;
}

// ---------------------------------------------------------------------------
//  Instructions
// ---------------------------------------------------------------------------

pub const DEFAULT_OUTPAINT_PROMPT: &str = "Fill the background naturally matching the scene";
pub const DEFAULT_CUTOUT_SUBJECT: &str = "the main object";

pub fn upscale_instruction() -> String {
    "Generate an image. Produce a high-fidelity 4K upscaled version of this image. \
     STRICTLY preserve the content, composition, and details. Fix scratches, enhance \
     sharpness and reduce noise without altering the subject."
        .to_string()
}

pub fn cleanup_instruction() -> String {
    "Generate an image. Remove the area highlighted in semi-transparent red. This is an \
     inpainting task. STRICTLY preserve the rest of the image exactly as it is. Reconstruct \
     the background behind the red area naturally."
        .to_string()
}

/// `strict` demands pixel-identical surroundings; otherwise the model may
/// blend the replacement into the scene.
pub fn inpaint_instruction(prompt: &str, strict: bool) -> String {
    if strict {
        format!(
            "Generate an image. The area highlighted in red is a mask. Replace ONLY the content \
             inside this mask with: '{}'. CRITICAL: Do NOT change anything outside the red mask. \
             The unmasked area must be pixel-perfect identical to the original.",
            prompt
        )
    } else {
        format!(
            "Generate an image. The area highlighted in red is a mask. Replace the content inside \
             this mask with: '{}'. Blend it seamlessly with the rest of the image.",
            prompt
        )
    }
}

/// `keep_background` extends the scene into the padding; otherwise the
/// centred image is only a subject reference and the background is replaced.
pub fn outpaint_instruction(prompt: &str, keep_background: bool) -> String {
    let prompt = if prompt.trim().is_empty() { DEFAULT_OUTPAINT_PROMPT } else { prompt };
    if keep_background {
        format!(
            "Generate an image. The center is the original image. The black outer areas are empty \
             canvas. Fill the black areas seamlessly to extend the scene. {}.",
            prompt
        )
    } else {
        format!(
            "Generate an image. Use the central image as a reference character/object. Replace \
             the entire background and fill the black areas with: {}.",
            prompt
        )
    }
}

pub fn manual_cutout_instruction() -> String {
    "Generate an image. STRICT manual cutout. Input has RED overlay marking subject. Task: \
     Create high-contrast BLACK AND WHITE silhouette mask. White=Subject, Black=Background. \
     Ignore everything unpainted."
        .to_string()
}

pub fn auto_cutout_instruction(subject: Option<&str>) -> String {
    let subject = subject
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_CUTOUT_SUBJECT);
    format!(
        "Generate an image. Create a high-contrast BLACK AND WHITE silhouette mask for the \
         subject: {}. Subject=White, Background=Black. Binary mask only.",
        subject
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inpaint_variants_differ() {
        let strict = inpaint_instruction("a red balloon", true);
        let creative = inpaint_instruction("a red balloon", false);
        assert!(strict.contains("'a red balloon'"));
        assert!(strict.contains("pixel-perfect"));
        assert!(creative.contains("Blend it seamlessly"));
        assert!(!creative.contains("CRITICAL"));
    }

    #[test]
    fn outpaint_falls_back_to_default_prompt() {
        let text = outpaint_instruction("  ", true);
        assert!(text.ends_with("Fill the background naturally matching the scene."));
        let replace = outpaint_instruction("a beach", false);
        assert!(replace.contains("Replace the entire background"));
        assert!(replace.ends_with("with: a beach."));
    }

    #[test]
    fn auto_cutout_names_the_subject() {
        assert!(auto_cutout_instruction(Some("the dog")).contains("subject: the dog."));
        assert!(auto_cutout_instruction(None).contains("subject: the main object."));
        assert!(auto_cutout_instruction(Some("")).contains("the main object"));
    }

    #[test]
    fn line_continuations_do_not_leave_double_spaces() {
        for text in [upscale_instruction(), cleanup_instruction(), manual_cutout_instruction()] {
            assert!(text.starts_with("Generate an image."));
            assert!(!text.contains("  "));
        }
    }

    #[test]
    fn failed_analysis_shape() {
        let a = Analysis::failed();
        assert_eq!(a.description, "Analysis failed");
        assert!(a.tags.is_empty());
    }

    #[test]
    fn analysis_reply_decoding() {
        let a = Analysis::from_json(r#" {"description": "A red barn at dusk", "tags": ["barn", "dusk"]} "#).unwrap();
        assert_eq!(a.description, "A red barn at dusk");
        assert_eq!(a.tags, vec!["barn", "dusk"]);
        assert!(matches!(Analysis::from_json(r#"{"description": "x"}"#), Err(EditorError::Generation(_))));
        assert!(Analysis::from_json("not json").unwrap_err().is_generation_failure());
    }
}
