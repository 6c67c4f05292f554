// ============================================================================
// ERRORS — single error type for the editing engine
// ============================================================================
//
// Geometry edge cases (zero-area crop, empty stroke) are NOT errors; they are
// silent no-ops handled where they occur. Everything here is something a
// caller has to react to.

/// Errors surfaced by the editing engine.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Malformed or undecodable image bytes.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Encoding an output image failed.
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// The bytes are an image, but not one we can read.
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// A `data:` URI that is not `data:image/<type>;base64,<payload>`.
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    /// A filter expression that could not be parsed.
    #[error("Invalid filter expression: {0}")]
    Filter(String),

    /// The generation service threw (transport, auth, quota …).
    #[error("Image generation failed: {0}")]
    Generation(String),

    /// The generation service answered without producing an image.
    #[error("The AI could not generate an image. Please try again.")]
    GenerationDeclined,

    /// Another tool operation is still outstanding.
    #[error("Another operation is still in progress")]
    Busy,

    /// The operation needs a displayed image and there is none.
    #[error("No image loaded")]
    NoImage,

    /// Bad setting value or CLI argument.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl EditorError {
    /// True for the failures the orchestrator reports as the single generic
    /// "generation failed" notice.
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, EditorError::Generation(_) | EditorError::GenerationDeclined)
    }
}

pub type Result<T> = std::result::Result<T, EditorError>;
