// ============================================================================
// RASTER IMAGE — encoded pixel buffer passed by value through the editor
// ============================================================================
//
// Every history entry, library entry, composite and AI request/response is a
// `RasterImage`: the encoded bytes plus the header facts we need often
// (format + dimensions). Pixels are only decoded when an operation needs them.
// Everything the editor produces is PNG, mirroring `toDataURL('image/png')`.

use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, ImageFormat, RgbImage, RgbaImage};

use crate::error::{EditorError, Result};

/// Container formats we can sniff and decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    Png,
    Jpeg,
    Webp,
    Gif,
    Bmp,
    Tiff,
    Ico,
    Tga,
}

impl RasterFormat {
    /// Formats the generation service accepts as-is.
    pub const UPLOAD_WHITELIST: [RasterFormat; 3] =
        [RasterFormat::Jpeg, RasterFormat::Png, RasterFormat::Webp];

    pub fn mime_type(self) -> &'static str {
        match self {
            RasterFormat::Png => "image/png",
            RasterFormat::Jpeg => "image/jpeg",
            RasterFormat::Webp => "image/webp",
            RasterFormat::Gif => "image/gif",
            RasterFormat::Bmp => "image/bmp",
            RasterFormat::Tiff => "image/tiff",
            RasterFormat::Ico => "image/x-icon",
            RasterFormat::Tga => "image/x-tga",
        }
    }

    /// Short upper-case name, as shown in the properties panel.
    pub fn label(self) -> &'static str {
        match self {
            RasterFormat::Png => "PNG",
            RasterFormat::Jpeg => "JPEG",
            RasterFormat::Webp => "WEBP",
            RasterFormat::Gif => "GIF",
            RasterFormat::Bmp => "BMP",
            RasterFormat::Tiff => "TIFF",
            RasterFormat::Ico => "ICO",
            RasterFormat::Tga => "TGA",
        }
    }

    pub fn is_upload_safe(self) -> bool {
        Self::UPLOAD_WHITELIST.contains(&self)
    }

    fn from_image_format(format: ImageFormat) -> Result<Self> {
        Ok(match format {
            ImageFormat::Png => RasterFormat::Png,
            ImageFormat::Jpeg => RasterFormat::Jpeg,
            ImageFormat::WebP => RasterFormat::Webp,
            ImageFormat::Gif => RasterFormat::Gif,
            ImageFormat::Bmp => RasterFormat::Bmp,
            ImageFormat::Tiff => RasterFormat::Tiff,
            ImageFormat::Ico => RasterFormat::Ico,
            ImageFormat::Tga => RasterFormat::Tga,
            other => return Err(EditorError::UnsupportedFormat(format!("{:?}", other))),
        })
    }
}

/// An encoded image. Cheap to clone (bytes are shared).
#[derive(Clone, PartialEq, Eq)]
pub struct RasterImage {
    format: RasterFormat,
    width: u32,
    height: u32,
    bytes: Arc<[u8]>,
}

impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

impl RasterImage {
    /// Wrap encoded bytes, sniffing the container and reading the header.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes: Vec<u8> = bytes.into();
        let guessed =
            image::guess_format(&bytes).map_err(|e| EditorError::Decode(e.to_string()))?;
        let format = RasterFormat::from_image_format(guessed)?;
        let (width, height) = image::io::Reader::with_format(Cursor::new(&bytes), guessed)
            .into_dimensions()
            .map_err(|e| EditorError::Decode(e.to_string()))?;
        Ok(Self {
            format,
            width,
            height,
            bytes: Arc::from(bytes),
        })
    }

    /// PNG-encode a decoded RGBA buffer.
    pub fn from_rgba(pixels: &RgbaImage) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        let mut buf = Vec::new();
        PngEncoder::new(&mut buf)
            .write_image(pixels.as_raw(), width, height, ColorType::Rgba8)
            .map_err(|e| EditorError::Encode(e.to_string()))?;
        Ok(Self {
            format: RasterFormat::Png,
            width,
            height,
            bytes: Arc::from(buf),
        })
    }

    /// JPEG-encode an opaque RGB buffer.
    pub fn from_rgb_jpeg(pixels: &RgbImage, quality: u8) -> Result<Self> {
        let (width, height) = pixels.dimensions();
        let mut buf = Vec::new();
        JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
            .write_image(pixels.as_raw(), width, height, ColorType::Rgb8)
            .map_err(|e| EditorError::Encode(e.to_string()))?;
        Ok(Self {
            format: RasterFormat::Jpeg,
            width,
            height,
            bytes: Arc::from(buf),
        })
    }

    /// Parse a `data:image/<type>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Result<Self> {
        let uri = uri.trim();
        let rest = uri
            .strip_prefix("data:image/")
            .ok_or_else(|| EditorError::InvalidDataUri("missing data:image/ prefix".into()))?;
        let payload_start = rest
            .find(";base64,")
            .ok_or_else(|| EditorError::InvalidDataUri("missing ;base64, marker".into()))?;
        let payload = &rest[payload_start + ";base64,".len()..];
        let bytes = general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| EditorError::InvalidDataUri(e.to_string()))?;
        Self::from_bytes(bytes)
    }

    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime_type(),
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Decode to straight (non-premultiplied) RGBA8.
    pub fn to_rgba(&self) -> Result<RgbaImage> {
        let format = match self.format {
            RasterFormat::Png => ImageFormat::Png,
            RasterFormat::Jpeg => ImageFormat::Jpeg,
            RasterFormat::Webp => ImageFormat::WebP,
            RasterFormat::Gif => ImageFormat::Gif,
            RasterFormat::Bmp => ImageFormat::Bmp,
            RasterFormat::Tiff => ImageFormat::Tiff,
            RasterFormat::Ico => ImageFormat::Ico,
            RasterFormat::Tga => ImageFormat::Tga,
        };
        image::load_from_memory_with_format(&self.bytes, format)
            .map(|img| img.to_rgba8())
            .map_err(|e| EditorError::Decode(e.to_string()))
    }

    /// Bring the image into a format the generation service accepts.
    ///
    /// Whitelisted formats pass through untouched. Anything else is flattened
    /// over opaque white and re-encoded as JPEG, so transparency in e.g. GIF or
    /// ICO sources never leaks into the request.
    pub fn normalize_for_upload(&self, jpeg_quality: u8) -> Result<RasterImage> {
        if self.format.is_upload_safe() {
            return Ok(self.clone());
        }
        log::debug!(
            "re-encoding {} upload as JPEG over white",
            self.format.label()
        );
        let rgba = self.to_rgba()?;
        let flattened = flatten_over(&rgba, [255, 255, 255]);
        RasterImage::from_rgb_jpeg(&flattened, jpeg_quality)
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn encoded_len(&self) -> usize {
        self.bytes.len()
    }
}

/// Source-over composite of `src` onto an opaque `bg` colour.
pub fn flatten_over(src: &RgbaImage, bg: [u8; 3]) -> RgbImage {
    let (w, h) = src.dimensions();
    let mut out = RgbImage::new(w, h);
    for (dst, px) in out.pixels_mut().zip(src.pixels()) {
        let a = px.0[3] as u32;
        for c in 0..3 {
            let v = (px.0[c] as u32 * a + bg[c] as u32 * (255 - a) + 127) / 255;
            dst.0[c] = v as u8;
        }
    }
    out
}
