// ============================================================================
// FILE I/O — loading images from disk and writing exports
// ============================================================================

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};

use crate::error::{EditorError, Result};
use crate::raster::{RasterImage, flatten_over};

/// Output formats for written files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveFormat {
    #[default]
    Png,
    Jpeg,
}

impl SaveFormat {
    pub fn parse(s: &str) -> Option<SaveFormat> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Some(SaveFormat::Png),
            "jpg" | "jpeg" => Some(SaveFormat::Jpeg),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SaveFormat::Png => "png",
            SaveFormat::Jpeg => "jpg",
        }
    }

    /// Guess from a path's extension.
    pub fn from_path(path: &Path) -> Option<SaveFormat> {
        path.extension().and_then(|e| e.to_str()).and_then(SaveFormat::parse)
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Read an image file into a `RasterImage` without decoding the pixels.
pub fn load_image(path: &Path) -> Result<RasterImage> {
    let bytes = std::fs::read(path)?;
    RasterImage::from_bytes(bytes)
}

// ============================================================================
// WRITING
// ============================================================================

/// Encode `image` and write it to `path`. JPEG output is flattened over white.
pub fn encode_and_write(image: &RgbaImage, path: &Path, format: SaveFormat, quality: u8) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let (w, h) = image.dimensions();

    match format {
        SaveFormat::Png => {
            PngEncoder::new(&mut writer)
                .write_image(image.as_raw(), w, h, ColorType::Rgba8)
                .map_err(|e| EditorError::Encode(e.to_string()))?;
        }
        SaveFormat::Jpeg => {
            let rgb = flatten_over(image, [255, 255, 255]);
            JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100))
                .write_image(rgb.as_raw(), w, h, ColorType::Rgb8)
                .map_err(|e| EditorError::Encode(e.to_string()))?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// `<prefix>_<unix-millis>.png`
pub fn export_filename(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.png", prefix, at.timestamp_millis())
}

/// Write `image` as PNG into `dir` under a timestamped name and return the
/// full path. PNG sources are written byte-for-byte.
pub fn export_png(image: &RasterImage, dir: &Path, prefix: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(prefix, Utc::now()));
    if image.format() == crate::raster::RasterFormat::Png {
        std::fs::write(&path, image.bytes())?;
    } else {
        encode_and_write(&image.to_rgba()?, &path, SaveFormat::Png, 100)?;
    }
    log::info!("exported {}x{} image to {}", image.width(), image.height(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use image::Rgba;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("visionary-io-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn save_format_parsing() {
        assert_eq!(SaveFormat::parse("JPG"), Some(SaveFormat::Jpeg));
        assert_eq!(SaveFormat::parse("png"), Some(SaveFormat::Png));
        assert_eq!(SaveFormat::parse("gif"), None);
        assert_eq!(SaveFormat::from_path(Path::new("a/b.jpeg")), Some(SaveFormat::Jpeg));
    }

    #[test]
    fn export_name_uses_unix_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(export_filename("visionary_export", at), "visionary_export_1700000000123.png");
    }

    #[test]
    fn export_then_load_round_trips() {
        let dir = temp_dir();
        let px = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 128]));
        let img = RasterImage::from_rgba(&px).unwrap();
        let path = export_png(&img, &dir, "shot").unwrap();
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("shot_"));
        let back = load_image(&path).unwrap();
        assert_eq!(back.to_rgba().unwrap(), px);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn jpeg_write_is_opaque() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("out.jpg");
        let px = RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 0]));
        encode_and_write(&px, &path, SaveFormat::Jpeg, 90).unwrap();
        let back = load_image(&path).unwrap().to_rgba().unwrap();
        assert!(back.pixels().all(|p| p.0[3] == 255 && p.0[0] > 240));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_image(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, EditorError::Io(_)));
    }
}
