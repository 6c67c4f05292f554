// ============================================================================
// SETTINGS — editor defaults persisted as a key=value file
// ============================================================================

use std::path::{Path, PathBuf};

use image::Rgba;

use crate::error::{EditorError, Result};
use crate::ops::ai::ModelHint;
use crate::ops::palette::PaletteOptions;

const SETTINGS_FILE: &str = "visionary_settings.cfg";

#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Brush diameter in screen pixels.
    pub brush_size: f32,
    /// Stroke colour for the live overlay and cleanup/inpaint composites.
    pub mask_overlay: [u8; 4],
    /// Stroke colour for manual cutout composites.
    pub cutout_overlay: [u8; 4],
    pub zoom_step: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Fraction of the container the image fills at zoom 1.
    pub fit_fraction: f32,
    pub palette_colors: usize,
    pub palette_quantization: u8,
    pub palette_alpha_threshold: u8,
    pub palette_working_width: u32,
    /// Quality used when re-encoding non-whitelisted uploads.
    pub jpeg_quality: u8,
    pub default_model: String,
    pub cutout_model: String,
    pub export_prefix: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            brush_size: 30.0,
            mask_overlay: [255, 0, 0, 153],
            cutout_overlay: [255, 0, 0, 204],
            zoom_step: 0.1,
            min_zoom: 0.1,
            max_zoom: 5.0,
            fit_fraction: 0.9,
            palette_colors: 5,
            palette_quantization: 32,
            palette_alpha_threshold: 128,
            palette_working_width: 100,
            jpeg_quality: 90,
            default_model: "gemini-2.5-flash-image".to_string(),
            cutout_model: "gemini-3-pro-image-preview".to_string(),
            export_prefix: "visionary_export".to_string(),
        }
    }
}

impl EditorSettings {
    /// Platform config location of the settings file.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("visionary");
            return Some(config_dir.join(SETTINGS_FILE));
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            return Some(PathBuf::from(appdata).join("Visionary").join(SETTINGS_FILE));
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            return Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("Visionary")
                    .join(SETTINGS_FILE),
            );
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join(SETTINGS_FILE)))
        }
    }

    /// Load from the platform location; defaults if missing or unreadable.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        match Self::load_from(&path) {
            Ok(s) => s,
            Err(e) => {
                log::debug!("settings: using defaults ({})", e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::settings_path()
            .ok_or_else(|| EditorError::Config("no settings directory on this platform".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, self.to_config_string())?;
        Ok(())
    }

    /// Parse `key=value` lines. Unknown keys and bad values are skipped.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "brush_size" => set_parsed(&mut s.brush_size, val, |v: &f32| *v > 0.0),
                "mask_overlay" => {
                    if let Some(c) = str_to_color(val) { s.mask_overlay = c; }
                }
                "cutout_overlay" => {
                    if let Some(c) = str_to_color(val) { s.cutout_overlay = c; }
                }
                "zoom_step" => set_parsed(&mut s.zoom_step, val, |v: &f32| *v > 0.0),
                "min_zoom" => set_parsed(&mut s.min_zoom, val, |v: &f32| *v > 0.0),
                "max_zoom" => set_parsed(&mut s.max_zoom, val, |v: &f32| *v > 0.0),
                "fit_fraction" => set_parsed(&mut s.fit_fraction, val, |v: &f32| *v > 0.0 && *v <= 1.0),
                "palette_colors" => set_parsed(&mut s.palette_colors, val, |_| true),
                "palette_quantization" => set_parsed(&mut s.palette_quantization, val, |v: &u8| *v > 0),
                "palette_alpha_threshold" => set_parsed(&mut s.palette_alpha_threshold, val, |_| true),
                "palette_working_width" => set_parsed(&mut s.palette_working_width, val, |v: &u32| *v > 0),
                "jpeg_quality" => set_parsed(&mut s.jpeg_quality, val, |v: &u8| (1..=100).contains(v)),
                "default_model" if !val.is_empty() => s.default_model = val.to_string(),
                "cutout_model" if !val.is_empty() => s.cutout_model = val.to_string(),
                "export_prefix" if !val.is_empty() => s.export_prefix = val.to_string(),
                other => log::debug!("settings: ignoring key `{}`", other),
            }
        }
        if s.min_zoom > s.max_zoom {
            std::mem::swap(&mut s.min_zoom, &mut s.max_zoom);
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "brush_size={}\n\
             mask_overlay={}\n\
             cutout_overlay={}\n\
             zoom_step={}\n\
             min_zoom={}\n\
             max_zoom={}\n\
             fit_fraction={}\n\
             palette_colors={}\n\
             palette_quantization={}\n\
             palette_alpha_threshold={}\n\
             palette_working_width={}\n\
             jpeg_quality={}\n\
             default_model={}\n\
             cutout_model={}\n\
             export_prefix={}\n",
            self.brush_size,
            color_to_str(self.mask_overlay),
            color_to_str(self.cutout_overlay),
            self.zoom_step,
            self.min_zoom,
            self.max_zoom,
            self.fit_fraction,
            self.palette_colors,
            self.palette_quantization,
            self.palette_alpha_threshold,
            self.palette_working_width,
            self.jpeg_quality,
            self.default_model,
            self.cutout_model,
            self.export_prefix,
        )
    }

    pub fn mask_overlay_color(&self) -> Rgba<u8> {
        Rgba(self.mask_overlay)
    }

    pub fn cutout_overlay_color(&self) -> Rgba<u8> {
        Rgba(self.cutout_overlay)
    }

    pub fn palette_options(&self) -> PaletteOptions {
        PaletteOptions {
            color_count: self.palette_colors,
            quantization: self.palette_quantization,
            alpha_threshold: self.palette_alpha_threshold,
            working_width: self.palette_working_width,
        }
    }

    pub fn model_for(&self, hint: ModelHint) -> &str {
        match hint {
            ModelHint::Standard => &self.default_model,
            ModelHint::HighFidelity => &self.cutout_model,
        }
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, val: &str, valid: impl Fn(&T) -> bool) {
    match val.parse::<T>() {
        Ok(v) if valid(&v) => *slot = v,
        _ => log::debug!("settings: bad value `{}`, keeping default", val),
    }
}

/// Serialize a colour as "r,g,b,a"
fn color_to_str(c: [u8; 4]) -> String {
    format!("{},{},{},{}", c[0], c[1], c[2], c[3])
}

/// Parse a colour from "r,g,b,a"
fn str_to_color(s: &str) -> Option<[u8; 4]> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return None;
    }
    let mut out = [0u8; 4];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = part.trim().parse().ok()?;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_editor() {
        let s = EditorSettings::default();
        assert_eq!(s.brush_size, 30.0);
        assert_eq!(s.mask_overlay_color(), Rgba([255, 0, 0, 153]));
        assert_eq!(s.model_for(ModelHint::HighFidelity), "gemini-3-pro-image-preview");
        assert_eq!(s.palette_options(), PaletteOptions::default());
    }

    #[test]
    fn config_string_round_trips() {
        let mut s = EditorSettings::default();
        s.brush_size = 12.5;
        s.cutout_overlay = [0, 255, 0, 200];
        s.export_prefix = "shot".into();
        assert_eq!(EditorSettings::parse(&s.to_config_string()), s);
    }

    #[test]
    fn bad_lines_fall_back_to_defaults() {
        let s = EditorSettings::parse(
            "brush_size=-3\njpeg_quality=400\nmask_overlay=1,2,3\nmystery=1\nno equals sign\nzoom_step=0.25\n",
        );
        let d = EditorSettings::default();
        assert_eq!(s.brush_size, d.brush_size);
        assert_eq!(s.jpeg_quality, d.jpeg_quality);
        assert_eq!(s.mask_overlay, d.mask_overlay);
        assert_eq!(s.zoom_step, 0.25);
    }

    #[test]
    fn save_and_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("visionary-settings-{}", uuid::Uuid::new_v4()));
        let path = dir.join(SETTINGS_FILE);
        let mut s = EditorSettings::default();
        s.palette_colors = 8;
        s.save_to(&path).unwrap();
        assert_eq!(EditorSettings::load_from(&path).unwrap(), s);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let path = std::env::temp_dir().join("visionary-definitely-missing.cfg");
        assert!(matches!(EditorSettings::load_from(&path), Err(EditorError::Io(_))));
    }
}
