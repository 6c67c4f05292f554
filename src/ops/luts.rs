// ============================================================================
// LUT PRESETS — built-in one-click looks expressed as filter chains
// ============================================================================

use crate::error::Result;
use crate::ops::filters::FilterChain;

/// A named look.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LutPreset {
    pub id: &'static str,
    pub name: &'static str,
    /// CSS filter expression, see [`FilterChain`].
    pub filter: &'static str,
    /// Swatch colour shown on the preset button.
    pub thumbnail: &'static str,
}

impl LutPreset {
    pub fn chain(&self) -> Result<FilterChain> {
        FilterChain::parse(self.filter)
    }
}

const fn preset(id: &'static str, name: &'static str, filter: &'static str, thumbnail: &'static str) -> LutPreset {
    LutPreset { id, name, filter, thumbnail }
}

pub const LUT_PRESETS: &[LutPreset] = &[
    preset("none", "Original", "none", "#888"),
    // -- Cinematic & film
    preset("cinema1", "Cinema Cool", "contrast(1.1) brightness(0.9) saturate(1.2) hue-rotate(-10deg)", "#6b8cce"),
    preset("cinema2", "Teal & Orange", "contrast(1.2) saturate(1.4) hue-rotate(-15deg) sepia(0.2)", "#d68a59"),
    preset("film1", "Vintage Film", "sepia(0.4) contrast(1.2) brightness(0.9) saturate(0.8)", "#cda882"),
    preset("film2", "Kodak", "contrast(1.3) saturate(1.5) brightness(1.1)", "#e6c657"),
    preset("drama", "Dramatic", "contrast(1.5) saturate(0.8) brightness(0.8)", "#4a4a4a"),
    preset("noir", "Noir", "grayscale(1) contrast(1.5) brightness(0.9)", "#222"),
    preset("fade", "Faded", "contrast(0.9) brightness(1.2) sepia(0.2) saturate(0.8)", "#d1c7bd"),
    preset("warm", "Warmth", "sepia(0.3) saturate(1.3) brightness(1.05)", "#e09f58"),
    preset("cool", "Cold", "hue-rotate(180deg) sepia(0.1) brightness(1.1) opacity(0.9)", "#7895cb"),
    preset("matte", "Matte Black", "grayscale(1) brightness(1.3) contrast(0.8)", "#666"),
    // -- Social
    preset("clarendon", "Clarendon", "contrast(1.2) saturate(1.35) brightness(1.1)", "#8fb1cc"),
    preset("gingham", "Gingham", "brightness(1.05) hue-rotate(-10deg) sepia(0.1)", "#ddd"),
    preset("moon", "Moon", "grayscale(1) contrast(1.1) brightness(1.1)", "#ccc"),
    preset("lark", "Lark", "contrast(0.9) brightness(1.1) saturate(1.1)", "#b8c9d9"),
    preset("reyes", "Reyes", "sepia(0.22) brightness(1.1) contrast(0.85) saturate(0.75)", "#e3d2c1"),
    preset("juno", "Juno", "contrast(1.15) brightness(1.15) saturate(1.4) sepia(0.35) hue-rotate(-10deg)", "#d99cba"),
    preset("slumber", "Slumber", "brightness(1.05) saturate(0.66) sepia(0.35)", "#857662"),
    preset("crema", "Crema", "contrast(0.9) brightness(1.15) saturate(0.9) sepia(0.15)", "#e6dec8"),
    preset("ludwig", "Ludwig", "brightness(1.05) contrast(0.9) saturate(1.3) sepia(0.15)", "#d69e85"),
    preset("aden", "Aden", "hue-rotate(-20deg) contrast(0.9) saturate(0.85) brightness(1.2)", "#c9a4ae"),
    // -- Artistic
    preset("pop", "Pop Art", "saturate(2.5) contrast(1.2) brightness(1.1)", "#ff4081"),
    preset("cyber", "Cyberpunk", "hue-rotate(45deg) contrast(1.3) saturate(2)", "#a12aff"),
    preset("dream", "Dreamy", "blur(1px) brightness(1.2) saturate(1.2) contrast(0.9)", "#f7d6e0"),
    preset("matrix", "Matrix", "hue-rotate(90deg) contrast(1.5) saturate(1.5) brightness(0.8)", "#0f0"),
    preset("invert", "X-Ray", "invert(1)", "#fff"),
    preset("sketch", "Pencil", "grayscale(1) contrast(5) brightness(1.5)", "#eee"),
    preset("sepia", "Old Photo", "sepia(1) contrast(1.2)", "#704214"),
    preset("bleach", "Bleach Bypass", "contrast(1.5) saturate(0.2)", "#777"),
    preset("hdr", "HDR", "contrast(1.5) saturate(1.5) brightness(0.9) drop-shadow(0 0 1px #000)", "#888"),
    preset("sharp", "Sharpen", "contrast(1.3) brightness(1.1)", "#aaa"),
    // -- Colour casts
    preset("red", "Rose", "sepia(0.5) hue-rotate(320deg) saturate(1.5)", "#f00"),
    preset("green", "Mint", "sepia(0.5) hue-rotate(100deg) saturate(1.2)", "#0f0"),
    preset("blue", "Ice", "sepia(0.5) hue-rotate(180deg) saturate(1.5)", "#00f"),
    preset("purple", "Violet", "sepia(0.5) hue-rotate(240deg) saturate(1.5)", "#f0f"),
    preset("golden", "Golden Hour", "sepia(0.4) saturate(2) contrast(1.1)", "#ffd700"),
    preset("dark", "Darken", "brightness(0.7)", "#333"),
    preset("light", "Lighten", "brightness(1.3)", "#ddd"),
    preset("flat", "Flat", "contrast(0.7) brightness(1.1)", "#999"),
    preset("deep", "Deep Blue", "brightness(0.8) hue-rotate(200deg) contrast(1.2)", "#003366"),
    preset("sunset", "Sunset", "brightness(0.9) sepia(0.5) hue-rotate(-30deg) saturate(2)", "#ff6600"),
];

pub fn find_preset(id: &str) -> Option<&'static LutPreset> {
    LUT_PRESETS.iter().find(|p| p.id.eq_ignore_ascii_case(id.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_preset_parses() {
        assert_eq!(LUT_PRESETS.len(), 41);
        for p in LUT_PRESETS {
            assert!(p.chain().is_ok(), "preset {} failed to parse", p.id);
        }
    }

    #[test]
    fn ids_are_unique() {
        let ids: HashSet<_> = LUT_PRESETS.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), LUT_PRESETS.len());
    }

    #[test]
    fn lookup_by_id() {
        assert_eq!(find_preset("noir").map(|p| p.name), Some("Noir"));
        assert!(find_preset("none").unwrap().chain().unwrap().is_identity());
        assert!(find_preset("missing").is_none());
    }
}
