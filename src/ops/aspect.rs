// ============================================================================
// ASPECT RATIOS — the discrete set the generation service understands
// ============================================================================

/// One of the aspect ratios accepted by the generation service.
///
/// Declaration order matters: `closest` resolves ties to the earlier variant,
/// so new ratios must be appended, never inserted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    Square,
    Portrait,
    Landscape,
    Story,
    Widescreen,
}

impl AspectRatio {
    pub fn all() -> &'static [AspectRatio] {
        &[
            AspectRatio::Square,
            AspectRatio::Portrait,
            AspectRatio::Landscape,
            AspectRatio::Story,
            AspectRatio::Widescreen,
        ]
    }

    /// `(width, height)` terms of the ratio.
    pub fn terms(self) -> (u32, u32) {
        match self {
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait => (3, 4),
            AspectRatio::Landscape => (4, 3),
            AspectRatio::Story => (9, 16),
            AspectRatio::Widescreen => (16, 9),
        }
    }

    /// width / height
    pub fn value(self) -> f64 {
        let (w, h) = self.terms();
        w as f64 / h as f64
    }

    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Story => "9:16",
            AspectRatio::Widescreen => "16:9",
        }
    }

    pub fn parse(label: &str) -> Option<AspectRatio> {
        let label = label.trim();
        Self::all().iter().copied().find(|r| r.label() == label)
    }

    /// Closest supported ratio to `width / height` by absolute distance.
    pub fn closest(width: u32, height: u32) -> AspectRatio {
        let actual = if height == 0 {
            1.0
        } else {
            width as f64 / height as f64
        };
        Self::closest_to(actual)
    }

    pub fn closest_to(actual: f64) -> AspectRatio {
        // Strict `<` keeps the earlier candidate on ties.
        Self::all()
            .iter()
            .copied()
            .reduce(|prev, curr| {
                if (curr.value() - actual).abs() < (prev.value() - actual).abs() {
                    curr
                } else {
                    prev
                }
            })
            .unwrap_or(AspectRatio::Square)
    }
}

impl std::fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_sizes() {
        assert_eq!(AspectRatio::closest(1000, 1000), AspectRatio::Square);
        assert_eq!(AspectRatio::closest(1920, 1080), AspectRatio::Widescreen);
        assert_eq!(AspectRatio::closest(1080, 1920), AspectRatio::Story);
        assert_eq!(AspectRatio::closest(1200, 900), AspectRatio::Landscape);
        assert_eq!(AspectRatio::closest(900, 1200), AspectRatio::Portrait);
    }

    #[test]
    fn extreme_portrait_resolves_to_story() {
        assert_eq!(AspectRatio::closest(1, 1000), AspectRatio::Story);
    }

    #[test]
    fn extreme_landscape_resolves_to_widescreen() {
        assert_eq!(AspectRatio::closest(1000, 1), AspectRatio::Widescreen);
    }

    #[test]
    fn ties_keep_the_earlier_candidate() {
        // 21/32 sits exactly halfway between 9:16 and 3:4 in binary floating point.
        let mid = (0.5625 + 0.75) / 2.0;
        assert_eq!(mid, 0.65625);
        assert_eq!(AspectRatio::closest_to(mid), AspectRatio::Portrait);
    }

    #[test]
    fn zero_height_does_not_divide_by_zero() {
        assert_eq!(AspectRatio::closest(500, 0), AspectRatio::Square);
    }

    #[test]
    fn labels_parse_back() {
        for r in AspectRatio::all() {
            assert_eq!(AspectRatio::parse(r.label()), Some(*r));
        }
        assert_eq!(AspectRatio::parse("2:1"), None);
    }
}
