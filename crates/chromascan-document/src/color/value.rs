// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Color values as held in the graphics state, and the gray test applied to
// them.

use chromascan_core::error::{ChromascanError, Result};

/// A color in one of the base PDF color families.
///
/// Colors set in ICCBased, Indexed, Separation and DeviceN spaces are
/// resolved to the family of their alternate/base space when they are set,
/// so only these variants ever reach the gray test.
#[derive(Debug, Clone, PartialEq)]
pub enum Color {
    DeviceGray(f64),
    DeviceRgb([f64; 3]),
    DeviceCmyk([f64; 4]),
    CalGray(f64),
    CalRgb([f64; 3]),
    /// L*, a*, b* in their natural ranges.
    Lab([f64; 3]),
    Pattern(PatternColor),
}

/// Current color in a Pattern colorspace.
#[derive(Debug, Clone, PartialEq)]
pub struct PatternColor {
    /// Name of the pattern in the `/Pattern` resource dictionary.
    pub name: Vec<u8>,
    /// Color an uncolored tiling pattern is painted with.
    pub underlying: Option<Box<Color>>,
}

impl Color {
    /// Name of the variant, for diagnostics.
    pub fn family(&self) -> &'static str {
        match self {
            Self::DeviceGray(_) => "DeviceGray",
            Self::DeviceRgb(_) => "DeviceRGB",
            Self::DeviceCmyk(_) => "DeviceCMYK",
            Self::CalGray(_) => "CalGray",
            Self::CalRgb(_) => "CalRGB",
            Self::Lab(_) => "Lab",
            Self::Pattern(_) => "Pattern",
        }
    }
}

/// Whether any of `deltas` exceeds `tolerance` in magnitude.
pub fn visible(tolerance: f64, deltas: &[f64]) -> bool {
    deltas.iter().any(|delta| delta.abs() > tolerance)
}

/// Whether the three channels of an RGB-like triple differ visibly.
pub fn is_triple_colored(tolerance: f64, [a, b, c]: [f64; 3]) -> bool {
    visible(tolerance, &[a - b, a - c, b - c])
}

/// Whether `color` would print as something other than gray.
///
/// Gray families are never colored. CMYK compares C, M and Y only; the K
/// channel does not affect colorfulness. Lab tests the a*/b* axes directly.
/// Pattern colors cannot be judged here and are rejected.
pub fn is_color_colored(color: &Color, tolerance: f64) -> Result<bool> {
    match color {
        Color::DeviceGray(_) | Color::CalGray(_) => Ok(false),
        Color::DeviceRgb(rgb) | Color::CalRgb(rgb) => Ok(is_triple_colored(tolerance, *rgb)),
        Color::DeviceCmyk([c, m, y, _k]) => Ok(is_triple_colored(tolerance, [*c, *m, *y])),
        Color::Lab([_l, a, b]) => Ok(visible(tolerance, &[*a, *b])),
        Color::Pattern(_) => Err(ChromascanError::UnexpectedColor {
            expected: "non-pattern",
            found: "Pattern",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chromascan_core::config::COLOR_TOLERANCE;

    fn colored(color: Color) -> bool {
        is_color_colored(&color, COLOR_TOLERANCE).unwrap()
    }

    #[test]
    fn gray_families_are_never_colored() {
        for value in [0.0, 0.25, 0.5, 1.0, 7.0] {
            assert!(!colored(Color::DeviceGray(value)));
            assert!(!colored(Color::CalGray(value)));
        }
    }

    #[test]
    fn rgb_threshold_is_strict() {
        assert!(!colored(Color::DeviceRgb([0.0, 0.0, 0.0])));
        assert!(colored(Color::DeviceRgb([1.0, 0.0, 0.0])));

        let base = 0.5;
        assert!(!colored(Color::DeviceRgb([base, base, base + COLOR_TOLERANCE * 0.99])));
        assert!(colored(Color::DeviceRgb([base, base, base + COLOR_TOLERANCE * 1.01])));
        assert!(!colored(Color::DeviceRgb([0.0, 0.0, COLOR_TOLERANCE])));
    }

    #[test]
    fn cmyk_ignores_black_channel() {
        for k in [0.0, 0.3, 0.7, 1.0] {
            assert!(!colored(Color::DeviceCmyk([0.2, 0.2, 0.2, k])));
            assert!(colored(Color::DeviceCmyk([0.0, 1.0, 0.0, k])));
        }
    }

    #[test]
    fn cal_rgb_uses_pairwise_test() {
        assert!(!colored(Color::CalRgb([0.4, 0.4, 0.4])));
        assert!(colored(Color::CalRgb([0.4, 0.45, 0.4])));
    }

    #[test]
    fn lab_tests_chroma_axes_only() {
        assert!(!colored(Color::Lab([50.0, 0.0, 0.0])));
        assert!(!colored(Color::Lab([100.0, 0.01, -0.01])));
        assert!(colored(Color::Lab([50.0, 20.0, 0.0])));
        assert!(colored(Color::Lab([50.0, 0.0, -20.0])));
    }

    #[test]
    fn pattern_color_is_rejected() {
        let pattern = Color::Pattern(PatternColor {
            name: b"P0".to_vec(),
            underlying: None,
        });
        assert!(is_color_colored(&pattern, COLOR_TOLERANCE).is_err());
    }
}
