//! Hex color parsing for annotation styling.
//!
//! Annotation records carry user-facing `#RRGGBB` strings. Parsing is total:
//! a channel that fails to parse yields `0.0` for that channel, so a broken
//! color degrades to black rather than dropping an otherwise valid annotation.

/// A normalized RGB color, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    /// Red channel
    pub r: f32,
    /// Green channel
    pub g: f32,
    /// Blue channel
    pub b: f32,
}

impl Color {
    /// Black, the default for text and path annotations.
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Highlighter yellow (`#ffff00`), the default for rect annotations.
    pub const HIGHLIGHT_YELLOW: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 0.0,
    };

    /// Create a color from raw channel values.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse a `#RRGGBB` string into a color. Never fails.
    ///
    /// Each channel is parsed independently from its fixed position; a channel
    /// that does not parse as hex yields `0.0`. An empty string returns
    /// `fallback`. A completely unparsable string therefore degrades to black,
    /// never to an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use pdf_overlay::color::Color;
    ///
    /// assert_eq!(Color::from_hex("#ff0000", Color::BLACK), Color::new(1.0, 0.0, 0.0));
    /// assert_eq!(Color::from_hex("notahex", Color::BLACK), Color::BLACK);
    /// assert_eq!(Color::from_hex("", Color::HIGHLIGHT_YELLOW), Color::HIGHLIGHT_YELLOW);
    /// ```
    pub fn from_hex(hex: &str, fallback: Color) -> Color {
        if hex.is_empty() {
            return fallback;
        }
        Color {
            r: parse_channel(hex, 1),
            g: parse_channel(hex, 3),
            b: parse_channel(hex, 5),
        }
    }
}

/// Parse one two-digit channel starting at `offset`, or `0.0` on any failure.
fn parse_channel(hex: &str, offset: usize) -> f32 {
    hex.get(offset..offset + 2)
        .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        .map(|value| value as f32 / 255.0)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parses_well_formed_hex() {
        let c = Color::from_hex("#336699", Color::BLACK);
        assert!((c.r - 0x33 as f32 / 255.0).abs() < 1e-6);
        assert!((c.g - 0x66 as f32 / 255.0).abs() < 1e-6);
        assert!((c.b - 0x99 as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_white_and_black() {
        assert_eq!(Color::from_hex("#ffffff", Color::BLACK), Color::new(1.0, 1.0, 1.0));
        assert_eq!(Color::from_hex("#000000", Color::HIGHLIGHT_YELLOW), Color::BLACK);
    }

    #[test]
    fn test_malformed_string_degrades_to_black() {
        assert_eq!(Color::from_hex("notahex", Color::HIGHLIGHT_YELLOW), Color::BLACK);
    }

    #[test]
    fn test_partially_bad_channel_degrades_per_channel() {
        // Red parses, green is garbage, blue parses.
        let c = Color::from_hex("#ffzzff", Color::BLACK);
        assert_eq!(c, Color::new(1.0, 0.0, 1.0));
    }

    #[test]
    fn test_truncated_string() {
        // Too short for green and blue; those channels go to zero.
        let c = Color::from_hex("#ff0", Color::BLACK);
        assert_eq!(c, Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_empty_string_returns_fallback() {
        assert_eq!(
            Color::from_hex("", Color::HIGHLIGHT_YELLOW),
            Color::HIGHLIGHT_YELLOW
        );
    }

    proptest! {
        #[test]
        fn test_from_hex_is_total(s in "\\PC*") {
            let c = Color::from_hex(&s, Color::BLACK);
            prop_assert!((0.0..=1.0).contains(&c.r));
            prop_assert!((0.0..=1.0).contains(&c.g));
            prop_assert!((0.0..=1.0).contains(&c.b));
        }

        #[test]
        fn test_round_trip_for_valid_hex(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255) {
            let hex = format!("#{:02x}{:02x}{:02x}", r, g, b);
            let c = Color::from_hex(&hex, Color::BLACK);
            prop_assert!((c.r * 255.0 - r as f32).abs() < 0.5);
            prop_assert!((c.g * 255.0 - g as f32).abs() < 0.5);
            prop_assert!((c.b * 255.0 - b as f32).abs() < 0.5);
        }
    }
}
