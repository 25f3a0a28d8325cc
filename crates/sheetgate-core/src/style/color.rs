//! Color representation

use std::fmt;

/// A color as stored in a workbook's style table
///
/// Theme and indexed colors are kept symbolic so they survive a read/write cycle
/// without being resolved against a palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Automatic/default color
    #[default]
    Auto,

    /// RGB color (no alpha)
    Rgb { r: u8, g: u8, b: u8 },

    /// ARGB color with alpha channel
    Argb { a: u8, r: u8, g: u8, b: u8 },

    /// Theme color with tint
    Theme {
        /// Theme color index
        index: u8,
        /// Tint in thousandths (-1000 to 1000)
        tint: i16,
    },

    /// Indexed color (legacy palette)
    Indexed(u8),
}

impl Color {
    /// Create an RGB color
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color::Rgb { r, g, b }
    }

    /// Create an ARGB color
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Color::Argb { a, r, g, b }
    }

    /// Create a theme color from a fractional tint (-1.0 to 1.0)
    pub fn theme(index: u8, tint: f64) -> Self {
        Color::Theme {
            index,
            tint: (tint.clamp(-1.0, 1.0) * 1000.0).round() as i16,
        }
    }

    /// Create from a hex string (`#FF0000`, `FF0000` or `FFFF0000`)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

        match hex.len() {
            6 => Some(Color::Rgb {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
            }),
            8 => Some(Color::Argb {
                a: byte(0)?,
                r: byte(2)?,
                g: byte(4)?,
                b: byte(6)?,
            }),
            _ => None,
        }
    }

    /// ARGB hex string for explicit colors, `None` for auto, theme and indexed colors
    pub fn to_argb_hex(&self) -> Option<String> {
        match self {
            Color::Rgb { r, g, b } => Some(format!("FF{:02X}{:02X}{:02X}", r, g, b)),
            Color::Argb { a, r, g, b } => Some(format!("{:02X}{:02X}{:02X}{:02X}", a, r, g, b)),
            _ => None,
        }
    }

    /// Fractional tint of a theme color
    pub fn tint_value(&self) -> f64 {
        match self {
            Color::Theme { tint, .. } => *tint as f64 / 1000.0,
            _ => 0.0,
        }
    }

    /// Check if color is automatic/default
    pub fn is_auto(&self) -> bool {
        matches!(self, Color::Auto)
    }

    pub const BLACK: Color = Color::Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Auto => write!(f, "auto"),
            Color::Rgb { r, g, b } => write!(f, "#{:02X}{:02X}{:02X}", r, g, b),
            Color::Argb { a, r, g, b } => write!(f, "#{:02X}{:02X}{:02X}{:02X}", a, r, g, b),
            Color::Theme { index, tint } => write!(f, "theme({}, {})", index, *tint as f64 / 1000.0),
            Color::Indexed(i) => write!(f, "indexed({})", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::from_hex("#FF0000"), Some(Color::rgb(255, 0, 0)));
        assert_eq!(
            Color::from_hex("FFFFC7CE"),
            Some(Color::argb(0xFF, 0xFF, 0xC7, 0xCE))
        );
        assert_eq!(Color::from_hex("12345"), None);
        assert_eq!(Color::from_hex("GG0000"), None);
    }

    #[test]
    fn test_to_argb_hex() {
        assert_eq!(Color::rgb(1, 2, 3).to_argb_hex().as_deref(), Some("FF010203"));
        assert_eq!(Color::Indexed(64).to_argb_hex(), None);
        assert_eq!(Color::Auto.to_argb_hex(), None);
    }

    #[test]
    fn test_theme_tint_roundtrip() {
        let color = Color::theme(4, -0.249977111117893);
        assert_eq!(color, Color::Theme { index: 4, tint: -250 });
        assert_eq!(color.tint_value(), -0.25);
    }
}
