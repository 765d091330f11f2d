// THEORY:
// Tint colours arrive from the host as `#RRGGBB` strings. The compositor only
// ever sees them as linear RGB triples in [0, 1], so parsing happens once at
// the boundary and everything downstream works with `Color`.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// An RGB triple with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color(pub [f32; 3]);

impl Color {
    pub const WHITE: Self = Self([1.0, 1.0, 1.0]);
    pub const BLACK: Self = Self([0.0, 0.0, 0.0]);

    /// Parses `RRGGBB`, with or without a leading `#`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for anything that is not six hex digits.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid_hex(hex));
        }

        let mut rgb = [0.0f32; 3];
        for (i, component) in rgb.iter_mut().enumerate() {
            let byte = u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16)
                .map_err(|_| invalid_hex(hex))?;
            *component = f32::from(byte) / 255.0;
        }

        Ok(Self(rgb))
    }

    /// Formats the colour back to `#RRGGBB`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_hex(&self) -> String {
        let [r, g, b] = self.0.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        format!("#{r:02X}{g:02X}{b:02X}")
    }
}

fn invalid_hex(hex: &str) -> Error {
    Error::InvalidParameter {
        name: "color".to_string(),
        reason: format!("expected #RRGGBB, got {hex:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_white_and_black() {
        assert_eq!(Color::from_hex("#FFFFFF").unwrap(), Color::WHITE);
        assert_eq!(Color::from_hex("000000").unwrap(), Color::BLACK);
    }

    #[test]
    fn parses_mixed_case() {
        let c = Color::from_hex("#ff8000").unwrap();
        assert!((c.0[0] - 1.0).abs() < 1e-6);
        assert!((c.0[1] - 128.0 / 255.0).abs() < 1e-6);
        assert!(c.0[2].abs() < 1e-6);
        assert_eq!(Color::from_hex("#Ff8000").unwrap(), c);
    }

    #[test]
    fn rejects_malformed_strings() {
        for bad in [
            "", "#", "#FFF", "#FFFFFFF", "#GGGGGG", "##FFFFF", "#ÿÿÿ", "#+F+F+F", "+F+F+F",
            "#-1-1-1",
        ] {
            assert!(
                matches!(Color::from_hex(bad), Err(Error::InvalidParameter { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn hex_survives_formatting() {
        assert_eq!(Color::from_hex("#3C7AB1").unwrap().to_hex(), "#3C7AB1");
    }
}
