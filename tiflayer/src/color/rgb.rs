//! RGB color value and CSS-style color parsing.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use super::ColorError;

/// An opaque 8-bit RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const BLACK: Rgb = Rgb([0, 0, 0]);
    pub const WHITE: Rgb = Rgb([255, 255, 255]);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    /// Opaque RGBA bytes for this color.
    pub fn to_rgba(self) -> [u8; 4] {
        let [r, g, b] = self.0;
        [r, g, b, 255]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "rgb({}, {}, {})", r, g, b)
    }
}

fn component_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("static pattern is valid"))
}

impl FromStr for Rgb {
    type Err = ColorError;

    /// Accepts `#rrggbb`, `rgb(r, g, b)` and `rgba(r, g, b, a)`.
    ///
    /// The alpha component of `rgba(...)` is read but dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ColorError::InvalidColor(s.to_string());

        if let Some(hex) = trimmed.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(invalid());
            }
            let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
            return Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]));
        }

        let lower = trimmed.to_ascii_lowercase();
        if !(lower.starts_with("rgb(") || lower.starts_with("rgba(")) || !lower.ends_with(')') {
            return Err(invalid());
        }

        let components: Vec<&str> = component_pattern()
            .find_iter(trimmed)
            .map(|m| m.as_str())
            .collect();
        if components.len() != 3 && components.len() != 4 {
            return Err(invalid());
        }

        let mut rgb = [0u8; 3];
        for (slot, raw) in rgb.iter_mut().zip(components.iter()) {
            let value: f64 = raw.parse().map_err(|_| invalid())?;
            if !(0.0..=255.0).contains(&value) {
                return Err(invalid());
            }
            *slot = value.round() as u8;
        }
        Ok(Rgb(rgb))
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
