//! Color schemes, hex colors and the multi-stop interpolation engine.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use soilcarbon_core::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// From a `0xRRGGBB` literal
    pub const fn from_u32(rgb: u32) -> Self {
        Self::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8)
    }

    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Parse `#rrggbb` or `rrggbb` (case-insensitive).
    pub fn from_hex(s: &str) -> Result<Self> {
        let hex = s.trim().trim_start_matches('#');
        let invalid = || Error::InvalidParameter {
            name: "color",
            value: s.to_string(),
            reason: "expected #rrggbb".into(),
        };
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
        Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Lowercase `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba(self, alpha: u8) -> [u8; 4] {
        [self.r, self.g, self.b, alpha]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

// Colors travel as hex strings in taxonomy files and chart JSON
impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Rgb::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// A color stop: position in [0, 1] mapped to an RGB color.
#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub t: f64,
    pub color: Rgb,
}

impl ColorStop {
    pub const fn new(t: f64, r: u8, g: u8, b: u8) -> Self {
        Self {
            t,
            color: Rgb::new(r, g, b),
        }
    }
}

/// Available continuous color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorScheme {
    /// Red -> pale yellow -> teal, soil organic carbon change (-10..10 t C/ha)
    StockChange,
    /// Brown -> Yellow -> Green
    Ndvi,
    /// White -> Cyan -> Blue
    Water,
    /// Black -> White
    Grayscale,
}

impl ColorScheme {
    pub const ALL: &[ColorScheme] = &[Self::StockChange, Self::Ndvi, Self::Water, Self::Grayscale];

    pub fn name(&self) -> &'static str {
        match self {
            Self::StockChange => "SOC stock change",
            Self::Ndvi => "NDVI",
            Self::Water => "Water",
            Self::Grayscale => "Grayscale",
        }
    }

    /// Natural value range of the scheme, used when no range is given
    pub fn default_range(&self) -> (f64, f64) {
        match self {
            Self::StockChange => (STOCK_CHANGE_MIN, STOCK_CHANGE_MAX),
            Self::Ndvi | Self::Water => (-1.0, 1.0),
            Self::Grayscale => (0.0, 1.0),
        }
    }
}

/// Stock change range covered by the ramp, in t C/ha
pub const STOCK_CHANGE_MIN: f64 = -10.0;
pub const STOCK_CHANGE_MAX: f64 = 10.0;

// Nine entries at 2.5 t C/ha spacing from -10 to +10
const STOCK_CHANGE_STOPS: &[ColorStop] = &[
    ColorStop::new(0.000, 0xB3, 0x02, 0x00),
    ColorStop::new(0.125, 0xE3, 0x4A, 0x33),
    ColorStop::new(0.250, 0xFC, 0x8D, 0x59),
    ColorStop::new(0.375, 0xFD, 0xCC, 0x8A),
    ColorStop::new(0.500, 0xFF, 0xFF, 0xCC),
    ColorStop::new(0.625, 0xA1, 0xDA, 0xB4),
    ColorStop::new(0.750, 0x31, 0xB3, 0xBD),
    ColorStop::new(0.875, 0x1C, 0x90, 0x99),
    ColorStop::new(1.000, 0x06, 0x6C, 0x59),
];

const NDVI_STOPS: &[ColorStop] = &[
    ColorStop::new(0.0, 120, 70, 20),
    ColorStop::new(0.3, 200, 170, 60),
    ColorStop::new(0.5, 240, 230, 100),
    ColorStop::new(0.7, 100, 180, 50),
    ColorStop::new(1.0, 10, 100, 20),
];

const WATER_STOPS: &[ColorStop] = &[
    ColorStop::new(0.00, 240, 249, 255),
    ColorStop::new(0.25, 186, 228, 250),
    ColorStop::new(0.50, 80, 180, 230),
    ColorStop::new(0.75, 30, 120, 200),
    ColorStop::new(1.00, 8, 48, 107),
];

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

fn multi_stop(stops: &[ColorStop], t: f64) -> Rgb {
    let (first, last) = (stops[0], stops[stops.len() - 1]);
    if t <= first.t {
        return first.color;
    }
    for pair in stops.windows(2) {
        if t <= pair[1].t {
            let ratio = (t - pair[0].t) / (pair[1].t - pair[0].t);
            return lerp_color(pair[0].color, pair[1].color, ratio);
        }
    }
    last.color
}

/// Evaluate a color scheme at normalized position `t` ∈ [0, 1]; out-of-range
/// positions clamp to the end colors.
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    match scheme {
        ColorScheme::StockChange => multi_stop(STOCK_CHANGE_STOPS, t),
        ColorScheme::Ndvi => multi_stop(NDVI_STOPS, t),
        ColorScheme::Water => multi_stop(WATER_STOPS, t),
        ColorScheme::Grayscale => {
            let v = (t.clamp(0.0, 1.0) * 255.0).round() as u8;
            Rgb::new(v, v, v)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing() {
        assert_eq!(Rgb::from_hex("#ffff64").unwrap(), Rgb::new(255, 255, 100));
        assert_eq!(Rgb::from_hex("B30200").unwrap(), Rgb::new(179, 2, 0));
        assert_eq!(Rgb::new(0, 70, 200).to_hex(), "#0046c8");
        assert_eq!(Rgb::from_u32(0x0046c8), Rgb::new(0, 70, 200));
        assert!(Rgb::from_hex("#fff").is_err());
        assert!(Rgb::from_hex("#gggggg").is_err());
    }

    #[test]
    fn stock_change_ramp_entries() {
        let (min, max) = ColorScheme::StockChange.default_range();
        let at = |v: f64| evaluate(ColorScheme::StockChange, (v - min) / (max - min));
        assert_eq!(at(-10.0), Rgb::from_hex("#B30200").unwrap());
        assert_eq!(at(-5.0), Rgb::from_hex("#FC8D59").unwrap());
        assert_eq!(at(0.0), Rgb::from_hex("#FFFFCC").unwrap());
        assert_eq!(at(7.5), Rgb::from_hex("#1C9099").unwrap());
        assert_eq!(at(25.0), Rgb::from_hex("#066C59").unwrap());
    }

    #[test]
    fn grayscale_midpoint() {
        assert_eq!(evaluate(ColorScheme::Grayscale, 0.5), Rgb::new(128, 128, 128));
    }

    #[test]
    fn clamping_below_zero() {
        assert_eq!(evaluate(ColorScheme::Ndvi, -0.5), Rgb::new(120, 70, 20));
    }

    #[test]
    fn serde_uses_hex_strings() {
        let json = serde_json::to_string(&Rgb::new(195, 20, 0)).unwrap();
        assert_eq!(json, "\"#c31400\"");
        let back: Rgb = serde_json::from_str("\"#C31400\"").unwrap();
        assert_eq!(back, Rgb::new(195, 20, 0));
    }
}
