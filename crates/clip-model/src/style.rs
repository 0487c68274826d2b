//! Text style descriptors and colors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An 8-bit RGBA color.
///
/// Serialized as a hex string (`#RRGGBB` or `#RRGGBBAA`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba(pub [u8; 4]);

/// Error returned for unrecognized color strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color: {0:?}")]
pub struct ColorParseError(pub String);

impl Rgba {
    pub const BLACK: Rgba = Rgba([0, 0, 0, 255]);
    pub const WHITE: Rgba = Rgba([255, 255, 255, 255]);
    pub const TRANSPARENT: Rgba = Rgba([0, 0, 0, 0]);

    pub fn alpha(&self) -> u8 {
        self.0[3]
    }

    /// Color in the engine's notation: `0xRRGGBB`, with `@alpha` when translucent.
    pub fn to_ffmpeg(&self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("0x{r:02X}{g:02X}{b:02X}")
        } else {
            format!("0x{r:02X}{g:02X}{b:02X}@{:.3}", a as f64 / 255.0)
        }
    }
}

impl FromStr for Rgba {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let named = match trimmed.to_ascii_lowercase().as_str() {
            "black" => Some(Rgba::BLACK),
            "white" => Some(Rgba::WHITE),
            "transparent" => Some(Rgba::TRANSPARENT),
            "red" => Some(Rgba([255, 0, 0, 255])),
            "green" => Some(Rgba([0, 128, 0, 255])),
            "blue" => Some(Rgba([0, 0, 255, 255])),
            "yellow" => Some(Rgba([255, 255, 0, 255])),
            _ => None,
        };
        if let Some(color) = named {
            return Ok(color);
        }

        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| ColorParseError(s.to_string()))?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ColorParseError(s.to_string()));
        }

        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16);
        let short = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).map(|v| v * 17);

        let parsed = match hex.len() {
            3 => short(0).and_then(|r| Ok([r, short(1)?, short(2)?, 255])),
            6 => channel(0).and_then(|r| Ok([r, channel(2)?, channel(4)?, 255])),
            8 => channel(0).and_then(|r| Ok([r, channel(2)?, channel(4)?, channel(6)?])),
            _ => return Err(ColorParseError(s.to_string())),
        };
        parsed.map(Rgba).map_err(|_| ColorParseError(s.to_string()))
    }
}

impl TryFrom<String> for Rgba {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Rgba> for String {
    fn from(value: Rgba) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.0;
        if a == 255 {
            write!(f, "#{r:02x}{g:02x}{b:02x}")
        } else {
            write!(f, "#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

/// Font weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontWeight {
    #[default]
    Normal,
    Bold,
}

/// Font slant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FontSlant {
    #[default]
    Normal,
    Italic,
}

/// Horizontal text alignment within the raster width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    Left,
    #[default]
    Center,
    Right,
}

/// Largest accepted font size, in pixels.
pub const MAX_FONT_SIZE: f32 = 512.0;

/// Largest accepted stroke width, in pixels.
pub const MAX_STROKE_WIDTH: u32 = 64;

/// Everything the rasterizer needs to draw one text element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StyleDescriptor {
    /// Font family name (resolved through the font resolver).
    pub font_family: String,
    /// Font size in pixels.
    pub font_size: f32,
    /// Fill color.
    pub color: Rgba,
    pub weight: FontWeight,
    pub slant: FontSlant,
    /// Stroke width in pixels (0 disables the stroke).
    pub stroke_width: u32,
    pub stroke_color: Rgba,
    pub align: TextAlign,
}

impl Default for StyleDescriptor {
    fn default() -> Self {
        Self::caption_default()
    }
}

impl StyleDescriptor {
    pub fn title_default() -> Self {
        Self {
            font_family: "Montserrat".to_string(),
            font_size: 72.0,
            color: Rgba::WHITE,
            weight: FontWeight::Bold,
            slant: FontSlant::Normal,
            stroke_width: 3,
            stroke_color: Rgba::BLACK,
            align: TextAlign::Center,
        }
    }

    pub fn caption_default() -> Self {
        Self {
            font_family: "Montserrat".to_string(),
            font_size: 64.0,
            color: Rgba([255, 255, 0, 255]),
            weight: FontWeight::Bold,
            slant: FontSlant::Normal,
            stroke_width: 4,
            stroke_color: Rgba::BLACK,
            align: TextAlign::Center,
        }
    }

    pub fn credit_default() -> Self {
        Self {
            font_family: "Montserrat".to_string(),
            font_size: 40.0,
            color: Rgba::WHITE,
            weight: FontWeight::Normal,
            slant: FontSlant::Italic,
            stroke_width: 2,
            stroke_color: Rgba::BLACK,
            align: TextAlign::Center,
        }
    }

    /// Line height used for wrapping and canvas sizing.
    pub fn line_height(&self) -> f32 {
        self.font_size * 1.2
    }

    /// Check that the size and stroke can be rasterized.
    pub fn check(&self) -> Result<(), String> {
        if !self.font_size.is_finite() || self.font_size <= 0.0 || self.font_size > MAX_FONT_SIZE {
            return Err(format!(
                "font size must be in (0, {MAX_FONT_SIZE}] pixels (got {})",
                self.font_size
            ));
        }
        if self.stroke_width > MAX_STROKE_WIDTH {
            return Err(format!(
                "stroke width must be at most {MAX_STROKE_WIDTH} pixels (got {})",
                self.stroke_width
            ));
        }
        Ok(())
    }

    /// Copy with size and stroke forced into the accepted ranges.
    pub fn clamped(&self) -> Self {
        let font_size = if self.font_size.is_finite() {
            self.font_size.clamp(1.0, MAX_FONT_SIZE)
        } else {
            1.0
        };
        Self {
            font_size,
            stroke_width: self.stroke_width.min(MAX_STROKE_WIDTH),
            ..self.clone()
        }
    }
}

/// A partial style. Set fields replace those of an element's own default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StylePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgba>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<FontWeight>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slant: Option<FontSlant>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<Rgba>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<TextAlign>,
}

impl StylePatch {
    pub fn apply(&self, base: StyleDescriptor) -> StyleDescriptor {
        StyleDescriptor {
            font_family: self.font_family.clone().unwrap_or(base.font_family),
            font_size: self.font_size.unwrap_or(base.font_size),
            color: self.color.unwrap_or(base.color),
            weight: self.weight.unwrap_or(base.weight),
            slant: self.slant.unwrap_or(base.slant),
            stroke_width: self.stroke_width.unwrap_or(base.stroke_width),
            stroke_color: self.stroke_color.unwrap_or(base.stroke_color),
            align: self.align.unwrap_or(base.align),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parsing() {
        assert_eq!("#fff".parse::<Rgba>().unwrap(), Rgba::WHITE);
        assert_eq!("#FF8000".parse::<Rgba>().unwrap(), Rgba([255, 128, 0, 255]));
        assert_eq!("0x00000080".parse::<Rgba>().unwrap(), Rgba([0, 0, 0, 128]));
        assert_eq!("Yellow".parse::<Rgba>().unwrap(), Rgba([255, 255, 0, 255]));
        assert!("#12345".parse::<Rgba>().is_err());
        assert!("chartreuse-ish".parse::<Rgba>().is_err());
        assert!("#gg0000".parse::<Rgba>().is_err());
    }

    #[test]
    fn test_color_ffmpeg_notation() {
        assert_eq!(Rgba([26, 26, 26, 255]).to_ffmpeg(), "0x1A1A1A");
        assert_eq!(Rgba([0, 0, 0, 0]).to_ffmpeg(), "0x000000@0.000");
    }

    #[test]
    fn test_style_deserializes_partially() {
        let style: StyleDescriptor =
            serde_json::from_str(r##"{ "fontSize": 30, "color": "#ff0000", "align": "left" }"##)
                .unwrap();
        assert_eq!(style.font_size, 30.0);
        assert_eq!(style.color, Rgba([255, 0, 0, 255]));
        assert_eq!(style.align, TextAlign::Left);
        assert_eq!(style.font_family, "Montserrat");
        assert!((style.line_height() - 36.0).abs() < 1e-4);
    }

    #[test]
    fn test_patch_keeps_unset_fields_of_base() {
        let patch: StylePatch = serde_json::from_str(r#"{ "fontSize": 80 }"#).unwrap();
        let title = patch.apply(StyleDescriptor::title_default());
        assert_eq!(title.font_size, 80.0);
        assert_eq!(title.color, Rgba::WHITE);
        assert_eq!(title.stroke_width, 3);

        let credit = patch.apply(StyleDescriptor::credit_default());
        assert_eq!(credit.slant, FontSlant::Italic);
        assert_eq!(credit.weight, FontWeight::Normal);
    }

    #[test]
    fn test_check_bounds_size_and_stroke() {
        let ok = StyleDescriptor::caption_default();
        assert!(ok.check().is_ok());
        for font_size in [0.0, -4.0, f32::NAN, f32::INFINITY, 1e9] {
            let style = StyleDescriptor { font_size, ..ok.clone() };
            assert!(style.check().is_err(), "font size {font_size} accepted");
        }
        let thick = StyleDescriptor {
            stroke_width: MAX_STROKE_WIDTH + 1,
            ..ok.clone()
        };
        assert!(thick.check().is_err());
    }

    #[test]
    fn test_clamped_is_always_accepted() {
        let wild = StyleDescriptor {
            font_size: 1e9,
            stroke_width: u32::MAX,
            ..StyleDescriptor::caption_default()
        };
        let clamped = wild.clamped();
        assert_eq!(clamped.font_size, MAX_FONT_SIZE);
        assert_eq!(clamped.stroke_width, MAX_STROKE_WIDTH);
        assert!(clamped.check().is_ok());
        let nan = StyleDescriptor {
            font_size: f32::NAN,
            ..StyleDescriptor::caption_default()
        };
        assert_eq!(nan.clamped().font_size, 1.0);
    }
}
