//! Caption styling presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Horizontal alignment of burned-in captions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionAlignment {
    Left,
    #[default]
    Center,
    Right,
}

impl CaptionAlignment {
    /// Numeric alignment code in the subtitle format (bottom row).
    pub fn ass_code(&self) -> u8 {
        match self {
            CaptionAlignment::Left => 1,
            CaptionAlignment::Center => 2,
            CaptionAlignment::Right => 3,
        }
    }
}

/// Resolved caption style used to render a subtitle track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyle {
    pub font: String,
    pub font_size: u32,
    /// Outline width in subtitle units
    pub outline: f32,
    /// Shadow depth in subtitle units
    pub shadow: f32,
    /// Vertical margin from the bottom edge in pixels
    pub margin_v: u32,
    pub alignment: CaptionAlignment,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self::preset_default()
    }
}

impl CaptionStyle {
    /// Standard readable style.
    pub fn preset_default() -> Self {
        Self {
            font: "Arial".to_string(),
            font_size: 48,
            outline: 2.0,
            shadow: 1.0,
            margin_v: 80,
            alignment: CaptionAlignment::Center,
        }
    }

    /// Heavy outline for busy footage.
    pub fn preset_bold() -> Self {
        Self {
            font: "Arial Black".to_string(),
            font_size: 54,
            outline: 3.5,
            shadow: 2.0,
            margin_v: 90,
            alignment: CaptionAlignment::Center,
        }
    }

    /// Small, unobtrusive captions.
    pub fn preset_minimal() -> Self {
        Self {
            font: "Helvetica".to_string(),
            font_size: 36,
            outline: 1.0,
            shadow: 0.0,
            margin_v: 60,
            alignment: CaptionAlignment::Center,
        }
    }

    /// Apply an override field-by-field; unset fields keep the preset value.
    pub fn merged(&self, overrides: &CaptionStyleOverride) -> Self {
        Self {
            font: overrides.font.clone().unwrap_or_else(|| self.font.clone()),
            font_size: overrides.font_size.unwrap_or(self.font_size),
            outline: overrides.outline.unwrap_or(self.outline),
            shadow: overrides.shadow.unwrap_or(self.shadow),
            margin_v: overrides.margin_v.unwrap_or(self.margin_v),
            alignment: overrides.alignment.unwrap_or(self.alignment),
        }
    }
}

/// Named preset identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptionPreset {
    #[default]
    Default,
    Bold,
    Minimal,
}

impl CaptionPreset {
    pub fn style(&self) -> CaptionStyle {
        match self {
            CaptionPreset::Default => CaptionStyle::preset_default(),
            CaptionPreset::Bold => CaptionStyle::preset_bold(),
            CaptionPreset::Minimal => CaptionStyle::preset_minimal(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionPreset::Default => "default",
            CaptionPreset::Bold => "bold",
            CaptionPreset::Minimal => "minimal",
        }
    }
}

impl fmt::Display for CaptionPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CaptionPreset {
    type Err = CaptionPresetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(CaptionPreset::Default),
            "bold" => Ok(CaptionPreset::Bold),
            "minimal" => Ok(CaptionPreset::Minimal),
            _ => Err(CaptionPresetParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown caption preset: {0}")]
pub struct CaptionPresetParseError(String);

/// Partial style; every field optional so overrides compose with presets
/// field-by-field rather than wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CaptionStyleOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outline: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin_v: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<CaptionAlignment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parse() {
        assert_eq!("bold".parse::<CaptionPreset>().unwrap(), CaptionPreset::Bold);
        assert_eq!(
            "MINIMAL".parse::<CaptionPreset>().unwrap(),
            CaptionPreset::Minimal
        );
        assert!("huge".parse::<CaptionPreset>().is_err());
    }

    #[test]
    fn test_merge_is_field_by_field() {
        let base = CaptionStyle::preset_default();
        let overrides = CaptionStyleOverride {
            font_size: Some(64),
            alignment: Some(CaptionAlignment::Left),
            ..Default::default()
        };

        let merged = base.merged(&overrides);
        assert_eq!(merged.font_size, 64);
        assert_eq!(merged.alignment, CaptionAlignment::Left);
        // Untouched fields keep the preset values
        assert_eq!(merged.font, base.font);
        assert_eq!(merged.margin_v, base.margin_v);
    }

    #[test]
    fn test_empty_override_is_identity() {
        let base = CaptionStyle::preset_bold();
        assert_eq!(base.merged(&CaptionStyleOverride::default()), base);
    }
}
