use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::ConfigError;

/// Number of color slots the gradient program consumes.
pub const COLOR_SLOTS: usize = 6;

const EXPORT_HEADER: &str = "# neat-gradient configuration";

/// User-facing gradient configuration.
///
/// Every field has a default, so partially specified documents import cleanly.
/// Field names serialize in camelCase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GradientConfig {
    #[serde(deserialize_with = "deserialize_colors")]
    pub colors: Vec<ColorSlot>,

    pub speed: f32,
    pub horizontal_pressure: f32,
    pub vertical_pressure: f32,
    pub wave_frequency_x: f32,
    pub wave_frequency_y: f32,
    pub wave_amplitude: f32,

    pub shadows: f32,
    pub highlights: f32,
    pub color_saturation: f32,
    pub color_brightness: f32,
    pub color_blending: f32,

    pub background_color: String,
    pub background_alpha: f32,
    pub wireframe: bool,
    pub resolution: f32,

    pub grain_intensity: f32,
    pub grain_sparsity: f32,
    pub grain_scale: f32,
    pub grain_speed: f32,

    pub y_offset: f32,
    pub y_offset_wave_multiplier: f32,
    pub y_offset_color_multiplier: f32,
    pub y_offset_flow_multiplier: f32,

    pub flow_distortion_a: f32,
    pub flow_distortion_b: f32,
    pub flow_scale: f32,
    pub flow_ease: f32,
    pub flow_enabled: bool,

    pub mouse_distortion_strength: f32,
    pub mouse_distortion_radius: f32,
    pub mouse_decay_rate: f32,
    pub mouse_darken: f32,

    pub enable_procedural_texture: bool,
    pub texture_void_likelihood: f32,
    pub texture_void_width_min: f32,
    pub texture_void_width_max: f32,
    pub texture_band_density: f32,
    pub texture_color_blending: f32,
    pub texture_seed: u32,
    pub texture_ease: f32,
    pub procedural_background_color: String,
    pub texture_shape_triangles: u32,
    pub texture_shape_circles: u32,
    pub texture_shape_bars: u32,
    pub texture_shape_squiggles: u32,
}

impl Default for GradientConfig {
    fn default() -> Self {
        Self {
            colors: default_colors(),
            speed: 4.0,
            horizontal_pressure: 3.0,
            vertical_pressure: 3.0,
            wave_frequency_x: 5.0,
            wave_frequency_y: 5.0,
            wave_amplitude: 3.0,
            shadows: 4.0,
            highlights: 4.0,
            color_saturation: 0.0,
            color_brightness: 1.0,
            color_blending: 5.0,
            background_color: "#FFFFFF".to_owned(),
            background_alpha: 1.0,
            wireframe: false,
            resolution: 1.0,
            grain_intensity: 0.55,
            grain_sparsity: 0.0,
            grain_scale: 2.0,
            grain_speed: 0.1,
            y_offset: 0.0,
            y_offset_wave_multiplier: 0.004,
            y_offset_color_multiplier: 0.004,
            y_offset_flow_multiplier: 0.004,
            flow_distortion_a: 0.0,
            flow_distortion_b: 0.0,
            flow_scale: 1.0,
            flow_ease: 0.0,
            flow_enabled: true,
            mouse_distortion_strength: 0.0,
            mouse_distortion_radius: 0.25,
            mouse_decay_rate: 0.96,
            mouse_darken: 0.0,
            enable_procedural_texture: false,
            texture_void_likelihood: 0.45,
            texture_void_width_min: 200.0,
            texture_void_width_max: 486.0,
            texture_band_density: 2.15,
            texture_color_blending: 0.01,
            texture_seed: 333,
            texture_ease: 0.5,
            procedural_background_color: "#000000".to_owned(),
            texture_shape_triangles: 20,
            texture_shape_circles: 15,
            texture_shape_bars: 15,
            texture_shape_squiggles: 10,
        }
    }
}

impl GradientConfig {
    /// Parse configuration text.
    ///
    /// Accepts JSON and anything YAML accepts on top of it (comments, unquoted
    /// keys). Unknown keys are ignored, missing keys fall back to defaults, and
    /// partially specified colors inherit from the default preset.
    pub fn import_str(text: &str) -> Result<Self, ConfigError> {
        let value: serde_yaml::Value = serde_yaml::from_str(text).map_err(parse_error)?;
        if !value.is_mapping() {
            return Err(ConfigError::NotAnObject);
        }
        serde_yaml::from_value(value).map_err(parse_error)
    }

    /// Human-editable export text; `import_str` reads it back unchanged.
    pub fn export_string(&self) -> String {
        let body = serde_json::to_string_pretty(self)
            .unwrap_or_else(|error| format!("{{ \"error\": \"{error}\" }}"));
        format!("{EXPORT_HEADER}\n{body}\n")
    }

    /// Colors that take part in the gradient, in slot order.
    pub fn active_colors(&self) -> impl Iterator<Item = &ColorSlot> {
        self.colors
            .iter()
            .take(COLOR_SLOTS)
            .filter(|slot| slot.enabled)
    }
}

pub fn load_config(path: &Path) -> Result<GradientConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    GradientConfig::import_str(&contents)
        .with_context(|| format!("failed to import config {}", path.display()))
}

fn parse_error(error: serde_yaml::Error) -> ConfigError {
    let location = error
        .location()
        .map(|location| format!("line {}, column {}", location.line(), location.column()))
        .unwrap_or_else(|| "unknown location".to_owned());
    ConfigError::Parse {
        location,
        message: error.to_string(),
    }
}

/// One entry of the color list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorSlot {
    pub color_value: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub influence: Option<f32>,
}

impl ColorSlot {
    pub fn new(color_value: impl Into<String>, enabled: bool) -> Self {
        Self {
            color_value: color_value.into(),
            enabled,
            influence: None,
        }
    }

    pub fn with_influence(mut self, influence: f32) -> Self {
        self.influence = Some(influence);
        self
    }
}

pub fn default_colors() -> Vec<ColorSlot> {
    vec![
        ColorSlot::new("#FF5373", true),
        ColorSlot::new("#FFC858", true),
        ColorSlot::new("#17E7FF", true),
        ColorSlot::new("#6D3BFF", true),
        ColorSlot::new("#F5E1E5", false),
    ]
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialColorSlot {
    color_value: Option<String>,
    enabled: Option<bool>,
    influence: Option<f32>,
}

fn deserialize_colors<'de, D>(deserializer: D) -> Result<Vec<ColorSlot>, D::Error>
where
    D: Deserializer<'de>,
{
    let partial = Vec::<PartialColorSlot>::deserialize(deserializer)?;
    let preset = default_colors();
    Ok(partial
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let fallback = preset
                .get(index)
                .cloned()
                .unwrap_or_else(|| ColorSlot::new("#000000", true));
            ColorSlot {
                color_value: entry.color_value.unwrap_or(fallback.color_value),
                enabled: entry.enabled.unwrap_or(fallback.enabled),
                influence: entry.influence.or(fallback.influence),
            }
        })
        .collect())
}

/// Linear RGB triple in `[0, 1]`, parsed from CSS-style hex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Accepts `#RRGGBB`, `RRGGBB`, `#RGB` and `RGB`.
    pub fn from_hex(value: &str) -> Option<Self> {
        let digits = value.trim().trim_start_matches('#');
        let expanded: String = match digits.len() {
            3 => digits.chars().flat_map(|c| [c, c]).collect(),
            6 => digits.to_owned(),
            _ => return None,
        };
        let packed = u32::from_str_radix(&expanded, 16).ok()?;
        Some(Self::from_bytes([
            (packed >> 16) as u8,
            (packed >> 8) as u8,
            packed as u8,
        ]))
    }

    /// Like [`Rgb::from_hex`], but an unreadable value renders as black.
    pub fn parse_or_black(value: &str) -> Self {
        Self::from_hex(value).unwrap_or_else(|| {
            warn!(color = value, "unparseable color hex, using black");
            Self::BLACK
        })
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self::new(
            f32::from(bytes[0]) / 255.0,
            f32::from(bytes[1]) / 255.0,
            f32::from(bytes[2]) / 255.0,
        )
    }

    pub fn to_bytes(self) -> [u8; 3] {
        [unit_to_byte(self.r), unit_to_byte(self.g), unit_to_byte(self.b)]
    }

    pub fn mix(self, other: Self, amount: f32) -> Self {
        Self::new(
            self.r + (other.r - self.r) * amount,
            self.g + (other.g - self.g) * amount,
            self.b + (other.b - self.b) * amount,
        )
    }

    pub fn as_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.to_bytes();
        write!(f, "#{r:02X}{g:02X}{b:02X}")
    }
}

fn unit_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing_accepts_short_and_long_forms() {
        assert_eq!(Rgb::from_hex("#FFFFFF"), Some(Rgb::WHITE));
        assert_eq!(Rgb::from_hex("000"), Some(Rgb::BLACK));
        assert_eq!(Rgb::from_hex("#ff5373").map(Rgb::to_bytes), Some([255, 83, 115]));
        assert_eq!(Rgb::from_hex("#12345"), None);
        assert_eq!(Rgb::from_hex("#GGGGGG"), None);
    }

    #[test]
    fn display_round_trips_hex() {
        let color = Rgb::from_hex("#6D3BFF").expect("hex should parse");
        assert_eq!(color.to_string(), "#6D3BFF");
    }

    #[test]
    fn unparseable_hex_falls_back_to_black() {
        assert_eq!(Rgb::parse_or_black("not-a-color"), Rgb::BLACK);
    }

    #[test]
    fn default_preset_has_four_enabled_colors() {
        let config = GradientConfig::default();
        assert_eq!(config.active_colors().count(), 4);
    }

    #[test]
    fn import_ignores_unknown_fields_and_keeps_defaults() {
        let config = GradientConfig::import_str(r#"{"speed": 8, "someFutureField": [1, 2]}"#)
            .expect("import should succeed");
        assert_eq!(config.speed, 8.0);
        assert_eq!(config.wave_amplitude, 3.0);
        assert_eq!(config.colors, default_colors());
    }
}
