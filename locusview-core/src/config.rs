//! Engine configuration
//!
//! Supports loading from locusview.toml files; every field has a default so
//! partial files are accepted.

use crate::annotation::StyleRules;
use crate::error::{EngineError, EngineResult};
use crate::panel::PanelSettings;
use crate::types::{AnchorMode, Rgb};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "locusview.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Instanced SDF glyphs with hover highlight
    #[default]
    Shapes,
    /// Two-pass density-driven blending for dense scatter data
    Density,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub interaction: InteractionConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Glyph diameter in pixels before the per-record size multiplier
    #[serde(default = "default_point_size")]
    pub point_size_px: f32,

    /// Opacity applied to records that are not protein coding
    #[serde(default = "default_non_coding_opacity")]
    pub non_coding_opacity: f32,

    /// Size multiplier for diamond and triangle glyphs
    #[serde(default = "default_annotated_size")]
    pub annotated_size_multiplier: f32,

    /// Highlight outline thickness as a fraction of the glyph radius
    #[serde(default = "default_outline_width")]
    pub outline_width: f32,

    #[serde(default = "default_outline_color")]
    pub outline_color: String,

    #[serde(default = "default_background_color")]
    pub background_color: String,

    #[serde(default)]
    pub mode: RenderMode,

    #[serde(default)]
    pub anchor: AnchorMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionConfig {
    #[serde(default = "default_hit_radius")]
    pub hit_radius_px: f64,

    /// Minimum spacing between processed pointer moves
    #[serde(default = "default_hover_throttle")]
    pub hover_throttle_ms: u64,

    #[serde(default = "default_min_domain_width")]
    pub min_domain_width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub panel_gap_px: f64,

    /// Padding added above and below the value extent, as a fraction of its span
    #[serde(default = "default_value_padding")]
    pub value_padding: f64,
}

fn default_point_size() -> f32 { 10.0 }
fn default_non_coding_opacity() -> f32 { 0.3 }
fn default_annotated_size() -> f32 { 1.3 }
fn default_outline_width() -> f32 { 0.25 }
fn default_outline_color() -> String { "#000000".to_string() }
fn default_background_color() -> String { "#ffffff".to_string() }
fn default_hit_radius() -> f64 { 8.0 }
fn default_hover_throttle() -> u64 { 16 }
fn default_min_domain_width() -> f64 { 1.0 }
fn default_value_padding() -> f64 { 0.05 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            point_size_px: default_point_size(),
            non_coding_opacity: default_non_coding_opacity(),
            annotated_size_multiplier: default_annotated_size(),
            outline_width: default_outline_width(),
            outline_color: default_outline_color(),
            background_color: default_background_color(),
            mode: RenderMode::default(),
            anchor: AnchorMode::default(),
        }
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            hit_radius_px: default_hit_radius(),
            hover_throttle_ms: default_hover_throttle(),
            min_domain_width: default_min_domain_width(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            panel_gap_px: 0.0,
            value_padding: default_value_padding(),
        }
    }
}

impl RenderConfig {
    pub fn outline_rgb(&self) -> Rgb {
        Rgb::from_hex(&self.outline_color).unwrap_or(Rgb::BLACK)
    }

    pub fn background_rgb(&self) -> Rgb {
        Rgb::from_hex(&self.background_color).unwrap_or(Rgb::WHITE)
    }

    pub fn style_rules(&self) -> StyleRules {
        StyleRules {
            non_coding_opacity: self.non_coding_opacity,
            annotated_size_multiplier: self.annotated_size_multiplier,
        }
    }
}

impl InteractionConfig {
    pub fn hover_throttle(&self) -> Duration {
        Duration::from_millis(self.hover_throttle_ms)
    }
}

impl EngineConfig {
    /// Load configuration from file, `locusview.toml` in the working
    /// directory, or defaults.
    pub fn load(config_path: Option<&Path>) -> EngineResult<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::info!("Using default configuration");
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::io(format!(
                "Failed to read configuration file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> EngineResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn example_toml() -> EngineResult<String> {
        Ok(toml::to_string_pretty(&Self::default())?)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(self.render.point_size_px > 0.0) {
            return Err(EngineError::config("render.point_size_px must be positive"));
        }
        if !(0.0..=1.0).contains(&self.render.non_coding_opacity) {
            return Err(EngineError::config("render.non_coding_opacity must be within 0..=1"));
        }
        if Rgb::from_hex(&self.render.outline_color).is_none() {
            return Err(EngineError::config(format!(
                "render.outline_color is not a #rrggbb color: {}",
                self.render.outline_color
            )));
        }
        if Rgb::from_hex(&self.render.background_color).is_none() {
            return Err(EngineError::config(format!(
                "render.background_color is not a #rrggbb color: {}",
                self.render.background_color
            )));
        }
        if !(self.interaction.hit_radius_px >= 0.0) {
            return Err(EngineError::config("interaction.hit_radius_px must not be negative"));
        }
        if !(self.interaction.min_domain_width > 0.0) {
            return Err(EngineError::config("interaction.min_domain_width must be positive"));
        }
        Ok(())
    }

    pub fn panel_settings(&self) -> PanelSettings {
        PanelSettings {
            gap_px: self.layout.panel_gap_px,
            min_domain_width: self.interaction.min_domain_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.render.point_size_px, 10.0);
        assert_eq!(config.interaction.hit_radius_px, 8.0);
        assert_eq!(config.interaction.hover_throttle(), Duration::from_millis(16));
        assert_eq!(config.render.mode, RenderMode::Shapes);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() -> EngineResult<()> {
        let mut config = EngineConfig::default();
        config.render.mode = RenderMode::Density;
        config.layout.panel_gap_px = 4.0;
        let temp_file = NamedTempFile::new()?;

        config.save_to_file(temp_file.path())?;
        let loaded = EngineConfig::load_from_file(temp_file.path())?;
        assert_eq!(loaded, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: EngineConfig = toml::from_str("[render]\nmode = \"density\"\n").unwrap();
        assert_eq!(config.render.mode, RenderMode::Density);
        assert_eq!(config.render.point_size_px, 10.0);
        assert_eq!(config.interaction.hover_throttle_ms, 16);
    }

    #[test]
    fn test_example_toml_generation() {
        let example = EngineConfig::example_toml().unwrap();
        assert!(example.contains("[render]"));
        assert!(example.contains("[interaction]"));
        assert!(example.contains("[layout]"));
    }

    #[test]
    fn test_validation_rejects_bad_color() {
        let mut config = EngineConfig::default();
        config.render.outline_color = "black".into();
        assert!(matches!(config.validate(), Err(EngineError::Config { .. })));
    }
}
