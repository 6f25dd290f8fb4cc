//! Per-frame uniform data shared by every backend.

use bytemuck::{Pod, Zeroable};
use locusview_core::config::RenderConfig;
use locusview_core::{split, Domain, LinearScale, Panel, Rgb, ViewportSize};

/// Viewport-wide uniforms. Layout matches `Globals` in the WGSL sources.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub point_size: f32,
    pub outline_width: f32,
    pub outline_color: [f32; 4],
}

/// Per-panel uniforms, bound with a dynamic offset per draw.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PanelUniforms {
    pub start_high: f32,
    pub start_low: f32,
    /// Pixels per coordinate unit
    pub x_scale: f32,
    pub x_offset: f32,
    pub width: f32,
    pub height: f32,
    /// Pixel row of `value_min`
    pub y_origin: f32,
    /// Pixels per value unit, negative so larger values sit higher
    pub y_ratio: f32,
    pub value_min: f32,
    pub _padding: [f32; 3],
}

impl PanelUniforms {
    pub fn from_panel(panel: &Panel, value_domain: Domain) -> Self {
        let (start_high, start_low) = split(panel.domain.start);
        let value_scale = LinearScale::new(
            (value_domain.start, value_domain.end),
            (panel.pixel_height, 0.0),
        );
        Self {
            start_high,
            start_low,
            x_scale: panel.x_ratio() as f32,
            x_offset: panel.x_offset as f32,
            width: panel.pixel_width as f32,
            height: panel.pixel_height as f32,
            y_origin: value_scale.range.0 as f32,
            y_ratio: value_scale.ratio() as f32,
            value_min: value_domain.start as f32,
            _padding: [0.0; 3],
        }
    }

    /// Pixel row of a value inside the panel.
    pub fn project_y(&self, value: f32) -> f32 {
        self.y_origin + (value - self.value_min) * self.y_ratio
    }

    /// Scissor rectangle `(x, y, width, height)` clamped to the target.
    pub fn scissor(&self, target_width: u32, target_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x_offset.max(0.0).floor() as u32;
        let x1 = ((self.x_offset + self.width).ceil().max(0.0) as u32).min(target_width);
        let y1 = (self.height.ceil().max(0.0) as u32).min(target_height);
        if x0 >= x1 || y1 == 0 {
            return None;
        }
        Some((x0, 0, x1 - x0, y1))
    }
}

/// Appearance settings that do not change per record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStyle {
    pub point_size: f32,
    pub outline_width: f32,
    pub outline_color: Rgb,
    pub background: Rgb,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

impl RenderStyle {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            point_size: config.point_size_px,
            outline_width: config.outline_width,
            outline_color: config.outline_rgb(),
            background: config.background_rgb(),
        }
    }
}

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameParams {
    pub globals: GlobalUniforms,
    pub panels: Vec<PanelUniforms>,
    pub background: [f32; 4],
}

impl FrameParams {
    pub fn build(
        viewport: ViewportSize,
        panels: &[Panel],
        value_domain: Domain,
        style: &RenderStyle,
    ) -> Self {
        let [or, og, ob] = style.outline_color.to_unit();
        let [br, bg, bb] = style.background.to_unit();
        Self {
            globals: GlobalUniforms {
                viewport_width: viewport.width as f32,
                viewport_height: viewport.height as f32,
                point_size: style.point_size,
                outline_width: style.outline_width,
                outline_color: [or, og, ob, 1.0],
            },
            panels: panels
                .iter()
                .map(|p| PanelUniforms::from_panel(p, value_domain))
                .collect(),
            background: [br, bg, bb, 1.0],
        }
    }
}
