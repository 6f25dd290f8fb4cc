/*!
# WGSL Shader Collection

Shaders for the LocusView instanced renderers:
- Emulated double-precision coordinate transformation
- Shared instance vertex stage with per-panel windowing
- SDF glyph fragment stage with hover outline
- Two-pass density accumulation and blending
*/

/// High-precision coordinate transformation utilities
pub const TRANSFORM_UTILS: &str = include_str!("transform_utils.wgsl");

/// Uniform layouts, instance attributes and the quad vertex stage
pub const INSTANCE_COMMON: &str = include_str!("instance_common.wgsl");

/// Circle, diamond and triangle glyphs
pub const SHAPES_SHADER: &str = include_str!("shapes.wgsl");

/// Density pass 1: additive per-pixel coverage count
pub const DENSITY_ACCUMULATE_SHADER: &str = include_str!("density_accumulate.wgsl");

/// Density pass 2: density-driven alpha composite
pub const DENSITY_BLEND_SHADER: &str = include_str!("density_blend.wgsl");

/// Full source for one pipeline: the shared prelude followed by its fragment stage.
pub fn compose(fragment: &str) -> String {
    format!("{}\n{}\n{}", TRANSFORM_UTILS, INSTANCE_COMMON, fragment)
}
