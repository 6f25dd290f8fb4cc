//! CPU rasteriser mirroring the WGSL pipelines.
//!
//! Positions are projected with the same compensated f32 arithmetic the vertex
//! stage uses, so pixel placement matches the GPU path. Used for headless
//! export, tests, and hosts without an adapter.

use crate::frame::{FrameParams, PanelUniforms};
use crate::{ContextState, RenderBackend};
use glam::Vec2;
use image::{Rgba, RgbaImage};
use locusview_core::codec::{project, DoubleFloat};
use locusview_core::{density_alpha, Attribute, EngineError, EngineResult, Rgb, ShapeClass};

const TRIANGLE_SIZE: f32 = 0.9;
const TRIANGLE_SHIFT: f32 = 0.2598;

pub fn sd_circle(p: Vec2) -> f32 {
    p.length() - 1.0
}

pub fn sd_diamond(p: Vec2) -> f32 {
    (p.x.abs() + p.y.abs() - 1.0) * std::f32::consts::FRAC_1_SQRT_2
}

/// Equilateral triangle pointing up on screen (y grows downwards).
pub fn sd_triangle(p: Vec2) -> f32 {
    let k = 3.0f32.sqrt();
    let r = TRIANGLE_SIZE;
    let mut q = Vec2::new(p.x.abs() - r, -p.y + TRIANGLE_SHIFT + r / k);
    if q.x + k * q.y > 0.0 {
        q = Vec2::new(q.x - k * q.y, -k * q.x - q.y) / 2.0;
    }
    q.x -= q.x.clamp(-2.0 * r, 0.0);
    -q.length() * wgsl_sign(q.y)
}

/// Signed distance to the glyph boundary in glyph units; negative inside.
pub fn shape_distance(shape: ShapeClass, p: Vec2) -> f32 {
    match shape {
        ShapeClass::Circle => sd_circle(p),
        ShapeClass::Diamond => sd_diamond(p),
        ShapeClass::Triangle => sd_triangle(p),
    }
}

// WGSL sign() returns 0 for 0.
fn wgsl_sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[derive(Debug, Clone, Copy)]
struct Instance {
    position: DoubleFloat,
    value: f32,
    color: [f32; 3],
    shape: ShapeClass,
    opacity: f32,
    size_multiplier: f32,
    highlight: bool,
}

/// One covered pixel of a glyph quad.
#[derive(Debug, Clone, Copy)]
struct Fragment {
    x: u32,
    y: u32,
    local: Vec2,
    radius: f32,
}

pub struct SoftwareBackend {
    state: ContextState,
    width: u32,
    height: u32,
    buffers: [Vec<u32>; 8],
    color: Vec<[f32; 4]>,
    density: Vec<f32>,
    density_size: (u32, u32),
    density_allocations: usize,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            state: ContextState::Ready,
            width: 0,
            height: 0,
            buffers: Default::default(),
            color: Vec::new(),
            density: Vec::new(),
            density_size: (0, 0),
            density_allocations: 0,
        }
    }

    /// Accumulated coverage at a pixel after the last density draw.
    pub fn density_at(&self, x: u32, y: u32) -> Option<f32> {
        let (w, h) = self.density_size;
        if x >= w || y >= h {
            return None;
        }
        self.density.get((y * w + x) as usize).copied()
    }

    /// How many times the density target was (re)allocated.
    pub fn density_allocations(&self) -> usize {
        self.density_allocations
    }

    /// Current contents of one attribute buffer.
    pub fn buffer_words(&self, attribute: Attribute) -> &[u32] {
        &self.buffers[attribute.slot() as usize]
    }

    fn ensure_ready(&self) -> EngineResult<()> {
        match self.state {
            ContextState::Lost => Err(EngineError::ContextLost),
            ContextState::Ready if self.width == 0 || self.height == 0 => {
                Err(EngineError::resource_init("software backend used before initialize"))
            }
            ContextState::Ready => Ok(()),
        }
    }

    fn instance_count(&self) -> Option<usize> {
        let n = self.buffers[0].len();
        if self.buffers.iter().all(|b| b.len() == n) {
            Some(n)
        } else {
            log::debug!("Attribute buffers disagree in length; skipping instances this frame");
            None
        }
    }

    fn instances(&self) -> Vec<Instance> {
        let Some(n) = self.instance_count() else {
            return Vec::new();
        };
        let word = |attr: Attribute, i: usize| self.buffers[attr.slot() as usize][i];
        let float = |attr: Attribute, i: usize| f32::from_bits(word(attr, i));

        (0..n)
            .map(|i| Instance {
                position: DoubleFloat::new(
                    float(Attribute::PositionHigh, i),
                    float(Attribute::PositionLow, i),
                ),
                value: float(Attribute::Value, i),
                color: Rgb::from_gpu_float(float(Attribute::Color, i)).to_unit(),
                shape: ShapeClass::from_code(word(Attribute::ShapeClass, i)),
                opacity: float(Attribute::Opacity, i),
                size_multiplier: float(Attribute::SizeMultiplier, i),
                highlight: word(Attribute::Highlight, i) != 0,
            })
            .collect()
    }

    fn clear(&mut self, background: [f32; 4]) {
        self.color.clear();
        self.color
            .resize((self.width * self.height) as usize, background);
    }

    fn blend(&mut self, x: u32, y: u32, rgb: [f32; 3], alpha: f32) {
        let Some(dst) = self.color.get_mut((y * self.width + x) as usize) else {
            return;
        };
        let a = alpha.clamp(0.0, 1.0);
        for c in 0..3 {
            dst[c] = rgb[c] * a + dst[c] * (1.0 - a);
        }
        dst[3] = a + dst[3] * (1.0 - a);
    }

    /// Pixels covered by an instance's quad inside `panel`, in row order.
    fn fragments(
        &self,
        frame: &FrameParams,
        panel: &PanelUniforms,
        instance: &Instance,
    ) -> Vec<Fragment> {
        let origin = DoubleFloat::new(panel.start_high, panel.start_low);
        let local_x = project(instance.position, origin, panel.x_scale);
        if !(local_x >= 0.0 && local_x <= panel.width) {
            return Vec::new();
        }
        let Some((sx, sy, sw, sh)) = panel.scissor(self.width, self.height) else {
            return Vec::new();
        };

        let radius = (frame.globals.point_size * 0.5 * instance.size_multiplier).max(0.5);
        let extent = radius + 1.0;
        let center = Vec2::new(panel.x_offset + local_x, panel.project_y(instance.value));

        let x0 = ((center.x - extent).floor().max(sx as f32)) as u32;
        let x1 = ((center.x + extent).ceil().max(0.0) as u32).min(sx + sw);
        let y0 = ((center.y - extent).floor().max(sy as f32)) as u32;
        let y1 = ((center.y + extent).ceil().max(0.0) as u32).min(sy + sh);

        let mut out = Vec::new();
        for y in y0..y1 {
            for x in x0..x1 {
                let offset = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - center;
                if offset.x.abs() > extent || offset.y.abs() > extent {
                    continue;
                }
                out.push(Fragment {
                    x,
                    y,
                    local: offset / radius,
                    radius,
                });
            }
        }
        out
    }

    fn ensure_density_target(&mut self) {
        let size = (self.width, self.height);
        if self.density_size != size {
            self.density = vec![0.0; (size.0 * size.1) as usize];
            self.density_size = size;
            self.density_allocations += 1;
            log::debug!("Allocated {}x{} density target", size.0, size.1);
        } else {
            self.density.iter_mut().for_each(|d| *d = 0.0);
        }
    }
}

impl RenderBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn state(&self) -> ContextState {
        self.state
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn initialize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            return Err(EngineError::resource_init(format!(
                "render target must be non-empty, got {}x{}",
                width, height
            )));
        }
        self.width = width;
        self.height = height;
        self.buffers = Default::default();
        self.color = vec![[0.0; 4]; (width * height) as usize];
        self.density = Vec::new();
        self.density_size = (0, 0);
        self.state = ContextState::Ready;
        log::debug!("Software backend initialized at {}x{}", width, height);
        Ok(())
    }

    fn reallocate(&mut self, attribute: Attribute, data: &[u8]) -> EngineResult<()> {
        self.ensure_ready()?;
        if data.len() % Attribute::STRIDE as usize != 0 {
            return Err(EngineError::invalid_buffer_write(
                attribute.name(),
                format!("{} bytes is not a whole number of elements", data.len()),
            ));
        }
        self.buffers[attribute.slot() as usize] = data
            .chunks_exact(4)
            .map(|c| u32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(())
    }

    fn write(&mut self, attribute: Attribute, offset: u64, data: &[u8]) -> EngineResult<()> {
        self.ensure_ready()?;
        let stride = Attribute::STRIDE;
        if offset % stride != 0 || data.len() as u64 % stride != 0 {
            return Err(EngineError::invalid_buffer_write(
                attribute.name(),
                format!("offset {} / length {} not aligned to {}", offset, data.len(), stride),
            ));
        }
        let buffer = &mut self.buffers[attribute.slot() as usize];
        let first = (offset / stride) as usize;
        let count = data.len() / stride as usize;
        if first + count > buffer.len() {
            return Err(EngineError::invalid_buffer_write(
                attribute.name(),
                format!(
                    "write of {} elements at {} exceeds buffer of {}",
                    count,
                    first,
                    buffer.len()
                ),
            ));
        }
        for (slot, c) in buffer[first..first + count].iter_mut().zip(data.chunks_exact(4)) {
            *slot = u32::from_ne_bytes([c[0], c[1], c[2], c[3]]);
        }
        Ok(())
    }

    fn draw_shapes(&mut self, frame: &FrameParams) -> EngineResult<()> {
        self.ensure_ready()?;
        self.clear(frame.background);
        let instances = self.instances();
        let outline = frame.globals.outline_color;
        let outline_width = frame.globals.outline_width;

        for panel in &frame.panels {
            for instance in &instances {
                for f in self.fragments(frame, panel, instance) {
                    let d = shape_distance(instance.shape, f.local);
                    if d > 0.0 {
                        continue;
                    }
                    let aa = 1.0 / f.radius;
                    let coverage = 1.0 - smoothstep(-aa, 0.0, d);
                    let rgb = if instance.highlight && d > -outline_width {
                        [outline[0], outline[1], outline[2]]
                    } else {
                        instance.color
                    };
                    self.blend(f.x, f.y, rgb, instance.opacity * coverage);
                }
            }
        }
        Ok(())
    }

    fn draw_density(&mut self, frame: &FrameParams) -> EngineResult<()> {
        self.ensure_ready()?;
        self.ensure_density_target();
        self.clear(frame.background);
        let instances = self.instances();
        let width = self.width;

        for panel in &frame.panels {
            for instance in &instances {
                for f in self.fragments(frame, panel, instance) {
                    if f.local.length() > 1.0 {
                        continue;
                    }
                    if let Some(d) = self.density.get_mut((f.y * width + f.x) as usize) {
                        *d += 1.0;
                    }
                }
            }
        }

        for panel in &frame.panels {
            for instance in &instances {
                for f in self.fragments(frame, panel, instance) {
                    if f.local.length() > 1.0 {
                        continue;
                    }
                    let density = self.density[(f.y * width + f.x) as usize];
                    self.blend(f.x, f.y, instance.color, density_alpha(density));
                }
            }
        }
        Ok(())
    }

    fn read_pixels(&mut self) -> EngineResult<RgbaImage> {
        self.ensure_ready()?;
        let to_u8 = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        let width = self.width;
        Ok(RgbaImage::from_fn(self.width, self.height, |x, y| {
            let c = self.color[(y * width + x) as usize];
            Rgba([to_u8(c[0]), to_u8(c[1]), to_u8(c[2]), to_u8(c[3])])
        }))
    }

    fn simulate_loss(&mut self) {
        log::warn!("Software backend context lost");
        self.state = ContextState::Lost;
        self.buffers = Default::default();
        self.color.clear();
        self.density.clear();
        self.density_size = (0, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sdf_signs() {
        assert!(sd_circle(Vec2::ZERO) < 0.0);
        assert!((sd_circle(Vec2::new(1.0, 0.0))).abs() < 1e-6);
        assert!(sd_circle(Vec2::new(1.5, 0.0)) > 0.0);

        assert!(sd_diamond(Vec2::ZERO) < 0.0);
        assert!(sd_diamond(Vec2::new(0.7, 0.7)) > 0.0);
        assert!((sd_diamond(Vec2::new(0.5, 0.5))).abs() < 1e-6);

        assert!(sd_triangle(Vec2::ZERO) < 0.0);
        // apex above the center, flat base below
        assert!(sd_triangle(Vec2::new(0.0, -0.7)) < 0.0);
        assert!(sd_triangle(Vec2::new(0.6, -0.7)) > 0.0);
        assert!(sd_triangle(Vec2::new(0.0, 0.95)) > 0.0);
    }

    #[test]
    fn test_shape_distance_dispatch() {
        let p = Vec2::new(0.6, 0.6);
        assert!(shape_distance(ShapeClass::Circle, p) < 0.0);
        assert!(shape_distance(ShapeClass::Diamond, p) > 0.0);
    }

    #[test]
    fn test_write_bounds() {
        let mut backend = SoftwareBackend::new();
        backend.initialize(4, 4).unwrap();
        backend
            .reallocate(Attribute::Highlight, bytemuck::cast_slice(&[0u32, 0, 0]))
            .unwrap();

        backend
            .write(Attribute::Highlight, 4, bytemuck::bytes_of(&1u32))
            .unwrap();
        assert_eq!(backend.buffer_words(Attribute::Highlight), &[0, 1, 0]);

        assert!(matches!(
            backend.write(Attribute::Highlight, 12, bytemuck::bytes_of(&1u32)),
            Err(EngineError::InvalidBufferWrite { .. })
        ));
        assert!(backend.write(Attribute::Highlight, 2, &[0, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_lost_context_rejects_work() {
        let mut backend = SoftwareBackend::new();
        backend.initialize(4, 4).unwrap();
        backend.simulate_loss();
        assert_eq!(backend.state(), ContextState::Lost);
        assert!(matches!(
            backend.reallocate(Attribute::Value, &[]),
            Err(EngineError::ContextLost)
        ));
        backend.initialize(4, 4).unwrap();
        assert_eq!(backend.state(), ContextState::Ready);
    }

    #[test]
    fn test_zero_size_rejected() {
        let mut backend = SoftwareBackend::new();
        assert!(backend.initialize(0, 10).is_err());
    }
}
