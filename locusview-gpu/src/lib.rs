/*!
# LocusView GPU Rendering

Instanced rendering of genomic interval records for multi-panel views.

## Architecture

Rendering is split between renderer front-ends and interchangeable backends:
1. **Renderers**: [`ShapeRenderer`] draws SDF glyphs with hover highlight,
   [`DensityRenderer`] draws overlapping scatter points with a two-pass
   density-driven blend
2. **Backends**: [`RenderBackend`] owns the device resources. The
   [`SoftwareBackend`] rasterises on the CPU with the same emulated
   double-precision arithmetic as the shaders; `WgpuBackend` (feature
   `webgpu`) runs the WGSL pipelines
3. **View**: [`GenomeView`] wires panels, hit-testing, hover broadcast and a
   renderer together for a host application

Genomic positions reach the GPU as high/low f32 pairs and are only collapsed
to f32 after subtracting the panel's domain start, so coordinates near
3.2e9 stay pixel-exact.
*/

use image::RgbaImage;
use locusview_core::{Attribute, EngineResult};
use serde::{Deserialize, Serialize};

pub mod context;
pub mod density;
pub mod frame;
pub mod render;
pub mod shaders;
pub mod software;
pub mod view;
#[cfg(feature = "webgpu")]
pub mod webgpu;

pub use context::BackendContext;
pub use density::DensityRenderer;
pub use frame::{FrameParams, GlobalUniforms, PanelUniforms, RenderStyle};
pub use render::ShapeRenderer;
pub use software::SoftwareBackend;
pub use view::{GenomeView, ViewRenderer};
#[cfg(feature = "webgpu")]
pub use webgpu::WgpuBackend;

/// Liveness of the graphics context behind a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextState {
    Ready,
    Lost,
}

/// Lifecycle notification delivered to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextEvent {
    /// Resources are gone; the host should call `restore`.
    Lost,
    /// Resources were rebuilt and the cached data resubmitted.
    Restored,
}

/// Device-side resources for one render target.
///
/// Attribute buffers hold tightly packed 32-bit scalars, one per instance.
/// A backend must tolerate draws while its buffers disagree in length (a
/// partially updated dataset) by skipping the instances for that frame.
pub trait RenderBackend {
    fn name(&self) -> &'static str;

    fn state(&self) -> ContextState;

    /// Current target size in pixels.
    fn size(&self) -> (u32, u32);

    /// Recreate the render target and every pipeline resource at the given
    /// size. Attribute buffers are released and have to be uploaded again.
    fn initialize(&mut self, width: u32, height: u32) -> EngineResult<()>;

    /// Replace an attribute buffer with `data`.
    fn reallocate(&mut self, attribute: Attribute, data: &[u8]) -> EngineResult<()>;

    /// Overwrite `data.len()` bytes of an existing buffer at `offset`.
    fn write(&mut self, attribute: Attribute, offset: u64, data: &[u8]) -> EngineResult<()>;

    /// Clear to the background and draw SDF glyphs for every panel.
    fn draw_shapes(&mut self, frame: &FrameParams) -> EngineResult<()>;

    /// Accumulate coverage into the density target, then composite each point
    /// at its density-derived alpha. The density target is only reallocated
    /// when the output size changed.
    fn draw_density(&mut self, frame: &FrameParams) -> EngineResult<()>;

    /// Read back the last rendered frame.
    fn read_pixels(&mut self) -> EngineResult<RgbaImage>;

    /// Drop every resource as a real context loss would.
    fn simulate_loss(&mut self);
}

/// Version information for the LocusView GPU library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
