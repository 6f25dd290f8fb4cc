/*!
# Density Renderer

Two-pass rendering for dense scatter data:
1. Every point adds 1 to an R16Float target inside its circular mask
2. Every point is composited in its own color at
   `alpha = 1 - 0.5^max(density, 1)` read from that target

Overlapping regions grow darker without any per-dataset normalisation, so
frames stay comparable while panning. The accumulation target is owned by the
backend and reallocated only when the viewport size changes.
*/

use crate::context::BackendContext;
use crate::frame::{FrameParams, RenderStyle};
use crate::{ContextEvent, RenderBackend};
use image::RgbaImage;
use locusview_core::{Domain, EngineResult, InstanceBufferSet, Panel, ViewportSize};

pub struct DensityRenderer<B: RenderBackend> {
    context: BackendContext<B>,
    style: RenderStyle,
}

impl<B: RenderBackend> DensityRenderer<B> {
    pub fn new(backend: B, style: RenderStyle) -> Self {
        Self {
            context: BackendContext::new(backend),
            style,
        }
    }

    pub fn context(&self) -> &BackendContext<B> {
        &self.context
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.context.backend_mut()
    }

    pub fn into_backend(self) -> B {
        self.context.into_backend()
    }

    pub fn on_context_event(&mut self, listener: impl FnMut(ContextEvent) + 'static) {
        self.context.on_event(listener);
    }

    pub fn set_data(&mut self, buffers: InstanceBufferSet) -> EngineResult<()> {
        log::debug!("Density renderer received {} instances", buffers.len());
        self.context.upload(buffers)
    }

    pub fn update_viewport(
        &mut self,
        viewport: ViewportSize,
        panels: &[Panel],
        value_domain: Domain,
    ) -> EngineResult<()> {
        self.context
            .set_frame(FrameParams::build(viewport, panels, value_domain, &self.style));
        self.context.ensure_size(viewport.width, viewport.height)?;
        Ok(())
    }

    pub fn render(&mut self) -> EngineResult<()> {
        self.context.draw(|backend, frame| backend.draw_density(frame))
    }

    pub fn read_pixels(&mut self) -> EngineResult<RgbaImage> {
        self.context.check_alive()?;
        self.context.backend_mut().read_pixels()
    }

    pub fn restore(&mut self) -> EngineResult<()> {
        self.context.restore()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SoftwareBackend;
    use locusview_core::panel::PanelSettings;
    use locusview_core::{InstanceBuilder, IntervalRecord, PanelController};

    fn controller(viewport: ViewportSize) -> PanelController {
        PanelController::new(
            &[Domain::new(0.0, 100.0)],
            viewport,
            Domain::new(0.0, 1000.0),
            Domain::new(-1.0, 1.0),
            PanelSettings::default(),
        )
    }

    #[test]
    fn test_density_target_reallocated_only_on_resize() {
        let records = vec![IntervalRecord::new("a", "1", 50, 52, 0.0)];
        let mut r = DensityRenderer::new(SoftwareBackend::new(), RenderStyle::default());
        r.set_data(InstanceBuilder::default().build(&records)).unwrap();

        let small = ViewportSize::new(64, 32);
        let c = controller(small);
        r.update_viewport(small, c.panels(), c.value_domain()).unwrap();
        r.render().unwrap();
        r.render().unwrap();
        assert_eq!(r.context().backend().density_allocations(), 1);

        let large = ViewportSize::new(128, 32);
        let c = controller(large);
        r.update_viewport(large, c.panels(), c.value_domain()).unwrap();
        r.render().unwrap();
        assert_eq!(r.context().backend().density_allocations(), 2);
    }
}
