/*!
# Shape Renderer

Draws one SDF glyph per record (circle, diamond or triangle) for every panel,
with per-record opacity and size multipliers and an outline on the hovered
record. Highlight changes touch a single 4-byte element of the highlight
buffer instead of re-uploading the dataset.
*/

use crate::context::BackendContext;
use crate::frame::{FrameParams, RenderStyle};
use crate::{ContextEvent, RenderBackend};
use image::RgbaImage;
use locusview_core::{Domain, EngineResult, InstanceBufferSet, Panel, ViewportSize};

pub struct ShapeRenderer<B: RenderBackend> {
    context: BackendContext<B>,
    style: RenderStyle,
    highlighted: Option<usize>,
}

impl<B: RenderBackend> ShapeRenderer<B> {
    pub fn new(backend: B, style: RenderStyle) -> Self {
        Self {
            context: BackendContext::new(backend),
            style,
            highlighted: None,
        }
    }

    pub fn style(&self) -> &RenderStyle {
        &self.style
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

    /// Replace the dataset. Every attribute buffer is reallocated and the
    /// highlight follows the flags carried by `buffers`.
    pub fn set_data(&mut self, buffers: InstanceBufferSet) -> EngineResult<()> {
        self.highlighted = buffers.highlighted().next();
        log::debug!("Shape renderer received {} instances", buffers.len());
        self.context.upload(buffers)
    }

    /// Recompute per-panel uniforms. A viewport size change reinitialises the
    /// backend and resubmits the current data.
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

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    /// Move the highlight to `index`. Out-of-range indices clear it instead.
    pub fn set_highlight(&mut self, index: usize) -> EngineResult<bool> {
        if self.highlighted == Some(index) {
            return Ok(true);
        }
        if index >= self.context.instance_count() {
            log::debug!("Highlight index {} out of range; clearing", index);
            self.clear_highlight()?;
            return Ok(false);
        }
        self.clear_highlight()?;
        self.context.write_highlight(index, true)?;
        self.highlighted = Some(index);
        Ok(true)
    }

    pub fn clear_highlight(&mut self) -> EngineResult<()> {
        if let Some(previous) = self.highlighted.take() {
            self.context.write_highlight(previous, false)?;
        }
        Ok(())
    }

    /// Draw the current frame. With zero records only the background is
    /// cleared.
    pub fn render(&mut self) -> EngineResult<()> {
        self.context.draw(|backend, frame| backend.draw_shapes(frame))
    }

    pub fn read_pixels(&mut self) -> EngineResult<RgbaImage> {
        self.context.check_alive()?;
        self.context.backend_mut().read_pixels()
    }

    pub fn restore(&mut self) -> EngineResult<()> {
        self.context.restore()
    }
}
