/*!
# Genome View

Host-facing orchestration of one multi-panel view: owns the records, the
panel controller, the CPU hit tester and a renderer. The host forwards
pointer and gesture input and calls [`GenomeView::frame`] once per animation
frame; domain changes are coalesced and delivered from there.
*/

use crate::density::DensityRenderer;
use crate::frame::RenderStyle;
use crate::render::ShapeRenderer;
use crate::{ContextEvent, RenderBackend};
use image::RgbaImage;
use locusview_core::config::EngineConfig;
use locusview_core::{
    compute_value_domain, Domain, DomainUpdate, EngineError, EngineResult, GenomeInfo, Gesture,
    HitTester, HoverChannel, HoveredLocation, InstanceBuilder, IntervalRecord, PanelController,
    RenderMode, Subscription, Throttle, Tooltip, ViewportSize,
};
use std::time::Instant;

/// The renderer selected by [`RenderMode`].
pub enum ViewRenderer<B: RenderBackend> {
    Shapes(ShapeRenderer<B>),
    Density(DensityRenderer<B>),
}

impl<B: RenderBackend> ViewRenderer<B> {
    pub fn new(mode: RenderMode, backend: B, style: RenderStyle) -> Self {
        match mode {
            RenderMode::Shapes => Self::Shapes(ShapeRenderer::new(backend, style)),
            RenderMode::Density => Self::Density(DensityRenderer::new(backend, style)),
        }
    }

    pub fn mode(&self) -> RenderMode {
        match self {
            Self::Shapes(_) => RenderMode::Shapes,
            Self::Density(_) => RenderMode::Density,
        }
    }

    pub fn backend_mut(&mut self) -> &mut B {
        match self {
            Self::Shapes(r) => r.backend_mut(),
            Self::Density(r) => r.backend_mut(),
        }
    }

    fn set_data(&mut self, records: &[IntervalRecord], builder: &InstanceBuilder) -> EngineResult<()> {
        let buffers = builder.build(records);
        match self {
            Self::Shapes(r) => r.set_data(buffers),
            Self::Density(r) => r.set_data(buffers),
        }
    }

    fn update_viewport(&mut self, controller: &PanelController) -> EngineResult<()> {
        let viewport = controller.viewport();
        let value_domain = controller.value_domain();
        match self {
            Self::Shapes(r) => r.update_viewport(viewport, controller.panels(), value_domain),
            Self::Density(r) => r.update_viewport(viewport, controller.panels(), value_domain),
        }
    }

    /// Density mode has no hover outline.
    fn set_highlight(&mut self, index: Option<usize>) -> EngineResult<()> {
        match (self, index) {
            (Self::Shapes(r), Some(i)) => r.set_highlight(i).map(|_| ()),
            (Self::Shapes(r), None) => r.clear_highlight(),
            (Self::Density(_), _) => Ok(()),
        }
    }

    pub fn render(&mut self) -> EngineResult<()> {
        match self {
            Self::Shapes(r) => r.render(),
            Self::Density(r) => r.render(),
        }
    }

    pub fn read_pixels(&mut self) -> EngineResult<RgbaImage> {
        match self {
            Self::Shapes(r) => r.read_pixels(),
            Self::Density(r) => r.read_pixels(),
        }
    }

    pub fn restore(&mut self) -> EngineResult<()> {
        match self {
            Self::Shapes(r) => r.restore(),
            Self::Density(r) => r.restore(),
        }
    }

    pub fn on_context_event(&mut self, listener: impl FnMut(ContextEvent) + 'static) {
        match self {
            Self::Shapes(r) => r.on_context_event(listener),
            Self::Density(r) => r.on_context_event(listener),
        }
    }
}

type DomainListener = Box<dyn FnMut(usize, Domain)>;
type HoverListener = Box<dyn FnMut(Option<usize>, Option<&Tooltip>)>;
type ClickListener = Box<dyn FnMut(usize, &IntervalRecord)>;

#[derive(Debug, Clone, Copy, PartialEq)]
struct PointerMove {
    x: f64,
    y: f64,
    panel: usize,
}

pub struct GenomeView<B: RenderBackend> {
    config: EngineConfig,
    records: Vec<IntervalRecord>,
    genome: Option<GenomeInfo>,
    controller: PanelController,
    hit_tester: HitTester,
    builder: InstanceBuilder,
    renderer: ViewRenderer<B>,
    hover: HoverChannel,
    throttle: Throttle,
    deferred_move: Option<PointerMove>,
    hovered: Option<usize>,
    common_value_range: Option<Domain>,
    viewport_dirty: bool,
    on_domain_change: Option<DomainListener>,
    on_hover: Option<HoverListener>,
    on_click: Option<ClickListener>,
}

impl<B: RenderBackend> GenomeView<B> {
    pub fn new(backend: B, config: EngineConfig, viewport: ViewportSize) -> EngineResult<Self> {
        config.validate()?;
        let style = RenderStyle::from_config(&config.render);
        let renderer = ViewRenderer::new(config.render.mode, backend, style);
        let controller = PanelController::new(
            &[],
            viewport,
            Domain::new(0.0, 1.0),
            Domain::new(-1.0, 1.0),
            config.panel_settings(),
        );
        let mut view = Self {
            hit_tester: HitTester::new(config.interaction.hit_radius_px, config.render.anchor),
            builder: InstanceBuilder::new(config.render.anchor, config.render.style_rules()),
            throttle: Throttle::new(config.interaction.hover_throttle()),
            config,
            records: Vec::new(),
            genome: None,
            controller,
            renderer,
            hover: HoverChannel::new(),
            deferred_move: None,
            hovered: None,
            common_value_range: None,
            viewport_dirty: true,
            on_domain_change: None,
            on_hover: None,
            on_click: None,
        };
        view.sync_viewport()?;
        Ok(view)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn records(&self) -> &[IntervalRecord] {
        &self.records
    }

    pub fn controller(&self) -> &PanelController {
        &self.controller
    }

    pub fn renderer(&self) -> &ViewRenderer<B> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut ViewRenderer<B> {
        &mut self.renderer
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    /// Channel carrying the hovered genome coordinate for linked readouts.
    pub fn hover_channel(&self) -> HoverChannel {
        self.hover.clone()
    }

    pub fn subscribe_hover(&self, listener: impl FnMut(&HoveredLocation) + 'static) -> Subscription {
        self.hover.subscribe(listener)
    }

    pub fn on_domain_change(&mut self, listener: impl FnMut(usize, Domain) + 'static) {
        self.on_domain_change = Some(Box::new(listener));
    }

    pub fn on_hover(&mut self, listener: impl FnMut(Option<usize>, Option<&Tooltip>) + 'static) {
        self.on_hover = Some(Box::new(listener));
    }

    pub fn on_click(&mut self, listener: impl FnMut(usize, &IntervalRecord) + 'static) {
        self.on_click = Some(Box::new(listener));
    }

    pub fn on_context_event(&mut self, listener: impl FnMut(ContextEvent) + 'static) {
        self.renderer.on_context_event(listener);
    }

    /// Use a genome layout for the coordinate extent and chromosome-local
    /// tooltip positions.
    pub fn set_genome(&mut self, genome: GenomeInfo) {
        let extent = Domain::new(0.0, genome.total_length as f64);
        self.genome = Some(genome);
        self.controller.set_full_extent(extent);
        self.hit_tester.invalidate();
        self.viewport_dirty = true;
    }

    /// Replace the dataset. Record order defines the record index used by
    /// hover, click and highlight.
    pub fn load_records(&mut self, records: Vec<IntervalRecord>) -> EngineResult<()> {
        let limit = self
            .genome
            .as_ref()
            .map_or(u64::MAX, |g| g.total_length);
        for record in &records {
            record.validate(limit)?;
        }

        // a lost context still keeps the new data for `restore`, so the
        // records hit-testing sees must follow it
        match self.clear_hover() {
            Ok(()) | Err(EngineError::ContextLost) => {}
            Err(err) => return Err(err),
        }
        let uploaded = self.renderer.set_data(&records, &self.builder);
        if let Err(err) = &uploaded {
            if !matches!(err, EngineError::ContextLost) {
                return uploaded;
            }
        }
        self.records = records;

        if self.genome.is_none() {
            let end = self.unbounded_extent_end(self.controller.requested_domains());
            self.controller.set_full_extent(Domain::new(0.0, end));
        }
        self.refresh_value_domain();
        self.hit_tester.invalidate();
        self.viewport_dirty = true;
        log::info!("Loaded {} records", self.records.len());
        uploaded
    }

    /// Without a genome layout the extent covers the records and every
    /// requested domain.
    fn unbounded_extent_end(&self, requested: &[Domain]) -> f64 {
        let data_end = self.records.iter().map(|r| r.end as f64).fold(1.0, f64::max);
        requested
            .iter()
            .flat_map(|d| [d.start, d.end])
            .filter(|v| v.is_finite())
            .fold(data_end, f64::max)
    }

    /// Fix the value axis across panels, or `None` to fit the data.
    pub fn set_common_value_range(&mut self, range: Option<Domain>) {
        self.common_value_range = range;
        self.refresh_value_domain();
        self.viewport_dirty = true;
    }

    fn refresh_value_domain(&mut self) {
        let domain = compute_value_domain(
            self.records.iter().map(|r| r.value),
            self.common_value_range,
            self.config.layout.value_padding,
        );
        self.controller.set_value_domain(domain);
    }

    /// Apply domains from upstream state. A different count rebuilds the
    /// panels.
    pub fn set_domains(&mut self, domains: &[Domain]) {
        if self.genome.is_none() {
            let end = self.unbounded_extent_end(domains);
            // grow only: echoes of our own updates must not rebuild mid-gesture
            if end > self.controller.full_extent().end {
                self.controller.set_full_extent(Domain::new(0.0, end));
            }
        }
        self.controller.set_domains(domains);
        self.viewport_dirty = true;
    }

    pub fn set_viewport_size(&mut self, viewport: ViewportSize) {
        if viewport != self.controller.viewport() {
            self.controller.resize(viewport);
            self.viewport_dirty = true;
        }
    }

    pub fn gesture_start(&mut self, panel: usize) -> EngineResult<()> {
        self.controller.begin_gesture(panel)
    }

    /// Apply a pan or zoom tick. The resolved domain is delivered on the next
    /// [`GenomeView::frame`].
    pub fn gesture(&mut self, panel: usize, gesture: Gesture) -> EngineResult<Domain> {
        let domain = self.controller.apply_gesture(panel, gesture)?;
        self.viewport_dirty = true;
        Ok(domain)
    }

    pub fn gesture_end(&mut self, panel: usize) -> EngineResult<()> {
        self.controller.end_gesture(panel)
    }

    /// Nearest record to a panel-local pointer position.
    pub fn find_nearest(&mut self, panel: usize, x: f64, y: f64) -> EngineResult<Option<usize>> {
        self.hit_tester.refresh(&self.records, self.controller.panels());
        let panel = self.controller.panel(panel)?;
        Ok(self
            .hit_tester
            .find_nearest(&self.records, panel, x, y)
            .map(|hit| hit.record_index))
    }

    /// Throttled pointer move. A move arriving inside the throttle window is
    /// kept and replayed by [`GenomeView::frame`] once the window has passed.
    pub fn pointer_move(&mut self, x: f64, y: f64, panel: usize, now: Instant) -> EngineResult<()> {
        let pending = PointerMove { x, y, panel };
        if !self.throttle.ready(now) {
            self.deferred_move = Some(pending);
            return Ok(());
        }
        self.deferred_move = None;
        self.process_move(pending)
    }

    fn process_move(&mut self, pointer: PointerMove) -> EngineResult<()> {
        let panel = match self.controller.panel(pointer.panel) {
            Ok(panel) => panel,
            Err(err) => {
                log::warn!("Pointer move ignored: {}", err);
                return Ok(());
            }
        };
        let coordinate = panel.coordinate_at(pointer.x);
        self.hover.publish(HoveredLocation {
            coordinate: Some(coordinate),
            panel: pointer.panel,
        });

        let hit = self.find_nearest(pointer.panel, pointer.x, pointer.y)?;
        if hit == self.hovered {
            return Ok(());
        }
        self.hovered = hit;
        self.renderer.set_highlight(hit)?;

        match hit {
            Some(index) => {
                let tooltip =
                    Tooltip::for_record(index, &self.records[index], self.genome.as_ref());
                if let Some(listener) = self.on_hover.as_mut() {
                    listener(Some(index), Some(&tooltip));
                }
            }
            None => {
                if let Some(listener) = self.on_hover.as_mut() {
                    listener(None, None);
                }
            }
        }
        self.viewport_dirty = true;
        Ok(())
    }

    pub fn pointer_out(&mut self, panel: usize) -> EngineResult<()> {
        self.deferred_move = None;
        self.throttle.reset();
        self.hover.publish(HoveredLocation {
            coordinate: None,
            panel,
        });
        self.clear_hover()
    }

    fn clear_hover(&mut self) -> EngineResult<()> {
        if self.hovered.take().is_some() {
            self.renderer.set_highlight(None)?;
            if let Some(listener) = self.on_hover.as_mut() {
                listener(None, None);
            }
            self.viewport_dirty = true;
        }
        Ok(())
    }

    /// Resolve a click to the nearest record and notify the host.
    pub fn click(&mut self, x: f64, y: f64, panel: usize) -> EngineResult<Option<usize>> {
        let hit = self.find_nearest(panel, x, y)?;
        if let Some(index) = hit {
            if let Some(listener) = self.on_click.as_mut() {
                listener(index, &self.records[index]);
            }
        }
        Ok(hit)
    }

    /// Per-animation-frame work: replay a deferred pointer move, deliver
    /// coalesced domain changes, then draw if anything changed.
    pub fn frame(&mut self, now: Instant) -> EngineResult<Vec<DomainUpdate>> {
        if let Some(pending) = self.deferred_move {
            if self.throttle.ready(now) {
                self.deferred_move = None;
                self.process_move(pending)?;
            }
        }

        let updates = self.controller.flush_frame();
        if let Some(listener) = self.on_domain_change.as_mut() {
            for update in &updates {
                listener(update.panel, update.domain);
            }
        }

        if self.viewport_dirty || !updates.is_empty() {
            self.sync_viewport()?;
            self.renderer.render()?;
            self.viewport_dirty = false;
        }
        Ok(updates)
    }

    /// Force a redraw of the current state.
    pub fn render(&mut self) -> EngineResult<()> {
        self.sync_viewport()?;
        self.renderer.render()?;
        self.viewport_dirty = false;
        Ok(())
    }

    fn sync_viewport(&mut self) -> EngineResult<()> {
        let viewport = self.controller.viewport();
        if viewport.width == 0 || viewport.height == 0 {
            return Err(EngineError::resource_init(format!(
                "viewport must be non-empty, got {}x{}",
                viewport.width, viewport.height
            )));
        }
        self.renderer.update_viewport(&self.controller)
    }

    /// Rebuild graphics resources after a context loss and redraw.
    pub fn restore(&mut self) -> EngineResult<()> {
        self.renderer.restore()?;
        self.render()
    }

    pub fn read_pixels(&mut self) -> EngineResult<RgbaImage> {
        self.renderer.read_pixels()
    }
}
