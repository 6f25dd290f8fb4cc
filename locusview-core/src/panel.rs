//! Panel layout and the multi-panel zoom/pan domain controller.
//!
//! Each panel owns one domain and one gesture state (Idle -> Gesturing ->
//! Idle). Gesture deltas are composed into a zoom transform, rescaled against
//! the panel's full-extent scale, rounded to whole coordinates and finally
//! clamped against sibling panels so no two panels ever claim overlapping
//! coordinate windows. Domain changes are coalesced: at most one pending
//! update per panel survives until the next [`PanelController::flush_frame`].

use crate::error::{EngineError, EngineResult};
use crate::scale::{LinearScale, ZoomTransform};
use crate::types::Domain;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    Gesturing { transform: ZoomTransform },
}

/// Raw gesture delta in panel-local pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Drag by `dx` pixels; positive moves the content right.
    Pan { dx: f64 },
    /// Wheel or pinch; `factor > 1` zooms in around `anchor_x`.
    Zoom { factor: f64, anchor_x: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DomainUpdate {
    pub panel: usize,
    pub domain: Domain,
}

#[derive(Debug, Clone)]
pub struct Panel {
    pub index: usize,
    pub domain: Domain,
    /// Left edge of the panel inside the shared viewport
    pub x_offset: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub value_scale: LinearScale,
    pub full_extent_scale: LinearScale,
    pub gesture: GestureState,
}

impl Panel {
    /// Pixels per coordinate unit at the current domain.
    pub fn x_ratio(&self) -> f64 {
        let width = self.domain.width();
        if width <= 0.0 {
            0.0
        } else {
            self.pixel_width / width
        }
    }

    /// Panel-local x of a genome-wide position.
    pub fn project_x(&self, position: f64) -> f64 {
        (position - self.domain.start) * self.x_ratio()
    }

    pub fn project_y(&self, value: f64) -> f64 {
        self.value_scale.apply(value)
    }

    /// Genome-wide coordinate under a panel-local x.
    pub fn coordinate_at(&self, local_x: f64) -> f64 {
        let ratio = self.x_ratio();
        if ratio == 0.0 {
            return self.domain.start;
        }
        self.domain.start + local_x / ratio
    }

    pub fn contains_local(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && x <= self.pixel_width && y >= 0.0 && y <= self.pixel_height
    }

    pub fn is_gesturing(&self) -> bool {
        matches!(self.gesture, GestureState::Gesturing { .. })
    }
}

/// Layout and constraint settings for the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelSettings {
    pub gap_px: f64,
    pub min_domain_width: f64,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            gap_px: 0.0,
            min_domain_width: 1.0,
        }
    }
}

/// Value range shared by every panel's vertical scale.
///
/// A valid `common` range wins; otherwise the value extent is padded by
/// `padding` of its span. A flat or empty extent is widened so the scale never
/// collapses.
pub fn compute_value_domain(
    values: impl IntoIterator<Item = f64>,
    common: Option<Domain>,
    padding: f64,
) -> Domain {
    if let Some(range) = common.filter(|d| d.is_valid()) {
        return range;
    }

    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.into_iter().filter(|v| v.is_finite()) {
        min = min.min(v);
        max = max.max(v);
    }

    if !min.is_finite() {
        return Domain::new(-1.0, 1.0);
    }
    if min == max {
        return Domain::new(min - 1.0, max + 1.0);
    }
    let pad = (max - min) * padding;
    Domain::new(min - pad, max + pad)
}

pub struct PanelController {
    panels: Vec<Panel>,
    /// Domains as last requested by the host or resolved by a gesture,
    /// before normalization against the current extent
    requested: Vec<Domain>,
    pending: Vec<Option<Domain>>,
    full_extent: Domain,
    value_domain: Domain,
    viewport: ViewportSize,
    settings: PanelSettings,
}

impl PanelController {
    pub fn new(
        domains: &[Domain],
        viewport: ViewportSize,
        full_extent: Domain,
        value_domain: Domain,
        settings: PanelSettings,
    ) -> Self {
        let mut controller = Self {
            panels: Vec::new(),
            requested: Vec::new(),
            pending: Vec::new(),
            full_extent,
            value_domain,
            viewport,
            settings,
        };
        controller.rebuild(domains);
        controller
    }

    /// Rebuild every panel from scratch. Pending updates are discarded.
    pub fn rebuild(&mut self, domains: &[Domain]) {
        let n = domains.len();
        let gap = self.settings.gap_px.max(0.0);
        let total_gap = gap * n.saturating_sub(1) as f64;
        let panel_width = if n == 0 {
            0.0
        } else {
            ((self.viewport.width as f64 - total_gap) / n as f64).max(1.0)
        };
        let height = self.viewport.height as f64;

        self.panels = Vec::with_capacity(n);
        for (index, domain) in domains.iter().enumerate() {
            let full_extent_scale = LinearScale::new(
                (self.full_extent.start, self.full_extent.end),
                (0.0, panel_width),
            );
            let value_scale = LinearScale::new(
                (self.value_domain.start, self.value_domain.end),
                (height, 0.0),
            );
            let domain = self.normalize(*domain);
            self.panels.push(Panel {
                index,
                domain,
                x_offset: index as f64 * (panel_width + gap),
                pixel_width: panel_width,
                pixel_height: height,
                value_scale,
                full_extent_scale,
                gesture: GestureState::Idle,
            });
        }
        self.pending = vec![None; n];
        self.requested = domains.to_vec();

        log::debug!(
            "Rebuilt {} panels ({}x{} px each)",
            n,
            panel_width,
            height
        );
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn panel(&self, index: usize) -> EngineResult<&Panel> {
        self.panels.get(index).ok_or(EngineError::PanelOutOfRange {
            index,
            count: self.panels.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    pub fn domains(&self) -> Vec<Domain> {
        self.panels.iter().map(|p| p.domain).collect()
    }

    /// Domains the panels were asked to show. They differ from
    /// [`PanelController::domains`] when the extent forced a clamp.
    pub fn requested_domains(&self) -> &[Domain] {
        &self.requested
    }

    pub fn viewport(&self) -> ViewportSize {
        self.viewport
    }

    pub fn full_extent(&self) -> Domain {
        self.full_extent
    }

    pub fn value_domain(&self) -> Domain {
        self.value_domain
    }

    pub fn resize(&mut self, viewport: ViewportSize) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        let domains = self.requested.clone();
        self.rebuild(&domains);
    }

    /// Replace the dataset's coordinate extent; panels are rebuilt from the
    /// requested domains, so a clamp against an earlier extent is undone.
    pub fn set_full_extent(&mut self, full_extent: Domain) {
        self.full_extent = full_extent;
        let domains = self.requested.clone();
        self.rebuild(&domains);
    }

    pub fn set_value_domain(&mut self, value_domain: Domain) {
        self.value_domain = value_domain;
        for panel in &mut self.panels {
            panel.value_scale =
                LinearScale::new((value_domain.start, value_domain.end), (panel.pixel_height, 0.0));
        }
    }

    /// Apply domains coming from upstream state. Same count mutates in place,
    /// a different count rebuilds.
    pub fn set_domains(&mut self, domains: &[Domain]) {
        if domains.len() != self.panels.len() {
            self.rebuild(domains);
            return;
        }
        self.requested = domains.to_vec();
        for (i, domain) in domains.iter().enumerate() {
            let domain = self.normalize(*domain);
            let panel = &mut self.panels[i];
            panel.domain = domain;
            if let GestureState::Gesturing { .. } = panel.gesture {
                panel.gesture = GestureState::Gesturing {
                    transform: ZoomTransform::from_domain(&panel.full_extent_scale, &domain),
                };
            }
        }
    }

    pub fn begin_gesture(&mut self, index: usize) -> EngineResult<()> {
        let count = self.panels.len();
        let panel = self
            .panels
            .get_mut(index)
            .ok_or(EngineError::PanelOutOfRange { index, count })?;
        panel.gesture = GestureState::Gesturing {
            transform: ZoomTransform::from_domain(&panel.full_extent_scale, &panel.domain),
        };
        Ok(())
    }

    pub fn end_gesture(&mut self, index: usize) -> EngineResult<()> {
        let count = self.panels.len();
        let panel = self
            .panels
            .get_mut(index)
            .ok_or(EngineError::PanelOutOfRange { index, count })?;
        panel.gesture = GestureState::Idle;
        Ok(())
    }

    /// Apply one gesture tick and return the resolved domain. A tick on an
    /// idle panel is treated as a complete one-shot gesture.
    pub fn apply_gesture(&mut self, index: usize, gesture: Gesture) -> EngineResult<Domain> {
        let panel = self.panel(index)?;
        let (base, one_shot) = match panel.gesture {
            GestureState::Gesturing { transform } => (transform, false),
            GestureState::Idle => (
                ZoomTransform::from_domain(&panel.full_extent_scale, &panel.domain),
                true,
            ),
        };

        let transform = match gesture {
            Gesture::Pan { dx } if dx.is_finite() => base.translate(dx),
            Gesture::Zoom { factor, anchor_x } if factor.is_finite() && factor > 0.0 && anchor_x.is_finite() => {
                base.scale_about(factor, anchor_x)
            }
            _ => {
                log::warn!("Ignoring non-finite gesture on panel {}: {:?}", index, gesture);
                return Ok(panel.domain);
            }
        };

        let raw = transform.rescale(&panel.full_extent_scale);
        let candidate = Domain::new(raw.start.round(), raw.end.round());
        let resolved = self.constrain(index, candidate);

        let panel = &mut self.panels[index];
        panel.domain = resolved;
        panel.gesture = if one_shot {
            GestureState::Idle
        } else if resolved == candidate {
            GestureState::Gesturing { transform }
        } else {
            // clamped: restart accumulation from what is actually shown
            GestureState::Gesturing {
                transform: ZoomTransform::from_domain(&panel.full_extent_scale, &resolved),
            }
        };
        self.pending[index] = Some(resolved);
        self.requested[index] = resolved;

        Ok(resolved)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.iter().any(Option::is_some)
    }

    /// Drain the latest pending domain of every panel.
    pub fn flush_frame(&mut self) -> Vec<DomainUpdate> {
        let updates: Vec<DomainUpdate> = self
            .pending
            .iter_mut()
            .enumerate()
            .filter_map(|(panel, pending)| pending.take().map(|domain| DomainUpdate { panel, domain }))
            .collect();
        if !updates.is_empty() {
            log::debug!("Flushing {} domain update(s)", updates.len());
        }
        updates
    }

    /// Order, clamp to the dataset extent and enforce the minimum width.
    fn normalize(&self, domain: Domain) -> Domain {
        let min_width = self.settings.min_domain_width;
        let (mut start, mut end) = if domain.start <= domain.end {
            (domain.start, domain.end)
        } else {
            (domain.end, domain.start)
        };
        if !start.is_finite() || !end.is_finite() {
            log::warn!("Replacing non-finite domain {:?} with full extent", domain);
            return self.full_extent;
        }

        let extent = self.full_extent;
        start = start.clamp(extent.start, extent.end);
        end = end.clamp(extent.start, extent.end);
        if end - start < min_width {
            end = (start + min_width).min(extent.end);
            start = (end - min_width).max(extent.start);
        }
        if Domain::new(start, end) != domain {
            log::warn!("Clamped domain {:?} to [{}, {}]", domain, start, end);
        }
        Domain::new(start, end)
    }

    /// Clamp a candidate domain for panel `index` against the dataset extent
    /// and every sibling panel.
    fn constrain(&self, index: usize, candidate: Domain) -> Domain {
        let current = self.panels[index].domain;
        let min_width = self.settings.min_domain_width;

        let (mut start, mut end) = if candidate.start <= candidate.end {
            (candidate.start, candidate.end)
        } else {
            (candidate.end, candidate.start)
        };

        let mut lower = self.full_extent.start;
        let mut upper = self.full_extent.end;

        for (j, other) in self.panels.iter().enumerate() {
            if j == index {
                continue;
            }
            let other = other.domain;
            if other.end <= current.start {
                lower = lower.max(other.end);
            } else if other.start >= current.end {
                upper = upper.min(other.start);
            } else {
                // siblings already overlap: only pull bounds that land inside
                if start > other.start && start < other.end {
                    start = other.end;
                }
                if end > other.start && end < other.end {
                    end = other.start;
                }
            }
        }

        start = start.max(lower);
        end = end.min(upper);

        if end - start < min_width {
            if upper - lower < min_width {
                return current;
            }
            end = (start + min_width).min(upper);
            start = (end - min_width).max(lower);
        }

        Domain::new(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(domains: &[Domain]) -> PanelController {
        PanelController::new(
            domains,
            ViewportSize::new(800, 200),
            Domain::new(0.0, 10_000.0),
            Domain::new(-2.0, 2.0),
            PanelSettings::default(),
        )
    }

    #[test]
    fn test_layout_splits_viewport() {
        let c = controller(&[Domain::new(0.0, 1000.0), Domain::new(2000.0, 3000.0)]);
        let p = c.panels();
        assert_eq!(p.len(), 2);
        assert_eq!(p[0].pixel_width, 400.0);
        assert_eq!(p[1].x_offset, 400.0);
        assert_eq!(p[1].pixel_height, 200.0);
    }

    #[test]
    fn test_value_scale_orientation() {
        let c = controller(&[Domain::new(0.0, 1000.0)]);
        let p = &c.panels()[0];
        assert_eq!(p.project_y(2.0), 0.0);
        assert_eq!(p.project_y(-2.0), 200.0);
    }

    #[test]
    fn test_pan_moves_domain() {
        let mut c = controller(&[Domain::new(1000.0, 2000.0)]);
        // 800 px for 1000 bp: 80 px is 100 bp
        let d = c.apply_gesture(0, Gesture::Pan { dx: 80.0 }).unwrap();
        assert_eq!(d, Domain::new(900.0, 1900.0));
    }

    #[test]
    fn test_zoom_about_anchor() {
        let mut c = controller(&[Domain::new(1000.0, 2000.0)]);
        let d = c
            .apply_gesture(0, Gesture::Zoom { factor: 2.0, anchor_x: 400.0 })
            .unwrap();
        assert_eq!(d, Domain::new(1250.0, 1750.0));
    }

    #[test]
    fn test_clamp_against_lower_neighbor() {
        let mut c = controller(&[Domain::new(0.0, 1000.0), Domain::new(2000.0, 3000.0)]);
        // panel 1 is 400 px wide for 1000 bp; pan right by 600 px = 1500 bp
        let d = c.apply_gesture(1, Gesture::Pan { dx: 600.0 }).unwrap();
        assert_eq!(d.start, 1000.0);
        assert!(d.end > d.start);
        let domains = c.domains();
        assert!(domains[0].end <= domains[1].start);
    }

    #[test]
    fn test_clamp_against_upper_neighbor() {
        let mut c = controller(&[Domain::new(0.0, 1000.0), Domain::new(2000.0, 3000.0)]);
        let d = c
            .apply_gesture(0, Gesture::Zoom { factor: 0.25, anchor_x: 200.0 })
            .unwrap();
        assert_eq!(d.end, 2000.0);
        assert_eq!(d.start, 0.0);
    }

    #[test]
    fn test_min_width_when_zoomed_past_one_unit() {
        let mut c = controller(&[Domain::new(100.0, 110.0)]);
        let d = c
            .apply_gesture(0, Gesture::Zoom { factor: 1000.0, anchor_x: 400.0 })
            .unwrap();
        assert!(d.end - d.start >= 1.0);
    }

    #[test]
    fn test_adjacent_neighbors_reject_collapse() {
        let mut c = controller(&[
            Domain::new(0.0, 1000.0),
            Domain::new(1000.0, 1001.0),
            Domain::new(1001.0, 3000.0),
        ]);
        let d = c.apply_gesture(1, Gesture::Pan { dx: 50.0 }).unwrap();
        assert_eq!(d, Domain::new(1000.0, 1001.0));
    }

    #[test]
    fn test_pending_updates_coalesce() {
        let mut c = controller(&[Domain::new(1000.0, 2000.0), Domain::new(5000.0, 6000.0)]);
        c.begin_gesture(0).unwrap();
        c.apply_gesture(0, Gesture::Pan { dx: 8.0 }).unwrap();
        c.apply_gesture(0, Gesture::Pan { dx: 8.0 }).unwrap();
        let last = c.apply_gesture(0, Gesture::Pan { dx: 8.0 }).unwrap();
        c.end_gesture(0).unwrap();

        let updates = c.flush_frame();
        assert_eq!(updates, vec![DomainUpdate { panel: 0, domain: last }]);
        assert!(c.flush_frame().is_empty());
    }

    #[test]
    fn test_gesture_accumulates_sub_unit_moves() {
        let mut c = controller(&[Domain::new(0.0, 1000.0)]);
        // 1.25 bp per pixel; each tick moves 0.005 bp, far below rounding
        c.begin_gesture(0).unwrap();
        let mut d = c.domains()[0];
        for _ in 0..2000 {
            d = c.apply_gesture(0, Gesture::Pan { dx: -0.004 }).unwrap();
        }
        assert_eq!(d, Domain::new(10.0, 1010.0));
    }

    #[test]
    fn test_external_domains_are_normalized() {
        let mut c = controller(&[Domain::new(0.0, 10.0)]);
        c.set_domains(&[Domain::new(20_000.0, -5.0)]);
        assert_eq!(c.domains()[0], Domain::new(0.0, 10_000.0));
        c.set_domains(&[Domain::new(50.0, 50.0)]);
        assert_eq!(c.domains()[0], Domain::new(50.0, 51.0));
    }

    #[test]
    fn test_requested_domain_survives_extent_change() {
        let mut c = PanelController::new(
            &[],
            ViewportSize::new(800, 200),
            Domain::new(0.0, 1.0),
            Domain::new(-1.0, 1.0),
            PanelSettings::default(),
        );
        c.set_domains(&[Domain::new(100.0, 900.0)]);
        assert_eq!(c.domains()[0], Domain::new(0.0, 1.0));
        assert_eq!(c.requested_domains(), &[Domain::new(100.0, 900.0)]);

        c.set_full_extent(Domain::new(0.0, 1000.0));
        assert_eq!(c.domains()[0], Domain::new(100.0, 900.0));
    }

    #[test]
    fn test_resize_keeps_gesture_result() {
        let mut c = controller(&[Domain::new(1000.0, 2000.0)]);
        let panned = c.apply_gesture(0, Gesture::Pan { dx: 80.0 }).unwrap();
        c.resize(ViewportSize::new(400, 200));
        assert_eq!(c.domains()[0], panned);
        assert_eq!(c.panels()[0].pixel_width, 400.0);
    }

    #[test]
    fn test_out_of_range_panel() {
        let mut c = controller(&[Domain::new(0.0, 10.0)]);
        assert!(matches!(
            c.apply_gesture(3, Gesture::Pan { dx: 1.0 }),
            Err(EngineError::PanelOutOfRange { index: 3, count: 1 })
        ));
    }

    #[test]
    fn test_compute_value_domain() {
        assert_eq!(
            compute_value_domain(vec![1.0, 3.0], Some(Domain::new(-5.0, 5.0)), 0.1),
            Domain::new(-5.0, 5.0)
        );
        assert_eq!(compute_value_domain(vec![0.0, 10.0], None, 0.1), Domain::new(-1.0, 11.0));
        assert_eq!(compute_value_domain(vec![2.0], None, 0.1), Domain::new(1.0, 3.0));
        assert_eq!(compute_value_domain(Vec::new(), None, 0.1), Domain::new(-1.0, 1.0));
    }
}
