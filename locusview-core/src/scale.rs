//! Linear scales and the zoom transform used for gesture-to-domain conversion.

use crate::types::Domain;
use serde::{Deserialize, Serialize};

/// Maps a continuous domain onto a pixel range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Factor from domain units to range units.
    pub fn ratio(&self) -> f64 {
        let span = self.domain.1 - self.domain.0;
        if span == 0.0 {
            0.0
        } else {
            (self.range.1 - self.range.0) / span
        }
    }

    pub fn apply(&self, x: f64) -> f64 {
        self.range.0 + (x - self.domain.0) * self.ratio()
    }

    pub fn invert(&self, y: f64) -> f64 {
        let span = self.range.1 - self.range.0;
        if span == 0.0 {
            return self.domain.0;
        }
        self.domain.0 + (y - self.range.0) / span * (self.domain.1 - self.domain.0)
    }
}

/// Horizontal zoom transform: `screen = k * base + x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomTransform {
    pub k: f64,
    pub x: f64,
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ZoomTransform {
    pub const IDENTITY: ZoomTransform = ZoomTransform { k: 1.0, x: 0.0 };

    pub fn apply_x(&self, v: f64) -> f64 {
        v * self.k + self.x
    }

    pub fn invert_x(&self, p: f64) -> f64 {
        (p - self.x) / self.k
    }

    pub fn translate(self, dx: f64) -> Self {
        Self {
            k: self.k,
            x: self.x + dx,
        }
    }

    /// Scale by `factor`, keeping the screen point `anchor` fixed.
    pub fn scale_about(self, factor: f64, anchor: f64) -> Self {
        Self {
            k: self.k * factor,
            x: anchor - (anchor - self.x) * factor,
        }
    }

    /// Transform that, applied to `full`, shows exactly `domain`.
    pub fn from_domain(full: &LinearScale, domain: &Domain) -> Self {
        let (r0, r1) = full.range;
        let a = full.apply(domain.start);
        let b = full.apply(domain.end);
        if b == a || r1 == r0 {
            return Self::IDENTITY;
        }
        let k = (r1 - r0) / (b - a);
        Self { k, x: r0 - a * k }
    }

    /// Visible domain of `full` under this transform.
    pub fn rescale(&self, full: &LinearScale) -> Domain {
        let (r0, r1) = full.range;
        Domain::new(
            full.invert(self.invert_x(r0)),
            full.invert(self.invert_x(r1)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_invert() {
        let s = LinearScale::new((0.0, 1000.0), (0.0, 500.0));
        assert_eq!(s.apply(500.0), 250.0);
        assert_eq!(s.invert(250.0), 500.0);
    }

    #[test]
    fn test_inverted_range() {
        let s = LinearScale::new((-1.0, 1.0), (200.0, 0.0));
        assert_eq!(s.apply(1.0), 0.0);
        assert_eq!(s.apply(-1.0), 200.0);
        assert_eq!(s.invert(100.0), 0.0);
    }

    #[test]
    fn test_degenerate_domain() {
        let s = LinearScale::new((5.0, 5.0), (0.0, 100.0));
        assert_eq!(s.apply(5.0), 0.0);
        assert!(s.apply(7.0).is_finite());
    }

    #[test]
    fn test_transform_round_trip_domain() {
        let full = LinearScale::new((0.0, 3_000_000_000.0), (0.0, 800.0));
        let d = Domain::new(2_000_000_000.0, 2_000_000_200.0);
        let t = ZoomTransform::from_domain(&full, &d);
        let back = t.rescale(&full);
        assert!((back.start - d.start).abs() < 1e-3);
        assert!((back.end - d.end).abs() < 1e-3);
    }

    #[test]
    fn test_pan_and_zoom() {
        let full = LinearScale::new((0.0, 1000.0), (0.0, 100.0));
        let t = ZoomTransform::IDENTITY.translate(-10.0);
        let d = t.rescale(&full);
        assert!((d.start - 100.0).abs() < 1e-9);
        assert!((d.end - 1100.0).abs() < 1e-9);

        let z = ZoomTransform::IDENTITY.scale_about(2.0, 50.0);
        let d = z.rescale(&full);
        assert!((d.start - 250.0).abs() < 1e-9);
        assert!((d.end - 750.0).abs() < 1e-9);
    }
}
