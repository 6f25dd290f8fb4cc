//! Double-float coordinate codec.
//!
//! Genome-wide coordinates reach ~3.2e9 while f32 only represents integers
//! exactly up to 2^24. Each coordinate is therefore carried to the GPU as a
//! `(high, low)` pair of f32 whose sum reconstructs the f64 value. The
//! functions below are the CPU mirror of `transform_utils.wgsl`; the software
//! backend uses them so both backends place pixels identically.

use bytemuck::{Pod, Zeroable};

/// A value stored as the unevaluated sum `high + low`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct DoubleFloat {
    pub high: f32,
    pub low: f32,
}

impl DoubleFloat {
    pub const ZERO: DoubleFloat = DoubleFloat { high: 0.0, low: 0.0 };

    pub fn new(high: f32, low: f32) -> Self {
        Self { high, low }
    }

    pub fn from_f64(value: f64) -> Self {
        let (high, low) = split(value);
        Self { high, low }
    }

    pub fn to_f64(&self) -> f64 {
        reconstruct(self.high, self.low)
    }

    /// Collapse to single precision, as the shader does before rasterizing.
    pub fn to_f32(&self) -> f32 {
        self.high + self.low
    }
}

/// Split an f64 into a coarse f32 and the f32 residual.
pub fn split(value: f64) -> (f32, f32) {
    let high = value as f32;
    let low = (value - high as f64) as f32;
    (high, low)
}

pub fn reconstruct(high: f32, low: f32) -> f64 {
    high as f64 + low as f64
}

// Knuth two-sum: s + e == a + b exactly.
#[inline]
fn two_sum(a: f32, b: f32) -> (f32, f32) {
    let s = a + b;
    let v = s - a;
    let e = (a - (s - v)) + (b - v);
    (s, e)
}

// Requires |a| >= |b|.
#[inline]
fn quick_two_sum(a: f32, b: f32) -> (f32, f32) {
    let s = a + b;
    let e = b - (s - a);
    (s, e)
}

/// Compensated subtraction `a - b`.
pub fn sub64(a: DoubleFloat, b: DoubleFloat) -> DoubleFloat {
    let (s, mut e) = two_sum(a.high, -b.high);
    e += a.low - b.low;
    let (high, low) = quick_two_sum(s, e);
    DoubleFloat { high, low }
}

/// Multiply a compensated value by a plain f32 scale.
pub fn mul64(a: DoubleFloat, scale: f32) -> DoubleFloat {
    let p = a.high * scale;
    let mut e = a.high.mul_add(scale, -p);
    e += a.low * scale;
    let (high, low) = quick_two_sum(p, e);
    DoubleFloat { high, low }
}

/// `(position - origin) * scale`, evaluated in emulated double precision and
/// collapsed to f32.
pub fn project(position: DoubleFloat, origin: DoubleFloat, scale: f32) -> f32 {
    mul64(sub64(position, origin), scale).to_f32()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_across_genome() {
        for &v in &[0.0, 1.0, 1e6, 1e9, 3.2e9, 2_999_999_999.0, 123_456_789.5] {
            let (h, l) = split(v);
            let err = (reconstruct(h, l) - v).abs();
            assert!(err < 1.0, "round trip error {} for {}", err, v);
        }
    }

    #[test]
    fn test_round_trip_dense_sweep() {
        let mut v = 0.0f64;
        while v < 3.3e9 {
            let d = DoubleFloat::from_f64(v);
            assert!((d.to_f64() - v).abs() < 1.0);
            v += 7_919_777.0;
        }
    }

    #[test]
    fn test_split_high_is_plain_cast() {
        let (h, l) = split(2_000_000_049.0);
        assert_eq!(h, 2_000_000_049.0f64 as f32);
        assert_eq!(h as f64 + l as f64, 2_000_000_049.0);
    }

    #[test]
    fn test_sub64_recovers_small_difference() {
        let a = DoubleFloat::from_f64(2_000_000_049.0);
        let b = DoubleFloat::from_f64(2_000_000_000.0);
        assert_eq!(sub64(a, b).to_f32(), 49.0);

        // naive single precision collapses both onto the same float
        let naive = 2_000_000_049.0f64 as f32 - 2_000_000_000.0f64 as f32;
        assert_ne!(naive, 49.0);
    }

    #[test]
    fn test_project_matches_f64() {
        let origin = 3_100_000_000.0;
        let scale = 800.0 / 250.0;
        for offset in [0.0, 1.0, 17.0, 125.5, 250.0] {
            let pos = origin + offset;
            let px = project(
                DoubleFloat::from_f64(pos),
                DoubleFloat::from_f64(origin),
                scale as f32,
            );
            let expected = (pos - origin) * scale;
            assert!((px as f64 - expected).abs() < 1e-3, "{} vs {}", px, expected);
        }
    }

    #[test]
    fn test_mul64_scales_residual() {
        let a = DoubleFloat::new(1024.0, 0.25);
        let r = mul64(a, 2.0);
        assert_eq!(r.to_f64(), 2048.5);
    }
}
