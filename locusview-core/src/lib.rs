//! LocusView Core Library
//!
//! GPU-independent half of the engine: the double-float coordinate codec,
//! record-to-instance building, the multi-panel domain controller, CPU hit
//! testing, the hover broadcast channel and configuration.

pub mod annotation;
pub mod codec;
pub mod config;
pub mod error;
pub mod genome;
pub mod hover;
pub mod instances;
pub mod panel;
pub mod scale;
pub mod tooltip;
pub mod types;

// Re-export commonly used types and functions
pub use annotation::{classify_shape, classify_text, Annotation, GlyphStyle, StyleRules};
pub use codec::{split, DoubleFloat};
pub use config::{EngineConfig, RenderMode};
pub use error::{EngineError, EngineResult};
pub use genome::GenomeInfo;
pub use hit_test::{Hit, HitTester};
pub use hover::{HoverChannel, HoveredLocation, Subscription, Throttle};
pub use instances::{Attribute, InstanceBufferSet, InstanceBuilder};
pub use panel::{compute_value_domain, DomainUpdate, Gesture, GestureState, Panel, PanelController, ViewportSize};
pub use scale::{LinearScale, ZoomTransform};
pub use tooltip::Tooltip;
pub use types::{AnchorMode, Domain, GenomicPos, IntervalRecord, Rgb, ShapeClass};

/// Version information for the LocusView core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Base of the density blend falloff, `alpha = 1 - DENSITY_FALLOFF^density`.
pub const DENSITY_FALLOFF: f32 = 0.5;

/// Blend factor for a pixel covered by `density` overlapping points.
///
/// Densities below one are clamped to one so sparse regions are not
/// over-darkened. The curve saturates towards 1 without a normalising
/// maximum.
pub fn density_alpha(density: f32) -> f32 {
    let d = if density.is_nan() { 1.0 } else { density.max(1.0) };
    1.0 - DENSITY_FALLOFF.powf(d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_density_alpha_clamps_sparse() {
        assert_eq!(density_alpha(0.0), 0.5);
        assert_eq!(density_alpha(0.3), 0.5);
        assert_eq!(density_alpha(1.0), 0.5);
        assert_eq!(density_alpha(2.0), 0.75);
    }

    #[test]
    fn test_density_alpha_is_monotonic() {
        let mut prev = density_alpha(1.0);
        for n in 2..200 {
            let a = density_alpha(n as f32);
            assert!(a >= prev);
            assert!(a <= 1.0);
            prev = a;
        }
    }
}
