//! Record annotation parsing and the annotation-driven glyph style.
//!
//! Annotation text is a free-form `Label: value` list separated by `;` or
//! newlines, e.g. `"Oncogenicity: Likely Oncogenic; Effect: Loss-of-function"`.

use crate::types::{IntervalRecord, ShapeClass};
use serde::{Deserialize, Serialize};

pub const ONCOGENICITY_TAG: &str = "oncogenicity";
pub const EFFECT_TAG: &str = "effect";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationPair {
    pub label: String,
    pub value: String,
}

/// Parsed annotation text, pairs kept in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub pairs: Vec<AnnotationPair>,
}

impl Annotation {
    pub fn parse(text: &str) -> Self {
        let mut pairs = Vec::new();

        for item in text.split(|c| c == ';' || c == '\n') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }

            match item.split_once(':') {
                Some((label, value)) => pairs.push(AnnotationPair {
                    label: label.trim().to_string(),
                    value: value.trim().to_string(),
                }),
                // bare tag with no value
                None => pairs.push(AnnotationPair {
                    label: item.to_string(),
                    value: String::new(),
                }),
            }
        }

        Self { pairs }
    }

    pub fn from_record(record: &IntervalRecord) -> Self {
        record
            .annotation
            .as_deref()
            .map(Self::parse)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Case-insensitive label lookup.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|p| p.label.eq_ignore_ascii_case(label))
            .map(|p| p.value.as_str())
    }

    pub fn has_tag(&self, label: &str) -> bool {
        self.get(label).is_some()
    }
}

/// Oncogenicity wins over effect; anything else is a circle.
pub fn classify_shape(annotation: &Annotation) -> ShapeClass {
    if annotation.has_tag(ONCOGENICITY_TAG) {
        ShapeClass::Diamond
    } else if annotation.has_tag(EFFECT_TAG) {
        ShapeClass::Triangle
    } else {
        ShapeClass::Circle
    }
}

/// Convenience wrapper over the raw annotation string.
pub fn classify_text(text: Option<&str>) -> ShapeClass {
    match text {
        Some(t) => classify_shape(&Annotation::parse(t)),
        None => ShapeClass::Circle,
    }
}

/// Per-record glyph style derived purely from record content.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphStyle {
    pub shape: ShapeClass,
    pub opacity: f32,
    pub size_multiplier: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleRules {
    pub non_coding_opacity: f32,
    pub annotated_size_multiplier: f32,
}

impl Default for StyleRules {
    fn default() -> Self {
        Self {
            non_coding_opacity: 0.3,
            annotated_size_multiplier: 1.3,
        }
    }
}

impl StyleRules {
    pub fn style_for(&self, record: &IntervalRecord) -> GlyphStyle {
        let shape = classify_shape(&Annotation::from_record(record));
        let opacity = if record.is_protein_coded {
            1.0
        } else {
            self.non_coding_opacity
        };
        // diamonds and triangles cover less area than a circle of equal radius
        let size_multiplier = match shape {
            ShapeClass::Circle => 1.0,
            ShapeClass::Diamond | ShapeClass::Triangle => self.annotated_size_multiplier,
        };
        GlyphStyle {
            shape,
            opacity,
            size_multiplier,
        }
    }
}
