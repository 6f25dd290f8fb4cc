//! Flat per-instance attribute arrays built from interval records.

use crate::annotation::StyleRules;
use crate::codec::split;
use crate::error::{EngineError, EngineResult};
use crate::types::{AnchorMode, IntervalRecord};

/// One parallel GPU attribute array. Doubles as the buffer handle passed to
/// render backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    PositionHigh,
    PositionLow,
    Value,
    Color,
    ShapeClass,
    Opacity,
    SizeMultiplier,
    Highlight,
}

impl Attribute {
    pub const ALL: [Attribute; 8] = [
        Attribute::PositionHigh,
        Attribute::PositionLow,
        Attribute::Value,
        Attribute::Color,
        Attribute::ShapeClass,
        Attribute::Opacity,
        Attribute::SizeMultiplier,
        Attribute::Highlight,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Attribute::PositionHigh => "position_high",
            Attribute::PositionLow => "position_low",
            Attribute::Value => "value",
            Attribute::Color => "color",
            Attribute::ShapeClass => "shape_class",
            Attribute::Opacity => "opacity",
            Attribute::SizeMultiplier => "size_multiplier",
            Attribute::Highlight => "highlight",
        }
    }

    /// Every attribute is a single 32-bit scalar.
    pub const STRIDE: u64 = 4;

    pub fn slot(&self) -> u32 {
        Attribute::ALL.iter().position(|a| a == self).unwrap_or(0) as u32
    }
}

/// Parallel typed arrays, one entry per record; index `i` of every array
/// describes record `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceBufferSet {
    pub position_high: Vec<f32>,
    pub position_low: Vec<f32>,
    pub value: Vec<f32>,
    pub color: Vec<f32>,
    pub shape_class: Vec<u32>,
    pub opacity: Vec<f32>,
    pub size_multiplier: Vec<f32>,
    pub highlight: Vec<u32>,
}

impl InstanceBufferSet {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            position_high: Vec::with_capacity(n),
            position_low: Vec::with_capacity(n),
            value: Vec::with_capacity(n),
            color: Vec::with_capacity(n),
            shape_class: Vec::with_capacity(n),
            opacity: Vec::with_capacity(n),
            size_multiplier: Vec::with_capacity(n),
            highlight: Vec::with_capacity(n),
        }
    }

    pub fn len(&self) -> usize {
        self.position_high.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn attribute_len(&self, attribute: Attribute) -> usize {
        match attribute {
            Attribute::PositionHigh => self.position_high.len(),
            Attribute::PositionLow => self.position_low.len(),
            Attribute::Value => self.value.len(),
            Attribute::Color => self.color.len(),
            Attribute::ShapeClass => self.shape_class.len(),
            Attribute::Opacity => self.opacity.len(),
            Attribute::SizeMultiplier => self.size_multiplier.len(),
            Attribute::Highlight => self.highlight.len(),
        }
    }

    /// Fail fast when the parallel arrays disagree in length.
    pub fn validate(&self) -> EngineResult<()> {
        let expected = self.len();
        for attribute in Attribute::ALL {
            let found = self.attribute_len(attribute);
            if found != expected {
                return Err(EngineError::buffer_length_mismatch(
                    attribute.name(),
                    expected,
                    found,
                ));
            }
        }
        Ok(())
    }

    pub fn bytes(&self, attribute: Attribute) -> &[u8] {
        match attribute {
            Attribute::PositionHigh => bytemuck::cast_slice(&self.position_high),
            Attribute::PositionLow => bytemuck::cast_slice(&self.position_low),
            Attribute::Value => bytemuck::cast_slice(&self.value),
            Attribute::Color => bytemuck::cast_slice(&self.color),
            Attribute::ShapeClass => bytemuck::cast_slice(&self.shape_class),
            Attribute::Opacity => bytemuck::cast_slice(&self.opacity),
            Attribute::SizeMultiplier => bytemuck::cast_slice(&self.size_multiplier),
            Attribute::Highlight => bytemuck::cast_slice(&self.highlight),
        }
    }

    /// Byte offset of instance `index` inside any attribute buffer.
    pub fn byte_offset(index: usize) -> u64 {
        index as u64 * Attribute::STRIDE
    }

    /// Set one highlight flag in the CPU mirror. Returns `false` when the index
    /// is out of range.
    pub fn set_highlight_flag(&mut self, index: usize, on: bool) -> bool {
        match self.highlight.get_mut(index) {
            Some(flag) => {
                *flag = on as u32;
                true
            }
            None => false,
        }
    }

    pub fn highlighted(&self) -> impl Iterator<Item = usize> + '_ {
        self.highlight
            .iter()
            .enumerate()
            .filter(|(_, &f)| f != 0)
            .map(|(i, _)| i)
    }
}

/// Transforms records into an [`InstanceBufferSet`].
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceBuilder {
    pub anchor: AnchorMode,
    pub rules: StyleRules,
}

impl InstanceBuilder {
    pub fn new(anchor: AnchorMode, rules: StyleRules) -> Self {
        Self { anchor, rules }
    }

    pub fn build(&self, records: &[IntervalRecord]) -> InstanceBufferSet {
        let mut set = InstanceBufferSet::with_capacity(records.len());

        for record in records {
            let (high, low) = split(record.anchor_position(self.anchor));
            let style = self.rules.style_for(record);

            set.position_high.push(high);
            set.position_low.push(low);
            set.value.push(record.value as f32);
            set.color.push(record.rgb().to_gpu_float());
            set.shape_class.push(style.shape.code());
            set.opacity.push(style.opacity);
            set.size_multiplier.push(style.size_multiplier);
            set.highlight.push(0);
        }

        log::debug!("Built instance buffers for {} records", set.len());
        set
    }
}
