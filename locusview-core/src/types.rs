use serde::{Deserialize, Serialize};

pub type GenomicPos = u64;

/// Offset between the 1-based record coordinates and the 0-based axis.
pub const GENOMIC_OFFSET: f64 = 1.0;

/// Visible coordinate range `[start, end]` of one panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub start: f64,
    pub end: f64,
}

impl Domain {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position <= self.end
    }

    /// Interval overlap test used for the per-panel visible subset.
    pub fn intersects(&self, start: f64, end: f64) -> bool {
        start <= self.end && end >= self.start
    }

    pub fn overlaps(&self, other: &Domain) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn is_valid(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start < self.end
    }
}

impl From<[f64; 2]> for Domain {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<(f64, f64)> for Domain {
    fn from(pair: (f64, f64)) -> Self {
        Self::new(pair.0, pair.1)
    }
}

/// 8-bit RGB triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };
    pub const WHITE: Rgb = Rgb { r: 255, g: 255, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Unpack a 24-bit `0xRRGGBB` value; bits above 24 are ignored.
    pub fn from_packed(packed: u32) -> Self {
        Self {
            r: ((packed >> 16) & 0xff) as u8,
            g: ((packed >> 8) & 0xff) as u8,
            b: (packed & 0xff) as u8,
        }
    }

    pub fn packed(&self) -> u32 {
        (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }

    /// `r*65536 + g*256 + b` as a float. Every 24-bit value is exact in f32.
    pub fn to_gpu_float(&self) -> f32 {
        self.r as f32 * 65536.0 + self.g as f32 * 256.0 + self.b as f32
    }

    /// Inverse of [`Rgb::to_gpu_float`], mirroring the shader's unpack.
    pub fn from_gpu_float(value: f32) -> Self {
        let v = value.max(0.0).round() as u32;
        Self::from_packed(v)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        if s.len() != 6 {
            return None;
        }
        let packed = u32::from_str_radix(s, 16).ok()?;
        Some(Self::from_packed(packed))
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Normalized `[r, g, b]` in 0..=1.
    pub fn to_unit(&self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }
}

/// Glyph drawn for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ShapeClass {
    Circle = 0,
    Diamond = 1,
    Triangle = 2,
}

impl ShapeClass {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => ShapeClass::Diamond,
            2 => ShapeClass::Triangle,
            _ => ShapeClass::Circle,
        }
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }
}

/// Which coordinate of an interval places its glyph on the axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    #[default]
    Midpoint,
    Start,
}

/// One genomic feature, positioned in genome-wide coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntervalRecord {
    pub id: String,
    pub chromosome: String,
    pub start: GenomicPos,
    pub end: GenomicPos,
    pub value: f64,
    /// 24-bit packed `0xRRGGBB`
    pub color: u32,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default = "default_protein_coded")]
    pub is_protein_coded: bool,
}

fn default_protein_coded() -> bool {
    true
}

impl IntervalRecord {
    pub fn new(
        id: impl Into<String>,
        chromosome: impl Into<String>,
        start: GenomicPos,
        end: GenomicPos,
        value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            chromosome: chromosome.into(),
            start,
            end,
            value,
            color: 0x000000,
            annotation: None,
            is_protein_coded: true,
        }
    }

    pub fn with_color(mut self, color: u32) -> Self {
        self.color = color & 0x00ff_ffff;
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn with_protein_coded(mut self, coded: bool) -> Self {
        self.is_protein_coded = coded;
        self
    }

    pub fn rgb(&self) -> Rgb {
        Rgb::from_packed(self.color)
    }

    pub fn length(&self) -> GenomicPos {
        self.end.saturating_sub(self.start)
    }

    /// Axis position of the glyph, with the genomic offset applied.
    pub fn anchor_position(&self, mode: AnchorMode) -> f64 {
        let raw = match mode {
            AnchorMode::Midpoint => (self.start as f64 + self.end as f64) / 2.0,
            AnchorMode::Start => self.start as f64,
        };
        raw - GENOMIC_OFFSET
    }

    pub fn is_visible_in(&self, domain: &Domain) -> bool {
        domain.intersects(self.start as f64, self.end as f64)
    }

    /// Check `start <= end <= genome_length`.
    pub fn validate(&self, genome_length: GenomicPos) -> crate::error::EngineResult<()> {
        if self.start > self.end {
            return Err(crate::error::EngineError::invalid_record(
                self.id.clone(),
                format!("start {} is after end {}", self.start, self.end),
            ));
        }
        if self.end > genome_length {
            return Err(crate::error::EngineError::invalid_record(
                self.id.clone(),
                format!("end {} exceeds genome length {}", self.end, genome_length),
            ));
        }
        if !self.value.is_finite() {
            return Err(crate::error::EngineError::invalid_record(
                self.id.clone(),
                "value is not finite".to_string(),
            ));
        }
        Ok(())
    }
}
