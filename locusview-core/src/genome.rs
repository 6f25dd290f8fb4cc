//! Chromosome layout used to flatten `(chromosome, position)` pairs onto one
//! genome-wide axis.

use crate::types::GenomicPos;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const GRCH37_LENGTHS: [(&str, GenomicPos); 24] = [
    ("1", 249_250_621),
    ("2", 243_199_373),
    ("3", 198_022_430),
    ("4", 191_154_276),
    ("5", 180_915_260),
    ("6", 171_115_067),
    ("7", 159_138_663),
    ("8", 146_364_022),
    ("9", 141_213_431),
    ("10", 135_534_747),
    ("11", 135_006_516),
    ("12", 133_851_895),
    ("13", 115_169_878),
    ("14", 107_349_540),
    ("15", 102_531_392),
    ("16", 90_354_753),
    ("17", 81_195_210),
    ("18", 78_077_248),
    ("19", 59_128_983),
    ("20", 63_025_520),
    ("21", 48_129_895),
    ("22", 51_304_566),
    ("X", 155_270_560),
    ("Y", 59_373_566),
];

const GRCH38_LENGTHS: [(&str, GenomicPos); 24] = [
    ("1", 248_956_422),
    ("2", 242_193_529),
    ("3", 198_295_559),
    ("4", 190_214_555),
    ("5", 181_538_259),
    ("6", 170_805_979),
    ("7", 159_345_973),
    ("8", 145_138_636),
    ("9", 138_394_717),
    ("10", 133_797_422),
    ("11", 135_086_622),
    ("12", 133_275_309),
    ("13", 114_364_328),
    ("14", 107_043_718),
    ("15", 101_991_189),
    ("16", 90_338_345),
    ("17", 83_257_441),
    ("18", 80_373_285),
    ("19", 58_617_616),
    ("20", 64_444_167),
    ("21", 46_709_983),
    ("22", 50_818_468),
    ("X", 156_040_895),
    ("Y", 57_227_415),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromosomeInfo {
    pub id: u32,
    pub name: String,
    pub length: GenomicPos,
    pub offset: GenomicPos, // genome-wide coordinate of position 0
}

/// Chromosome-local position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalCoord {
    pub chromosome_id: u32,
    pub position: GenomicPos,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenomeInfo {
    pub chromosomes: Vec<ChromosomeInfo>,
    pub total_length: GenomicPos,
    name_index: HashMap<String, u32>,
}

impl GenomeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grch37() -> Self {
        Self::from_lengths(&GRCH37_LENGTHS)
    }

    pub fn grch38() -> Self {
        Self::from_lengths(&GRCH38_LENGTHS)
    }

    fn from_lengths(lengths: &[(&str, GenomicPos)]) -> Self {
        let mut genome = Self::new();
        for (name, length) in lengths {
            genome.add_chromosome(name, *length);
        }
        genome
    }

    pub fn add_chromosome(&mut self, name: &str, length: GenomicPos) -> u32 {
        let id = self.chromosomes.len() as u32;
        let offset = self.total_length;

        self.chromosomes.push(ChromosomeInfo {
            id,
            name: name.to_string(),
            length,
            offset,
        });

        self.name_index.insert(normalize_name(name), id);
        self.total_length = self.total_length.saturating_add(length);
        id
    }

    pub fn get(&self, id: u32) -> Option<&ChromosomeInfo> {
        self.chromosomes.get(id as usize)
    }

    /// Lookup accepting `chr17`, `17`, `chrx` and `X` alike.
    pub fn get_by_name(&self, name: &str) -> Option<&ChromosomeInfo> {
        self.name_index
            .get(&normalize_name(name))
            .and_then(|&id| self.get(id))
    }

    pub fn local_to_global(&self, chromosome: &str, position: GenomicPos) -> Option<GenomicPos> {
        let info = self.get_by_name(chromosome)?;
        if position > info.length {
            return None;
        }
        Some(info.offset.saturating_add(position))
    }

    pub fn global_to_local(&self, global_pos: GenomicPos) -> Option<LocalCoord> {
        if global_pos >= self.total_length {
            return None;
        }
        // chromosomes are stored in offset order
        let idx = self
            .chromosomes
            .partition_point(|c| c.offset.saturating_add(c.length) <= global_pos);
        let info = self.chromosomes.get(idx)?;
        Some(LocalCoord {
            chromosome_id: info.id,
            position: global_pos - info.offset,
        })
    }

    pub fn clamp_position(&self, pos: f64) -> f64 {
        pos.clamp(0.0, self.total_length as f64)
    }
}

fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_ascii_lowercase();
    let stripped = lower.strip_prefix("chr").unwrap_or(&lower);
    stripped.to_ascii_uppercase()
}
