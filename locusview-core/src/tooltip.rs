use crate::annotation::{Annotation, AnnotationPair};
use crate::genome::GenomeInfo;
use crate::types::IntervalRecord;
use serde::{Deserialize, Serialize};

/// Label/value rows describing a hovered record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tooltip {
    pub record_index: usize,
    pub rows: Vec<AnnotationPair>,
}

impl Tooltip {
    /// Standard rows first, then the record's annotation pairs in order.
    /// With a genome layout the positions are shown chromosome-local.
    pub fn for_record(record_index: usize, record: &IntervalRecord, genome: Option<&GenomeInfo>) -> Self {
        let (start, end) = match genome.and_then(|g| g.get_by_name(&record.chromosome)) {
            Some(info) => (
                record.start.saturating_sub(info.offset),
                record.end.saturating_sub(info.offset),
            ),
            None => (record.start, record.end),
        };

        let mut rows = vec![
            row("Chromosome", record.chromosome.clone()),
            row("Start", format_position(start)),
            row("End", format_position(end)),
            row("Value", format_value(record.value)),
        ];
        rows.extend(Annotation::from_record(record).pairs);

        Self { record_index, rows }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.rows
            .iter()
            .find(|r| r.label.eq_ignore_ascii_case(label))
            .map(|r| r.value.as_str())
    }
}

fn row(label: &str, value: String) -> AnnotationPair {
    AnnotationPair {
        label: label.to_string(),
        value,
    }
}

/// Thousands-separated integer position.
fn format_position(pos: u64) -> String {
    let digits = pos.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{:.0}", v)
    } else {
        format!("{:.3}", v)
    }
}
