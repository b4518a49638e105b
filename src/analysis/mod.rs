//! Chunk Aggregator
//!
//! Per-chunk statistics and the running [`GlobalSummary`] they fold into.
//! Both designated columns are optional per chunk: a chunk without the
//! numeric column contributes nothing to the numeric totals and reports its
//! mean as unavailable, a chunk without the category column contributes an
//! empty frequency map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::AnalysisConfig;
use crate::ingest::Chunk;

/// Numeric column totals for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericSummary {
    pub column: String,
    pub sum: f64,
    /// Cells that held a number
    pub count: u64,
    /// Non-empty cells that did not hold a number; skipped, not fatal
    pub non_numeric: u64,
}

impl NumericSummary {
    pub fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Statistics derived from a single chunk. Immutable once computed.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkStatistics {
    pub chunk_id: usize,
    pub first_row: u64,
    pub row_count: u64,
    /// `None` when the numeric column is absent from the chunk
    pub numeric: Option<NumericSummary>,
    pub category_column: String,
    pub category_present: bool,
    pub category_counts: BTreeMap<String, u64>,
    pub high_value_threshold: f64,
    /// Positions (within the chunk) of rows whose numeric value exceeds the threshold
    pub high_value_rows: Vec<usize>,
}

impl ChunkStatistics {
    pub fn compute(chunk: &Chunk, config: &AnalysisConfig) -> Self {
        let numeric_idx = chunk.column_index(&config.numeric_column);
        let category_idx = chunk.column_index(&config.category_column);

        let mut numeric = numeric_idx.map(|_| NumericSummary {
            column: config.numeric_column.clone(),
            sum: 0.0,
            count: 0,
            non_numeric: 0,
        });
        let mut category_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut high_value_rows = Vec::new();

        for (pos, record) in chunk.records.iter().enumerate() {
            if let (Some(idx), Some(summary)) = (numeric_idx, numeric.as_mut()) {
                if let Some(cell) = record.get(idx) {
                    match cell.as_f64() {
                        Some(value) => {
                            summary.sum += value;
                            summary.count += 1;
                            if value > config.high_value_threshold {
                                high_value_rows.push(pos);
                            }
                        }
                        None if !cell.is_empty() => summary.non_numeric += 1,
                        None => {}
                    }
                }
            }

            if let Some(label) = category_idx
                .and_then(|idx| record.get(idx))
                .and_then(|cell| cell.as_label())
            {
                *category_counts.entry(label).or_insert(0) += 1;
            }
        }

        Self {
            chunk_id: chunk.index,
            first_row: chunk.first_row,
            row_count: chunk.len() as u64,
            numeric,
            category_column: config.category_column.clone(),
            category_present: category_idx.is_some(),
            category_counts,
            high_value_threshold: config.high_value_threshold,
            high_value_rows,
        }
    }

    pub fn numeric_sum(&self) -> f64 {
        self.numeric.as_ref().map(|n| n.sum).unwrap_or(0.0)
    }

    pub fn numeric_mean(&self) -> Option<f64> {
        self.numeric.as_ref().and_then(NumericSummary::mean)
    }

    pub fn high_value_count(&self) -> usize {
        self.high_value_rows.len()
    }

    /// Labels by descending count, ties broken by label
    pub fn ranked_categories(&self) -> Vec<(&str, u64)> {
        rank(&self.category_counts)
    }
}

/// Cumulative accumulator for one pipeline run.
///
/// `merge` is associative and commutative, so folding chunk statistics in any
/// order yields the same totals (up to float rounding of `numeric_sum`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalSummary {
    pub chunks_processed: u64,
    pub total_rows_processed: u64,
    pub numeric_sum: f64,
    pub numeric_count: u64,
    pub category_counts: BTreeMap<String, u64>,
}

impl GlobalSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, other: &GlobalSummary) {
        self.chunks_processed += other.chunks_processed;
        self.total_rows_processed += other.total_rows_processed;
        self.numeric_sum += other.numeric_sum;
        self.numeric_count += other.numeric_count;
        for (label, count) in &other.category_counts {
            *self.category_counts.entry(label.clone()).or_insert(0) += count;
        }
    }

    pub fn merged(mut self, other: &GlobalSummary) -> Self {
        self.merge(other);
        self
    }

    /// Fold one chunk's statistics into the running totals
    pub fn absorb(&mut self, stats: &ChunkStatistics) {
        self.merge(&GlobalSummary::from(stats));
    }

    pub fn numeric_mean(&self) -> Option<f64> {
        if self.numeric_count == 0 {
            None
        } else {
            Some(self.numeric_sum / self.numeric_count as f64)
        }
    }

    pub fn ranked_categories(&self) -> Vec<(&str, u64)> {
        rank(&self.category_counts)
    }
}

impl From<&ChunkStatistics> for GlobalSummary {
    fn from(stats: &ChunkStatistics) -> Self {
        Self {
            chunks_processed: 1,
            total_rows_processed: stats.row_count,
            numeric_sum: stats.numeric_sum(),
            numeric_count: stats.numeric.as_ref().map(|n| n.count).unwrap_or(0),
            category_counts: stats.category_counts.clone(),
        }
    }
}

/// Pure aggregation step: statistics for `chunk` and the summary with them folded in.
pub fn aggregate_chunk(
    chunk: &Chunk,
    global: &GlobalSummary,
    config: &AnalysisConfig,
) -> (ChunkStatistics, GlobalSummary) {
    let stats = ChunkStatistics::compute(chunk, config);
    let updated = global.clone().merged(&GlobalSummary::from(&stats));
    (stats, updated)
}

fn rank(counts: &BTreeMap<String, u64>) -> Vec<(&str, u64)> {
    let mut ranked: Vec<(&str, u64)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
}
