//! Narrative Summarizer
//!
//! Turns chunk statistics and a handful of raw records into prompts for the
//! inference service. Everything here is deterministic and side-effect free.

use crate::analysis::{ChunkStatistics, GlobalSummary};
use crate::ingest::Chunk;
use crate::models::ChunkResult;

/// Leading records shown to the model for context
pub const SAMPLE_RECORDS: usize = 5;
/// Leading high-value records shown to the model
pub const HIGH_VALUE_SAMPLE_RECORDS: usize = 3;

pub struct NarrativeSummarizer;

impl NarrativeSummarizer {
    /// Leading records and leading high-value records of `chunk`, as JSON objects
    pub fn sample_records(
        chunk: &Chunk,
        stats: &ChunkStatistics,
    ) -> (Vec<serde_json::Value>, Vec<serde_json::Value>) {
        let leading = chunk
            .records
            .iter()
            .take(SAMPLE_RECORDS)
            .map(|r| chunk.record_json(r))
            .collect();
        let high_value = stats
            .high_value_rows
            .iter()
            .take(HIGH_VALUE_SAMPLE_RECORDS)
            .filter_map(|pos| chunk.records.get(*pos))
            .map(|r| chunk.record_json(r))
            .collect();
        (leading, high_value)
    }

    /// Human-readable statistics block, recorded in the report as-is
    pub fn render_chunk_summary(stats: &ChunkStatistics) -> String {
        let mut text = format!(
            "Chunk Summary (Chunk {}):\n  - Rows in chunk: {} (rows {} to {})\n",
            stats.chunk_id,
            stats.row_count,
            stats.first_row,
            stats.first_row + stats.row_count.saturating_sub(1),
        );

        match &stats.numeric {
            Some(numeric) => {
                let mean = numeric
                    .mean()
                    .map(|m| format!("{:.2}", m))
                    .unwrap_or_else(|| "unavailable (no numeric values)".to_string());
                text.push_str(&format!("  - Average '{}': {}\n", numeric.column, mean));
                text.push_str(&format!("  - Sum of '{}': {:.2}\n", numeric.column, numeric.sum));
                if numeric.non_numeric > 0 {
                    text.push_str(&format!(
                        "  - Non-numeric '{}' values skipped: {}\n",
                        numeric.column, numeric.non_numeric
                    ));
                }
                text.push_str(&format!(
                    "  - Number of rows with '{}' > {}: {}\n",
                    numeric.column,
                    stats.high_value_threshold,
                    stats.high_value_count()
                ));
            }
            None => {
                text.push_str("  - Average of numeric column: unavailable (column not present)\n");
                text.push_str("  - High-value rows: 0 (numeric column not present)\n");
            }
        }

        if stats.category_present {
            text.push_str(&format!(
                "  - Category counts ('{}'): {}\n",
                stats.category_column,
                format_counts(&stats.ranked_categories())
            ));
        } else {
            text.push_str(&format!(
                "  - Category counts: unavailable (column '{}' not present)\n",
                stats.category_column
            ));
        }

        text
    }

    /// Prompt asking for insights about one chunk
    pub fn chunk_prompt(
        summary_text: &str,
        sample: &[serde_json::Value],
        high_value: &[serde_json::Value],
    ) -> String {
        let sample_lines = json_lines(sample);
        let high_value_lines = if high_value.is_empty() {
            "None".to_string()
        } else {
            json_lines(high_value)
        };

        format!(
            "Analyze the following data chunk summary and provide insights, potential anomalies, \
or interesting patterns. Consider the overall data context if available (e.g., 'This data is sales transactions').

Chunk Data (first {sample_count} rows as JSON for context):
{sample_lines}

Chunk Summary:
{summary_text}
Specific high-value rows (if any, first {high_count} as JSON):
{high_value_lines}

What are the key takeaways from this chunk regarding trends, outliers, or anything noteworthy?",
            sample_count = SAMPLE_RECORDS,
            high_count = HIGH_VALUE_SAMPLE_RECORDS,
            sample_lines = sample_lines,
            summary_text = summary_text,
            high_value_lines = high_value_lines,
        )
    }

    /// Global figures as listed in the synthesis prompt
    pub fn render_global_summary(global: &GlobalSummary, numeric_column: &str) -> String {
        let mean = global
            .numeric_mean()
            .map(|m| format!("{:.2}", m))
            .unwrap_or_else(|| "unavailable".to_string());
        format!(
            "- Chunks processed: {}\n\
- Total rows processed: {}\n\
- Overall sum of '{col}': {:.2}\n\
- Overall mean of '{col}': {}\n\
- Overall category counts: {}\n",
            global.chunks_processed,
            global.total_rows_processed,
            global.numeric_sum,
            mean,
            format_counts(&global.ranked_categories()),
            col = numeric_column,
        )
    }

    /// Prompt asking for a synthesis across every chunk narrative.
    ///
    /// Only the narratives go in, not the per-chunk statistics, to keep the
    /// prompt size proportional to the number of chunks.
    pub fn synthesis_prompt(
        global: &GlobalSummary,
        results: &[ChunkResult],
        numeric_column: &str,
    ) -> String {
        let mut prompt = format!(
            "Based on the following global summary of a large dataset and individual chunk analyses, \
provide a comprehensive overview, highlight overarching trends, and identify any significant anomalies \
or insights that span across the entire dataset. The data represents a collection of transactions/records.

Global Summary:
{}
Individual Chunk Analyses (Summaries):
",
            Self::render_global_summary(global, numeric_column)
        );

        for result in results {
            prompt.push_str(&format!(
                "--- Chunk {} LLM Analysis ---\n{}\n\n",
                result.chunk_id, result.narrative
            ));
        }

        prompt.push_str(
            "What are the most important conclusions and actionable insights from this entire dataset?",
        );
        prompt
    }
}

fn json_lines(values: &[serde_json::Value]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_counts(counts: &[(&str, u64)]) -> String {
    let inner = counts
        .iter()
        .map(|(label, count)| format!("'{}': {}", label, count))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{{}}}", inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregate_chunk;
    use crate::config::AnalysisConfig;
    use crate::ingest::Cell;

    fn chunk() -> Chunk {
        let values = [10.0, 50000.0, 20.0, 60000.0, 30.0, 70000.0, 80000.0];
        Chunk {
            index: 2,
            first_row: 8,
            headers: vec!["value1".to_string(), "category".to_string()].into(),
            records: values
                .iter()
                .enumerate()
                .map(|(i, v)| vec![Cell::Float(*v), Cell::Text(format!("cat_{}", i % 2))])
                .collect(),
        }
    }

    #[test]
    fn test_samples_are_bounded() {
        let chunk = chunk();
        let (stats, _) = aggregate_chunk(&chunk, &GlobalSummary::new(), &AnalysisConfig::default());
        let (leading, high) = NarrativeSummarizer::sample_records(&chunk, &stats);
        assert_eq!(leading.len(), SAMPLE_RECORDS);
        assert_eq!(high.len(), HIGH_VALUE_SAMPLE_RECORDS);
        assert_eq!(high[0], serde_json::json!({"value1": 50000.0, "category": "cat_1"}));
    }

    #[test]
    fn test_chunk_summary_text() {
        let chunk = chunk();
        let (stats, _) = aggregate_chunk(&chunk, &GlobalSummary::new(), &AnalysisConfig::default());
        let text = NarrativeSummarizer::render_chunk_summary(&stats);
        assert!(text.starts_with("Chunk Summary (Chunk 2):"));
        assert!(text.contains("Rows in chunk: 7 (rows 8 to 14)"));
        assert!(text.contains("Number of rows with 'value1' > 40000: 4"));
        assert!(text.contains("'cat_0': 4, 'cat_1': 3"));
    }

    #[test]
    fn test_missing_columns_are_reported_unavailable() {
        let chunk = Chunk {
            index: 1,
            first_row: 1,
            headers: vec!["id".to_string()].into(),
            records: vec![vec![Cell::Int(1)]],
        };
        let (stats, _) = aggregate_chunk(&chunk, &GlobalSummary::new(), &AnalysisConfig::default());
        let text = NarrativeSummarizer::render_chunk_summary(&stats);
        assert!(text.contains("unavailable (column not present)"));
        assert!(text.contains("unavailable (column 'category' not present)"));
    }

    #[test]
    fn test_chunk_prompt_is_deterministic() {
        let chunk = chunk();
        let (stats, _) = aggregate_chunk(&chunk, &GlobalSummary::new(), &AnalysisConfig::default());
        let summary = NarrativeSummarizer::render_chunk_summary(&stats);
        let (leading, high) = NarrativeSummarizer::sample_records(&chunk, &stats);

        let first = NarrativeSummarizer::chunk_prompt(&summary, &leading, &high);
        let second = NarrativeSummarizer::chunk_prompt(&summary, &leading, &high);
        assert_eq!(first, second);
        assert!(first.contains(r#"{"category":"cat_0","value1":10.0}"#));
        assert!(first.contains(&summary));
    }

    #[test]
    fn test_chunk_prompt_without_high_values() {
        let prompt = NarrativeSummarizer::chunk_prompt("summary", &[], &[]);
        assert!(prompt.contains("first 3 as JSON):\nNone"));
    }

    #[test]
    fn test_synthesis_prompt_lists_narratives_in_order() {
        let mut global = GlobalSummary::new();
        global.chunks_processed = 2;
        global.total_rows_processed = 5;
        global.numeric_sum = 360.0;
        global.numeric_count = 5;
        global.category_counts.insert("a".to_string(), 3);
        global.category_counts.insert("b".to_string(), 2);

        let results = vec![
            ChunkResult { chunk_id: 1, row_count: 3, summary: String::new(), narrative: "first".into(), inference_failed: false },
            ChunkResult { chunk_id: 2, row_count: 2, summary: String::new(), narrative: "second".into(), inference_failed: false },
        ];
        let prompt = NarrativeSummarizer::synthesis_prompt(&global, &results, "value1");

        assert!(prompt.contains("- Total rows processed: 5"));
        assert!(prompt.contains("- Overall sum of 'value1': 360.00"));
        assert!(prompt.contains("- Overall mean of 'value1': 72.00"));
        assert!(prompt.contains("{'a': 3, 'b': 2}"));
        let first = prompt.find("--- Chunk 1 LLM Analysis ---\nfirst").unwrap();
        let second = prompt.find("--- Chunk 2 LLM Analysis ---\nsecond").unwrap();
        assert!(first < second);
    }
}
