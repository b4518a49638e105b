//! Pipeline Orchestrator
//!
//! Drives Reader → Aggregator → Summarizer → Inference Client for every
//! chunk, strictly in arrival order, then asks for one synthesis across all
//! chunk narratives and hands the report to a [`ReportWriter`].
//!
//! Reading failures abort the run before anything is written. Inference
//! failures never abort: the error text is recorded as the narrative.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::agents::summarizer::NarrativeSummarizer;
use crate::analysis::{aggregate_chunk, GlobalSummary};
use crate::config::AnalysisConfig;
use crate::ingest::{Chunk, ChunkReader};
use crate::llm::InferenceClient;
use crate::models::{AnalysisReport, ChunkResult};
use crate::storage::{ReportWriter, TextReportWriter};
use crate::types::{AppError, AppResult};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Reading,
    Aggregating,
    Summarizing,
    Inferring,
    Recording,
    Finalizing,
    Done,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Reading => "reading",
            PipelineStage::Aggregating => "aggregating",
            PipelineStage::Summarizing => "summarizing",
            PipelineStage::Inferring => "inferring",
            PipelineStage::Recording => "recording",
            PipelineStage::Finalizing => "finalizing",
            PipelineStage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// One orchestrator drives one run; it owns that run's [`GlobalSummary`].
pub struct PipelineOrchestrator {
    inference: InferenceClient,
    analysis: AnalysisConfig,
    stage: PipelineStage,
}

impl PipelineOrchestrator {
    pub fn new(inference: InferenceClient, analysis: AnalysisConfig) -> Self {
        Self {
            inference,
            analysis,
            stage: PipelineStage::Idle,
        }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn enter(&mut self, next: PipelineStage) {
        debug!(from = %self.stage, to = %next, "Pipeline stage transition");
        self.stage = next;
    }

    /// Read, aggregate and narrate `path`; returns the report without writing it
    pub async fn run(&mut self, path: &Path, chunk_size: usize) -> AppResult<AnalysisReport> {
        info!(path = %path.display(), chunk_size, "Starting analysis");
        self.enter(PipelineStage::Reading);

        let reader = ChunkReader::open(path, chunk_size)?;
        self.run_chunks(reader, path.to_path_buf(), chunk_size).await
    }

    /// Process an already opened chunk sequence
    pub async fn run_chunks<I>(
        &mut self,
        chunks: I,
        file_path: PathBuf,
        chunk_size: usize,
    ) -> AppResult<AnalysisReport>
    where
        I: IntoIterator<Item = AppResult<Chunk>>,
        I::IntoIter: Send,
    {
        let started_at = Utc::now();
        let mut global = GlobalSummary::new();
        let mut results: Vec<ChunkResult> = Vec::new();

        self.enter(PipelineStage::Reading);
        for chunk in chunks {
            let chunk = chunk?;
            let result = self.process_chunk(&chunk, &mut global).await;
            results.push(result);

            debug_assert_eq!(
                results.iter().map(|r| r.row_count).sum::<u64>(),
                global.total_rows_processed
            );
            self.enter(PipelineStage::Reading);
        }

        if results.is_empty() {
            return Err(AppError::EmptySource { path: file_path });
        }

        self.enter(PipelineStage::Finalizing);
        info!(
            chunks = global.chunks_processed,
            total_rows = global.total_rows_processed,
            numeric_sum = global.numeric_sum,
            categories = global.category_counts.len(),
            "All chunks processed, requesting synthesis"
        );

        let final_prompt =
            NarrativeSummarizer::synthesis_prompt(&global, &results, &self.analysis.numeric_column);
        let final_narrative = self.inference.generate(&final_prompt).await;

        let report = AnalysisReport {
            file_path,
            chunk_size,
            global_summary: global,
            chunk_results: results,
            final_narrative: final_narrative.text,
            final_inference_failed: final_narrative.failed,
            started_at,
            finished_at: Utc::now(),
        };

        let failed = report.failed_inference_calls();
        if failed > 0 {
            warn!(failed, "Analysis finished with failed inference calls");
        }
        Ok(report)
    }

    async fn process_chunk(&mut self, chunk: &Chunk, global: &mut GlobalSummary) -> ChunkResult {
        self.enter(PipelineStage::Aggregating);
        let (stats, updated) = aggregate_chunk(chunk, global, &self.analysis);
        *global = updated;
        info!(
            chunk_id = chunk.index,
            first_row = chunk.first_row,
            last_row = chunk.last_row(),
            high_value_rows = stats.high_value_count(),
            "Processing chunk"
        );

        self.enter(PipelineStage::Summarizing);
        let summary = NarrativeSummarizer::render_chunk_summary(&stats);
        let (sample, high_value) = NarrativeSummarizer::sample_records(chunk, &stats);
        let prompt = NarrativeSummarizer::chunk_prompt(&summary, &sample, &high_value);

        self.enter(PipelineStage::Inferring);
        let narrative = self.inference.generate(&prompt).await;

        self.enter(PipelineStage::Recording);
        ChunkResult {
            chunk_id: stats.chunk_id,
            row_count: stats.row_count,
            summary,
            narrative: narrative.text,
            inference_failed: narrative.failed,
        }
    }

    /// Run and hand the finished report to `writer`
    pub async fn run_to(
        &mut self,
        path: &Path,
        chunk_size: usize,
        writer: &dyn ReportWriter,
    ) -> AppResult<AnalysisReport> {
        let report = self.run(path, chunk_size).await?;
        writer.write_report(&report).await?;
        self.enter(PipelineStage::Done);
        info!(
            path = %path.display(),
            chunks = report.chunk_results.len(),
            "Analysis complete"
        );
        Ok(report)
    }
}

/// Pipeline entry point: analyze `path` and write the text report to `output`.
///
/// When reading fails nothing is written to `output`.
pub async fn analyze_file(
    inference: InferenceClient,
    analysis: AnalysisConfig,
    path: &Path,
    chunk_size: usize,
    output: &Path,
) -> AppResult<AnalysisReport> {
    let writer = TextReportWriter::new(output);
    PipelineOrchestrator::new(inference, analysis)
        .run_to(path, chunk_size, &writer)
        .await
}
