use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::models::AnalysisReport;
use crate::types::{AppError, AppResult};

/// Receives the finished report of a run.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write_report(&self, report: &AnalysisReport) -> AppResult<()>;
}

/// Plain-text report on the local filesystem.
///
/// The text is written to a sibling `.partial` file and renamed into place,
/// so the destination only ever holds a complete report.
pub struct TextReportWriter {
    destination: PathBuf,
}

impl TextReportWriter {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self { destination: destination.into() }
    }
}

pub fn render_report(report: &AnalysisReport) -> AppResult<String> {
    let summary_json = serde_json::to_string_pretty(&report.global_summary)
        .map_err(|e| AppError::Internal(format!("Failed to serialize global summary: {}", e)))?;

    let mut out = String::new();
    out.push_str("--- Large File Analysis Results ---\n\n");
    out.push_str(&format!("File Processed: {}\n", report.file_path.display()));
    out.push_str(&format!("Chunk Size: {}\n", report.chunk_size));
    out.push_str(&format!(
        "Started: {}\nFinished: {}\n\n",
        report.started_at.to_rfc3339(),
        report.finished_at.to_rfc3339()
    ));
    out.push_str("--- Global Data Summary ---\n");
    out.push_str(&summary_json);
    out.push_str("\n\n");
    out.push_str("--- Detailed Chunk-by-Chunk LLM Analysis ---\n");
    for result in &report.chunk_results {
        out.push_str(&format!("\nChunk {}:\n", result.chunk_id));
        out.push_str(&format!("  Summary:\n{}", result.summary));
        out.push_str(&format!("  LLM Insights:\n{}\n", result.narrative));
    }
    out.push_str("\n--- Final Comprehensive LLM Analysis ---\n");
    out.push_str(&report.final_narrative);
    out.push('\n');
    Ok(out)
}

#[async_trait]
impl ReportWriter for TextReportWriter {
    async fn write_report(&self, report: &AnalysisReport) -> AppResult<()> {
        let text = render_report(report)?;

        if let Some(parent) = self.destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut partial = self.destination.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);

        let written = match fs::write(&partial, text.as_bytes()).await {
            Ok(()) => fs::rename(&partial, &self.destination).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        info!(path = %self.destination.display(), bytes = text.len(), "Report written");
        Ok(())
    }
}
