//! Analysis Pipeline
//!
//! The components that turn a tabular file into a narrated report:
//!
//! - **Narrative Summarizer**: renders chunk statistics and sample records into prompts
//! - **Pipeline Orchestrator**: drives the per-chunk sequence and the final synthesis
//!
//! ## Pipeline Overview
//!
//! ```text
//! file path + chunk size
//!      │
//!      ▼
//! ┌─────────────┐
//! │   Reader    │  → next chunk (≤ chunk_size records)
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Aggregator  │  → chunk statistics, global summary folded
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │ Summarizer  │  → chunk prompt
//! └─────────────┘
//!      │
//!      ▼
//! ┌─────────────┐
//! │  Inference  │  → narrative (or error text)
//! └─────────────┘
//!      │
//!      └──► back to Reader until exhausted, then one synthesis call
//!           and the report goes to the report writer
//! ```

pub mod orchestrator;
pub mod summarizer;

pub use orchestrator::{analyze_file, PipelineOrchestrator, PipelineStage};
pub use summarizer::NarrativeSummarizer;
