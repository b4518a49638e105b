// Oxidized Analyst - chunked analysis of large tabular files with LLM narratives

pub mod config;
pub mod models;
pub mod types;
pub mod ingest;    // CSV/XLSX chunked readers
pub mod analysis;  // Per-chunk statistics and the global summary
pub mod llm;
pub mod agents;    // Summarizer and pipeline orchestrator
pub mod storage;
pub mod routes;
pub mod middleware;
pub mod utils;
pub mod data_registry;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;
