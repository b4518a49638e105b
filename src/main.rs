use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use oxidized_analyst::{
    agents::analyze_file,
    config::Config,
    data_registry::RunRegistry,
    ingest::sample::write_sample_csv,
    llm::InferenceClient,
    routes::create_router,
    utils::init_logger,
    AppState,
};

#[derive(Parser)]
#[command(name = "oxidized-analyst")]
#[command(about = "Chunked analysis of large CSV/XLSX files with LLM narratives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the upload form and API (default if no command specified)
    Serve,

    /// Analyze one file and write the text report
    Analyze {
        /// CSV or XLSX file to analyze
        file: PathBuf,

        /// Records per chunk (defaults to CHUNK_SIZE)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Report destination (defaults to analysis_results_<stem>.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic CSV for trying the pipeline out
    Sample {
        path: PathBuf,

        #[arg(long, default_value_t = 100_000)]
        rows: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config);

    match cli.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::Analyze { file, chunk_size, output }) => {
            analyze(config, &file, chunk_size, output).await
        }
        Some(Commands::Sample { path, rows }) => {
            write_sample_csv(&path, rows)?;
            info!(path = %path.display(), rows, "Sample CSV written");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Configuration loaded: {:?}", config.server);

    let inference = InferenceClient::from_config(&config.llm)?;
    info!(endpoint = inference.endpoint(), "Inference client ready");

    tokio::fs::create_dir_all(&config.upload.upload_dir)
        .await
        .with_context(|| format!("Failed to create {}", config.upload.upload_dir.display()))?;

    // Create shared state
    let state = AppState {
        config: config.clone(),
        inference,
        runs: RunRegistry::default(),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.server.host, config.server.port))?;
    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}

async fn analyze(
    config: Config,
    file: &Path,
    chunk_size: Option<usize>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let chunk_size = chunk_size.unwrap_or(config.upload.chunk_size);
    let output = output.unwrap_or_else(|| default_output(file));
    let inference = InferenceClient::from_config(&config.llm)?;

    let report = analyze_file(inference, config.analysis.clone(), file, chunk_size, &output)
        .await
        .with_context(|| format!("Analysis of {} failed", file.display()))?;

    let failed = report.failed_inference_calls();
    if failed > 0 {
        warn!(failed, "Some narratives could not be generated; see the report for details");
    }
    println!("Analysis complete. Results saved to {}", output.display());
    Ok(())
}

fn default_output(file: &Path) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload".to_string());
    PathBuf::from(format!("analysis_results_{}.txt", stem))
}
