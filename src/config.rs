use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LLMConfig,
    pub upload: UploadConfig,
    pub analysis: AnalysisConfig,
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LLMConfig {
    pub base_url: String,
    pub completions_path: String,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl LLMConfig {
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.completions_path.trim_start_matches('/')
        )
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1234".to_string(),
            completions_path: "/v1/chat/completions".to_string(),
            model: None,
            api_key: None,
            temperature: 0.7,
            max_tokens: 500,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub upload_dir: PathBuf,
    pub chunk_size: usize,
    pub max_upload_bytes: usize,
}

/// Which columns the aggregator looks at and the high-value cut-off.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    pub numeric_column: String,
    pub category_column: String,
    pub high_value_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            numeric_column: "value1".to_string(),
            category_column: "category".to_string(),
            high_value_threshold: 40000.0,
        }
    }
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .with_context(|| format!("Invalid value for {}", name))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let analysis_defaults = AnalysisConfig::default();

        Ok(Self {
            server: ServerConfig {
                port: parse_var("PORT", "5000")?,
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                cors_allowed_origins: env::var("ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            llm: LLMConfig {
                base_url: env::var("LLM_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:1234".to_string()),
                completions_path: env::var("LLM_COMPLETIONS_PATH")
                    .unwrap_or_else(|_| "/v1/chat/completions".to_string()),
                model: optional_var("LLM_MODEL"),
                api_key: optional_var("LLM_API_KEY"),
                temperature: parse_var("LLM_TEMPERATURE", "0.7")?,
                max_tokens: parse_var("LLM_MAX_TOKENS", "500")?,
                timeout_secs: parse_var("LLM_TIMEOUT_SECS", "120")?,
            },
            upload: UploadConfig {
                upload_dir: PathBuf::from(
                    env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
                ),
                chunk_size: parse_var("CHUNK_SIZE", "10000")?,
                max_upload_bytes: parse_var("MAX_UPLOAD_BYTES", "1073741824")?,
            },
            analysis: AnalysisConfig {
                numeric_column: env::var("NUMERIC_COLUMN")
                    .unwrap_or(analysis_defaults.numeric_column),
                category_column: env::var("CATEGORY_COLUMN")
                    .unwrap_or(analysis_defaults.category_column),
                high_value_threshold: parse_var("HIGH_VALUE_THRESHOLD", "40000")?,
            },
            log_dir: optional_var("LOG_DIR").map(PathBuf::from),
        })
    }
}
