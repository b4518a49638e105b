//! Tabular Reader
//!
//! Opens a CSV or XLSX file and hands out bounded-size [`Chunk`]s of records
//! in the file's native row order. The reader is a plain [`Iterator`]: lazy,
//! finite and not restartable. It owns the open source handle and releases it
//! as soon as the source is exhausted, fails, or the reader is dropped.
//!
//! The first chunk is read eagerly in [`ChunkReader::open`] so that an empty
//! source is reported before any chunk reaches the pipeline.

pub mod csv_source;
pub mod sample;
pub mod xlsx_source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::types::{AppError, AppResult};

pub use csv_source::CsvSource;
pub use xlsx_source::XlsxSource;

/// Values pandas-style readers treat as missing.
const MISSING_MARKERS: &[&str] = &["NA", "N/A", "NaN", "nan", "null", "NULL", "None", "#N/A"];

/// Supported source formats, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Xlsx,
}

impl TabularFormat {
    /// Match a bare extension (without the dot), case-insensitively
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(TabularFormat::Csv),
            "xlsx" => Some(TabularFormat::Xlsx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> AppResult<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_extension(&extension).ok_or_else(|| AppError::UnsupportedFormat {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                format!(".{}", extension.to_ascii_lowercase())
            },
        })
    }
}

impl std::fmt::Display for TabularFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TabularFormat::Csv => write!(f, "csv"),
            TabularFormat::Xlsx => write!(f, "xlsx"),
        }
    }
}

/// One typed value of a record.
///
/// Serializes untagged, so a record rendered as JSON looks like the source
/// data (`null` for empty cells).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Cell {
    /// Type a raw delimited-text field: integer, float, boolean, then text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
            return Cell::Empty;
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return Cell::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            if value.is_finite() {
                return Cell::Float(value);
            }
        }
        match trimmed {
            "true" | "True" | "TRUE" => Cell::Bool(true),
            "false" | "False" | "FALSE" => Cell::Bool(false),
            _ => Cell::Text(trimmed.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Label used when the cell is counted as a category.
    ///
    /// Floats keep their fractional part (`2.0`), so they never share a label
    /// with the integer `2`.
    pub fn as_label(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Int(v) => Some(v.to_string()),
            Cell::Float(v) => Some(format!("{:?}", v)),
            Cell::Bool(v) => Some(v.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }
}

pub type Record = Vec<Cell>;

/// Pull-based access to the records of one open source.
pub trait RecordSource: Send {
    fn headers(&self) -> &[String];

    /// Next record, aligned to the header width. `Ok(None)` once exhausted.
    fn next_record(&mut self) -> AppResult<Option<Record>>;
}

/// A bounded batch of records read sequentially from the source.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 1-based position of this chunk in the source
    pub index: usize,
    /// 1-based data row number of the first record
    pub first_row: u64,
    pub headers: Arc<[String]>,
    pub records: Vec<Record>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last_row(&self) -> u64 {
        self.first_row + self.records.len() as u64 - 1
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Render a record as a JSON object keyed by header
    pub fn record_json(&self, record: &[Cell]) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .headers
            .iter()
            .zip(record.iter())
            .map(|(header, cell)| {
                (
                    header.clone(),
                    serde_json::to_value(cell).unwrap_or(serde_json::Value::Null),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

/// Normalize a header row: strip a UTF-8 BOM and name blank columns.
pub(crate) fn normalize_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter()
        .enumerate()
        .map(|(idx, h)| {
            let h = h.as_ref().trim_start_matches('\u{feff}').trim();
            if h.is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                h.to_string()
            }
        })
        .collect()
}

/// Lazy iterator over the chunks of one source file.
pub struct ChunkReader {
    path: PathBuf,
    format: TabularFormat,
    source: Option<Box<dyn RecordSource>>,
    headers: Arc<[String]>,
    chunk_size: usize,
    chunks_emitted: usize,
    rows_read: u64,
    pending: Option<Chunk>,
}

impl std::fmt::Debug for ChunkReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReader")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("chunk_size", &self.chunk_size)
            .field("chunks_emitted", &self.chunks_emitted)
            .field("rows_read", &self.rows_read)
            .field("open", &self.source.is_some())
            .finish()
    }
}

impl ChunkReader {
    /// Open `path` and read its first chunk.
    ///
    /// Fails with `UnsupportedFormat`, `SourceNotFound`, `EmptySource` or
    /// `MalformedSource`; a zero `chunk_size` is an `InvalidRequest`.
    pub fn open(path: impl AsRef<Path>, chunk_size: usize) -> AppResult<Self> {
        let path = path.as_ref().to_path_buf();
        if chunk_size == 0 {
            return Err(AppError::InvalidRequest(
                "chunk size must be a positive integer".to_string(),
            ));
        }

        let format = TabularFormat::from_path(&path)?;

        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(AppError::SourceNotFound { path }),
        }

        let source: Box<dyn RecordSource> = match format {
            TabularFormat::Csv => Box::new(CsvSource::open(&path)?),
            TabularFormat::Xlsx => Box::new(XlsxSource::open(&path)?),
        };

        Self::from_source(path, format, source, chunk_size)
    }

    /// Wrap an already opened source. Reads the first chunk eagerly.
    pub fn from_source(
        path: PathBuf,
        format: TabularFormat,
        source: Box<dyn RecordSource>,
        chunk_size: usize,
    ) -> AppResult<Self> {
        if chunk_size == 0 {
            return Err(AppError::InvalidRequest(
                "chunk size must be a positive integer".to_string(),
            ));
        }

        let headers: Arc<[String]> = source.headers().to_vec().into();
        let mut reader = Self {
            path,
            format,
            source: Some(source),
            headers,
            chunk_size,
            chunks_emitted: 0,
            rows_read: 0,
            pending: None,
        };

        match reader.read_chunk()? {
            Some(first) => reader.pending = Some(first),
            None => return Err(AppError::EmptySource { path: reader.path }),
        }

        info!(
            path = %reader.path.display(),
            format = %reader.format,
            columns = reader.headers.len(),
            chunk_size,
            "Opened tabular source"
        );

        Ok(reader)
    }

    /// Whether the underlying file handle is still held
    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    fn read_chunk(&mut self) -> AppResult<Option<Chunk>> {
        let Some(source) = self.source.as_mut() else {
            return Ok(None);
        };

        let mut records = Vec::with_capacity(self.chunk_size.min(4096));
        while records.len() < self.chunk_size {
            match source.next_record() {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    debug!(path = %self.path.display(), rows = self.rows_read + records.len() as u64, "Source exhausted");
                    self.source = None;
                    break;
                }
                Err(e) => {
                    self.source = None;
                    return Err(e);
                }
            }
        }

        if records.is_empty() {
            return Ok(None);
        }

        self.chunks_emitted += 1;
        let chunk = Chunk {
            index: self.chunks_emitted,
            first_row: self.rows_read + 1,
            headers: Arc::clone(&self.headers),
            records,
        };
        self.rows_read += chunk.len() as u64;
        Ok(Some(chunk))
    }
}

impl Iterator for ChunkReader {
    type Item = AppResult<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(chunk) = self.pending.take() {
            return Some(Ok(chunk));
        }
        self.read_chunk().transpose()
    }
}
