use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};

use super::{normalize_headers, Cell, Record, RecordSource};
use crate::types::{AppError, AppResult};

/// Delimited-text source. Rows are parsed flexibly: short rows are padded
/// with empty cells and long rows are cut to the header width.
pub struct CsvSource {
    reader: csv::Reader<File>,
    headers: Vec<String>,
    record: StringRecord,
}

impl CsvSource {
    pub fn open(path: &Path) -> AppResult<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                AppError::SourceNotFound { path: path.to_path_buf() }
            }
            _ => AppError::Io(e),
        })?;

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let headers = normalize_headers(reader.headers().map_err(map_csv_error)?.iter());

        Ok(Self {
            reader,
            headers,
            record: StringRecord::new(),
        })
    }
}

impl RecordSource for CsvSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_record(&mut self) -> AppResult<Option<Record>> {
        if self.headers.is_empty() {
            return Ok(None);
        }
        if !self.reader.read_record(&mut self.record).map_err(map_csv_error)? {
            return Ok(None);
        }

        let width = self.headers.len();
        let mut record: Record = self.record.iter().take(width).map(Cell::infer).collect();
        record.resize(width, Cell::Empty);
        Ok(Some(record))
    }
}

fn map_csv_error(err: csv::Error) -> AppError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    let reason = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(io) => AppError::Io(io),
        _ => AppError::MalformedSource { line, reason },
    }
}
