use std::path::{Path, PathBuf};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::JoinHandle;

use calamine::{open_workbook, Data, DataRef, Reader, Xlsx, XlsxError};
use tracing::warn;

use super::{normalize_headers, Cell, Record, RecordSource};
use crate::types::{AppError, AppResult};

/// Rows decoded ahead of the consumer
const ROW_BUFFER: usize = 1024;

enum SheetMessage {
    Headers(Vec<String>),
    Row(Record),
    Failed(AppError),
}

/// First worksheet of an XLSX workbook. The first non-blank row is the header.
///
/// The cell reader borrows the workbook, so a worker thread owns both and
/// streams decoded rows through a bounded channel. Dropping the source closes
/// the channel, which stops the worker and releases the file.
pub struct XlsxSource {
    headers: Vec<String>,
    rows: Option<Receiver<SheetMessage>>,
    worker: Option<JoinHandle<()>>,
}

impl XlsxSource {
    pub fn open(path: &Path) -> AppResult<Self> {
        let (tx, rx) = sync_channel(ROW_BUFFER);
        let owned = path.to_path_buf();
        let worker = std::thread::Builder::new()
            .name("xlsx-reader".to_string())
            .spawn(move || stream_first_sheet(owned, tx))?;

        let mut source = Self {
            headers: Vec::new(),
            rows: Some(rx),
            worker: Some(worker),
        };

        match source.recv() {
            Some(SheetMessage::Headers(headers)) => source.headers = headers,
            Some(SheetMessage::Failed(e)) => return Err(e),
            // rows never precede the header; a closed channel means no cells
            Some(SheetMessage::Row(_)) | None => source.finish(),
        }
        Ok(source)
    }

    fn recv(&mut self) -> Option<SheetMessage> {
        self.rows.as_ref().and_then(|rx| rx.recv().ok())
    }

    fn finish(&mut self) {
        self.rows = None;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("XLSX reader thread panicked");
            }
        }
    }
}

impl RecordSource for XlsxSource {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_record(&mut self) -> AppResult<Option<Record>> {
        match self.recv() {
            Some(SheetMessage::Row(record)) => Ok(Some(record)),
            Some(SheetMessage::Failed(e)) => {
                self.finish();
                Err(e)
            }
            Some(SheetMessage::Headers(_)) | None => {
                self.finish();
                Ok(None)
            }
        }
    }
}

impl Drop for XlsxSource {
    fn drop(&mut self) {
        self.finish();
    }
}

fn stream_first_sheet(path: PathBuf, tx: SyncSender<SheetMessage>) {
    if let Err(e) = read_first_sheet(&path, &tx) {
        let _ = tx.send(SheetMessage::Failed(e));
    }
}

fn read_first_sheet(path: &Path, tx: &SyncSender<SheetMessage>) -> AppResult<()> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|e: XlsxError| map_xlsx_error(path, e))?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok(());
    };
    let mut cells = workbook
        .worksheet_cells_reader(&sheet)
        .map_err(|e| map_xlsx_error(path, e))?;

    let mut rows = RowAssembler::new(cells.dimensions().start.1, tx);
    let mut current: Option<(u32, Vec<(u32, Cell)>)> = None;

    while let Some(cell) = cells.next_cell().map_err(|e| map_xlsx_error(path, e))? {
        let (row, col) = cell.get_position();
        let value = cell_from_ref(cell.get_value());
        match current.as_mut() {
            Some((r, values)) if *r == row => values.push((col, value)),
            _ => {
                if let Some((r, values)) = current.take() {
                    if !rows.push(r, values) {
                        return Ok(());
                    }
                }
                current = Some((row, vec![(col, value)]));
            }
        }
    }
    if let Some((r, values)) = current {
        rows.push(r, values);
    }
    Ok(())
}

/// Turns the sparse, row-ordered cells of a sheet into header-aligned records.
struct RowAssembler<'a> {
    first_col: u32,
    width: usize,
    last_row: Option<u32>,
    tx: &'a SyncSender<SheetMessage>,
}

impl<'a> RowAssembler<'a> {
    fn new(first_col: u32, tx: &'a SyncSender<SheetMessage>) -> Self {
        Self { first_col, width: 0, last_row: None, tx }
    }

    /// Returns false once the consumer has gone away
    fn push(&mut self, row: u32, values: Vec<(u32, Cell)>) -> bool {
        let Some(last_row) = self.last_row else {
            return self.push_header(row, values);
        };

        // rows missing from the sheet XML are blank rows inside the data
        for _ in last_row + 1..row {
            if self.tx.send(SheetMessage::Row(vec![Cell::Empty; self.width])).is_err() {
                return false;
            }
        }
        self.last_row = Some(row);

        let mut record = vec![Cell::Empty; self.width];
        for (col, value) in values {
            if let Some(slot) = self.slot(col).and_then(|idx| record.get_mut(idx)) {
                *slot = value;
            }
        }
        self.tx.send(SheetMessage::Row(record)).is_ok()
    }

    fn push_header(&mut self, row: u32, values: Vec<(u32, Cell)>) -> bool {
        let Some(width) = values
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .filter_map(|(col, _)| self.slot(*col))
            .max()
            .map(|idx| idx + 1)
        else {
            // leading blank rows are not the header
            return true;
        };

        let mut labels = vec![String::new(); width];
        for (col, value) in values {
            if let Some(label) = self.slot(col).and_then(|idx| labels.get_mut(idx)) {
                *label = value.as_label().unwrap_or_default();
            }
        }

        self.width = width;
        self.last_row = Some(row);
        self.tx.send(SheetMessage::Headers(normalize_headers(labels))).is_ok()
    }

    fn slot(&self, col: u32) -> Option<usize> {
        col.checked_sub(self.first_col).map(|c| c as usize)
    }
}

pub(crate) fn cell_from_ref(data: &DataRef<'_>) -> Cell {
    match data {
        DataRef::Empty | DataRef::Error(_) => Cell::Empty,
        DataRef::Int(v) => Cell::Int(*v),
        DataRef::Float(v) => Cell::Float(*v),
        DataRef::Bool(v) => Cell::Bool(*v),
        DataRef::String(s) => text_cell(s),
        DataRef::SharedString(s) => text_cell(s),
        other => Cell::Text(Data::from(other.clone()).to_string()),
    }
}

fn text_cell(s: &str) -> Cell {
    if s.trim().is_empty() {
        Cell::Empty
    } else {
        Cell::Text(s.to_string())
    }
}

fn map_xlsx_error(path: &Path, err: XlsxError) -> AppError {
    match err {
        XlsxError::Io(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
            ) =>
        {
            AppError::SourceNotFound { path: path.to_path_buf() }
        }
        other => AppError::MalformedSource {
            line: 0,
            reason: format!("unreadable workbook '{}': {}", path.display(), other),
        },
    }
}
