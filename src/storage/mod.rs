// Local storage for uploaded sources and generated reports

pub mod report_writer;

pub use report_writer::*;

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use crate::types::{AppError, AppResult};

/// Reduce a client-supplied file name to a safe single path component.
///
/// Keeps ASCII letters, digits, `.`, `-` and `_`; whitespace becomes `_`;
/// everything else (including path separators) is dropped. Returns `None`
/// when nothing usable is left.
pub fn secure_filename(name: &str) -> Option<String> {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                Some(c)
            } else if c.is_whitespace() {
                Some('_')
            } else {
                None
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches(&['.', '_'][..]).to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
}

impl UploadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open the destination for an upload under a run-specific name, so
    /// concurrent uploads of the same file never share a path.
    pub async fn create(&self, run_id: &Uuid, file_name: &str) -> AppResult<StagedUpload> {
        let safe = secure_filename(file_name)
            .ok_or_else(|| AppError::InvalidRequest(format!("Unusable file name: {}", file_name)))?;
        fs::create_dir_all(&self.root).await?;

        let path = self.root.join(format!("{}_{}", short_id(run_id), safe));
        let file = fs::File::create(&path).await?;
        Ok(StagedUpload { path, file, bytes: 0 })
    }

    /// `analysis_results_<stem>_<run>.txt` next to the uploads
    pub fn report_path(&self, run_id: &Uuid, file_name: &str) -> PathBuf {
        let safe = secure_filename(file_name).unwrap_or_else(|| "upload".to_string());
        let stem = Path::new(&safe)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or(safe);
        self.root
            .join(format!("analysis_results_{}_{}.txt", stem, short_id(run_id)))
    }
}

/// An upload being written to disk piece by piece as it arrives.
#[derive(Debug)]
pub struct StagedUpload {
    path: PathBuf,
    file: fs::File,
    bytes: u64,
}

impl StagedUpload {
    pub async fn write_chunk(&mut self, data: &[u8]) -> AppResult<()> {
        self.file.write_all(data).await?;
        self.bytes += data.len() as u64;
        Ok(())
    }

    pub async fn finish(mut self) -> AppResult<PathBuf> {
        self.file.flush().await?;
        info!(path = %self.path.display(), bytes = self.bytes, "Stored upload");
        Ok(self.path)
    }

    /// Remove what was written so far
    pub async fn discard(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.path).await {
            warn!(path = %self.path.display(), error = %e, "Failed to remove incomplete upload");
        }
    }
}

fn short_id(run_id: &Uuid) -> String {
    run_id.simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("sales data.csv").as_deref(), Some("sales_data.csv"));
        assert_eq!(secure_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(secure_filename("C:\\temp\\q1.xlsx").as_deref(), Some("q1.xlsx"));
        assert_eq!(secure_filename(".hidden.csv").as_deref(), Some("hidden.csv"));
        assert_eq!(secure_filename("日本.csv").as_deref(), Some("csv"));
        assert_eq!(secure_filename("///"), None);
    }

    #[tokio::test]
    async fn test_create_and_report_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = UploadStore::new(dir.path().join("uploads"));
        let run_id = Uuid::new_v4();

        let mut upload = store.create(&run_id, "my data.csv").await.unwrap();
        upload.write_chunk(b"a,b\n").await.unwrap();
        upload.write_chunk(b"1,2\n").await.unwrap();
        let path = upload.finish().await.unwrap();
        assert!(path.starts_with(store.root()));
        assert!(path.file_name().unwrap().to_string_lossy().ends_with("_my_data.csv"));
        assert_eq!(std::fs::read(&path).unwrap(), b"a,b\n1,2\n");

        let report = store.report_path(&run_id, "my data.csv");
        let name = report.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("analysis_results_my_data_"));
        assert!(name.ends_with(".txt"));
    }

    #[tokio::test]
    async fn test_discard_removes_partial_upload() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = UploadStore::new(dir.path());
        let run_id = Uuid::new_v4();

        let mut upload = store.create(&run_id, "big.csv").await.unwrap();
        upload.write_chunk(b"value1\n1\n").await.unwrap();
        upload.discard().await;

        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_unusable_name_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = UploadStore::new(dir.path());
        let err = store.create(&Uuid::new_v4(), "///").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }
}
