use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub file_name: String,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub rows_processed: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl RunRecord {
    pub fn started(id: Uuid, file_name: impl Into<String>) -> Self {
        Self {
            id,
            file_name: file_name.into(),
            status: RunStatus::Running,
            report_path: None,
            error: None,
            rows_processed: 0,
            started_at: chrono::Utc::now(),
            finished_at: None,
        }
    }
}

/// In-memory record of the analyses this process has run.
#[derive(Clone, Default)]
pub struct RunRegistry {
    inner: Arc<RwLock<HashMap<Uuid, RunRecord>>>,
}

impl RunRegistry {
    pub async fn insert(&self, record: RunRecord) {
        let mut guard = self.inner.write().await;
        guard.insert(record.id, record);
    }

    pub async fn get(&self, id: &Uuid) -> Option<RunRecord> {
        let guard = self.inner.read().await;
        guard.get(id).cloned()
    }

    pub async fn complete(&self, id: &Uuid, report_path: PathBuf, rows_processed: u64) {
        let mut guard = self.inner.write().await;
        if let Some(record) = guard.get_mut(id) {
            record.status = RunStatus::Completed;
            record.report_path = Some(report_path);
            record.rows_processed = rows_processed;
            record.finished_at = Some(chrono::Utc::now());
        }
    }

    pub async fn fail(&self, id: &Uuid, error: impl Into<String>) {
        let mut guard = self.inner.write().await;
        if let Some(record) = guard.get_mut(id) {
            record.status = RunStatus::Failed;
            record.error = Some(error.into());
            record.finished_at = Some(chrono::Utc::now());
        }
    }

    /// All runs, newest first
    pub async fn list(&self) -> Vec<RunRecord> {
        let guard = self.inner.read().await;
        let mut runs: Vec<RunRecord> = guard.values().cloned().collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }
}
