use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::entity::{PartInfo, PartState};
use crate::model::vo::CompletedPart;

/// Persisted progress of one multipart upload.
///
/// Invariants kept by [`apply_part_update`](UploadStatus::apply_part_update)
/// and [`apply_uploaded_size`](UploadStatus::apply_uploaded_size):
/// `uploaded_size` equals the summed size of completed parts, and `progress`
/// equals `uploaded_size / file_size * 100` clamped to `[0, 100]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadStatus {
    /// Remote multipart upload id.
    pub upload_id: String,
    pub bucket: String,
    pub key: String,
    /// Total size of the uploading file in bytes.
    pub file_size: u64,
    /// Summed size of completed parts in bytes.
    pub uploaded_size: u64,
    /// Progress percent in `[0, 100]`.
    pub progress: f64,
    pub parts: Vec<PartInfo>,
    pub state: UploadState,
    /// ETag of the assembled object, set once the upload completed.
    pub etag: Option<String>,
    /// Failure reason, if any.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UploadStatus {
    pub fn new(
        upload_id: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        file_size: u64,
        parts: Vec<PartInfo>,
    ) -> Self {
        let now = Utc::now();
        Self {
            upload_id: upload_id.into(),
            bucket: bucket.into(),
            key: key.into(),
            file_size,
            uploaded_size: 0,
            progress: 0.0,
            parts,
            state: UploadState::Initialized,
            etag: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Deterministic state-store key for one `bucket`/`key` pair.
    pub fn storage_key(bucket: &str, key: &str) -> String {
        format!("upload:progress:{bucket}:{key}")
    }

    pub fn completed_size(&self) -> u64 {
        self.parts
            .iter()
            .filter(|p| p.state == PartState::Completed)
            .map(|p| p.size)
            .sum()
    }

    pub fn calculate_progress(&self) -> f64 {
        if self.file_size == 0 {
            return 0.0;
        }
        (self.uploaded_size as f64 / self.file_size as f64 * 100.0).min(100.0)
    }

    /// Whether the upload can be picked up again.
    pub fn is_resumable(&self) -> bool {
        matches!(
            self.state,
            UploadState::Initialized | UploadState::InProgress
        )
    }

    /// Parts that still have to be uploaded.
    pub fn pending_parts(&self) -> Vec<PartInfo> {
        self.parts
            .iter()
            .filter(|p| p.state != PartState::Completed)
            .cloned()
            .collect()
    }

    /// Completed parts with their etags, sorted ascending by part number as
    /// the completion call requires.
    pub fn completed_parts(&self) -> Vec<CompletedPart> {
        let mut parts: Vec<CompletedPart> = self
            .parts
            .iter()
            .filter(|p| p.state == PartState::Completed)
            .filter_map(|p| {
                p.etag.as_ref().map(|etag| CompletedPart {
                    part_number: p.part_number,
                    etag: etag.clone(),
                })
            })
            .collect();
        parts.sort_by_key(|p| p.part_number);
        parts
    }

    /// Record a part transition and recompute the derived byte counters.
    pub fn apply_part_update(&mut self, part_number: u32, state: PartState, etag: Option<&str>) {
        if let Some(part) = self.parts.iter_mut().find(|p| p.part_number == part_number) {
            part.state = state;
            if let Some(etag) = etag {
                part.etag = Some(etag.to_owned());
            }
        }
        self.uploaded_size = self.completed_size();
        self.progress = self.calculate_progress();
        self.updated_at = Utc::now();
    }

    /// Record the total uploaded byte counter and recompute the progress.
    pub fn apply_uploaded_size(&mut self, uploaded_size: u64) {
        self.uploaded_size = uploaded_size;
        self.progress = self.calculate_progress();
        self.updated_at = Utc::now();
    }

    /// Move the upload to another lifecycle state.
    pub fn transition(&mut self, state: UploadState, error: Option<String>) {
        self.state = state;
        self.error = error;
        self.updated_at = Utc::now();
    }
}

/// Lifecycle state of one upload.
///
/// `Initialized -> InProgress -> {Completed, Failed}`; `Cancelled` is
/// reachable from the two non-terminal states on explicit abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadState {
    Initialized,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadState::Initialized => "INITIALIZED",
            UploadState::InProgress => "IN_PROGRESS",
            UploadState::Completed => "COMPLETED",
            UploadState::Failed => "FAILED",
            UploadState::Cancelled => "CANCELLED",
        };
        f.write_str(s)
    }
}
