use serde::{Deserialize, Serialize};

use crate::model::entity::UploadStatus;

/// Receipt of an upload that reached the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub bucket: String,
    pub key: String,
    /// Remote multipart upload id, `None` for the single-call path.
    pub upload_id: Option<String>,
    /// ETag of the assembled object.
    pub etag: String,
    pub file_size: u64,
    pub parts_count: u32,
}

/// Caller-visible outcome of an upload request.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadOutcome {
    /// The payload is fully stored.
    Completed(UploadReceipt),
    /// Another payload is mid-flight for the same bucket/key; its persisted
    /// status is returned untouched.
    InProgress(UploadStatus),
}
