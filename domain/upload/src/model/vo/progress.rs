use serde::{Deserialize, Serialize};

/// Snapshot of upload progress handed to [`ProgressListener`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub uploaded_bytes: u64,
    pub total_bytes: u64,
    /// Percent in `[0, 100]`.
    pub percent: f64,
    /// Part that triggered this snapshot, if the upload is chunked.
    pub current_part: Option<u32>,
    pub total_parts: Option<u32>,
    /// Average upload speed in bytes per second.
    pub speed_bytes_per_sec: Option<u64>,
    /// Estimated seconds until completion, `None` while the speed is zero.
    pub remaining_seconds: Option<u64>,
}

impl UploadProgress {
    pub fn is_complete(&self) -> bool {
        self.percent >= 100.0
    }
}

/// Callback invoked on every progress change.
///
/// Called from upload workers; implementations must not block.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, progress: &UploadProgress);
}
