use std::sync::Arc;

use async_trait::async_trait;

use crate::exception::UploadResult;
use crate::model::entity::UploadStatus;
use crate::model::vo::UploadOutcome;
use crate::service::UploadSource;

/// # Multipart upload service
///
/// Orchestrates the full lifecycle of an upload: chunk planning, remote
/// multipart creation, concurrent part upload with retry, progress tracking,
/// and the final complete or abort call. Per-part progress is persisted so an
/// interrupted upload continues where it stopped.
#[async_trait]
pub trait MultipartUploadService: Send + Sync {
    /// Upload `source` to `bucket`/`key`.
    ///
    /// A persisted `Completed` status for the pair short-circuits to the
    /// stored receipt without any remote call. A matching incomplete upload
    /// is resumed, reusing its upload id and completed parts. Payloads below
    /// the configured threshold go through the single `put_object` call.
    async fn upload(
        &self,
        source: Arc<dyn UploadSource>,
        bucket: &str,
        key: &str,
    ) -> UploadResult<UploadOutcome>;

    /// Continue a previously interrupted upload, re-submitting only the
    /// parts that are not yet completed.
    ///
    /// Resuming an already completed upload is a no-op returning its receipt.
    async fn resume(
        &self,
        source: Arc<dyn UploadSource>,
        bucket: &str,
        key: &str,
    ) -> UploadResult<UploadOutcome>;

    /// Best-effort cancellation: aborts the remote multipart upload and marks
    /// the local state `Cancelled`. In-flight workers are not interrupted but
    /// their results are discarded.
    async fn abort(&self, bucket: &str, key: &str) -> UploadResult<()>;

    /// Persisted status for `bucket`/`key`, if any.
    async fn status(&self, bucket: &str, key: &str) -> UploadResult<Option<UploadStatus>>;
}
