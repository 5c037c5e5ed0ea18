use async_trait::async_trait;

use crate::model::entity::{PartState, UploadStatus};

/// # Upload state store
///
/// Persists per-part upload progress under the key built by
/// [`UploadStatus::storage_key`] so an interrupted upload can be resumed.
///
/// `update_part_status` and `update_uploaded_size` are read-modify-write
/// operations and must be applied atomically per key: concurrent calls from
/// different part workers must not lose updates. Both return `Ok(false)`
/// instead of failing when the key doesn't exist.
#[async_trait]
pub trait UploadStateRepo: Send + Sync {
    async fn save_status(&self, key: &str, status: &UploadStatus) -> anyhow::Result<()>;

    async fn get_status(&self, key: &str) -> anyhow::Result<Option<UploadStatus>>;

    /// Returns whether the key existed.
    async fn delete_status(&self, key: &str) -> anyhow::Result<bool>;

    /// Move one part to `state`, keep its etag when a new one is given, and
    /// recompute the derived byte counters.
    async fn update_part_status(
        &self,
        key: &str,
        part_number: u32,
        state: PartState,
        etag: Option<String>,
    ) -> anyhow::Result<bool>;

    /// Overwrite the uploaded byte counter and recompute the progress.
    async fn update_uploaded_size(&self, key: &str, uploaded_size: u64) -> anyhow::Result<bool>;
}
