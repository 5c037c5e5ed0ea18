use std::sync::Arc;

use domain_upload::model::entity::UploadStatus;
use domain_upload::repository::UploadStateRepo;
use typed_builder::TypedBuilder;

/// Detects an incomplete prior upload for a destination.
#[derive(TypedBuilder)]
pub struct ResumeManager {
    state_repo: Arc<dyn UploadStateRepo>,
}

impl ResumeManager {
    /// Persisted status for `bucket`/`key`, returned only while the upload
    /// can still be picked up (`Initialized` or `InProgress`).
    pub async fn find_resumable(
        &self,
        bucket: &str,
        key: &str,
    ) -> anyhow::Result<Option<UploadStatus>> {
        let storage_key = UploadStatus::storage_key(bucket, key);
        Ok(self
            .state_repo
            .get_status(&storage_key)
            .await?
            .filter(UploadStatus::is_resumable))
    }
}
