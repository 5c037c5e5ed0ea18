use async_trait::async_trait;
use mockall::mock;

use crate::model::entity::{PartState, UploadStatus};
use crate::model::vo::{CompletedPart, ProgressListener, UploadProgress};
use crate::repository::UploadStateRepo;
use crate::service::ObjectStorageClient;

mock! {
    pub UploadStateRepo {}
    #[async_trait]
    impl UploadStateRepo for UploadStateRepo {
        async fn save_status(&self, key: &str, status: &UploadStatus) -> anyhow::Result<()>;
        async fn get_status(&self, key: &str) -> anyhow::Result<Option<UploadStatus>>;
        async fn delete_status(&self, key: &str) -> anyhow::Result<bool>;
        async fn update_part_status(
            &self,
            key: &str,
            part_number: u32,
            state: PartState,
            etag: Option<String>,
        ) -> anyhow::Result<bool>;
        async fn update_uploaded_size(&self, key: &str, uploaded_size: u64) -> anyhow::Result<bool>;
    }
}

mock! {
    pub ObjectStorageClient {}
    #[async_trait]
    impl ObjectStorageClient for ObjectStorageClient {
        async fn create_multipart_upload(
            &self,
            bucket: &str,
            key: &str,
            content_type: Option<String>,
        ) -> anyhow::Result<String>;
        async fn upload_part(
            &self,
            bucket: &str,
            key: &str,
            upload_id: &str,
            part_number: u32,
            body: Vec<u8>,
        ) -> anyhow::Result<String>;
        async fn complete_multipart_upload(
            &self,
            bucket: &str,
            key: &str,
            upload_id: &str,
            parts: &[CompletedPart],
        ) -> anyhow::Result<String>;
        async fn abort_multipart_upload(
            &self,
            bucket: &str,
            key: &str,
            upload_id: &str,
        ) -> anyhow::Result<()>;
        async fn put_object(
            &self,
            bucket: &str,
            key: &str,
            body: Vec<u8>,
            content_type: Option<String>,
        ) -> anyhow::Result<String>;
        async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<Vec<u8>>;
    }
}

mock! {
    pub ProgressListener {}
    impl ProgressListener for ProgressListener {
        fn on_progress(&self, progress: &UploadProgress);
    }
}
