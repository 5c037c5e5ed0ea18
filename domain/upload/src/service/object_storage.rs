use async_trait::async_trait;

use crate::model::vo::CompletedPart;

/// # Object store client
///
/// Boundary to the S3-compatible backend. The engine only consumes this
/// trait; speaking the wire protocol is up to the implementation.
#[async_trait]
pub trait ObjectStorageClient: Send + Sync {
    /// Returns the remote upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
    ) -> anyhow::Result<String>;

    /// Returns the part's etag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Vec<u8>,
    ) -> anyhow::Result<String>;

    /// Assembles the object; `parts` must be sorted ascending by part number.
    /// Returns the etag of the assembled object.
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

    /// Single-call path for payloads below the multipart threshold.
    /// Returns the object's etag.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: Option<String>,
    ) -> anyhow::Result<String>;

    async fn get_object(&self, bucket: &str, key: &str) -> anyhow::Result<Vec<u8>>;
}
