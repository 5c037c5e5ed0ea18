use async_trait::async_trait;

/// # Upload source
///
/// Byte-range reader over the uploading payload. Part workers read disjoint
/// ranges concurrently, so implementations must support parallel reads.
#[async_trait]
pub trait UploadSource: Send + Sync {
    /// Total payload size in bytes.
    fn size(&self) -> u64;

    /// File name used to guess the content type, if known.
    fn file_name(&self) -> Option<&str>;

    /// Read exactly `len` bytes starting at `start`.
    async fn read_range(&self, start: u64, len: u64) -> anyhow::Result<Vec<u8>>;
}
