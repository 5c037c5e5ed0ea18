use std::io::SeekFrom;
use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use domain_upload::service::UploadSource;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// File-backed upload source.
///
/// Each range read opens its own handle, so disjoint ranges can be read by
/// concurrent part workers without sharing a seek position.
pub struct FileUploadSource {
    path: PathBuf,
    file_name: Option<String>,
    size: u64,
}

impl FileUploadSource {
    pub async fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("No such file: {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned());
        Ok(Self {
            size: metadata.len(),
            path,
            file_name,
        })
    }
}

#[async_trait]
impl UploadSource for FileUploadSource {
    fn size(&self) -> u64 {
        self.size
    }

    fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    async fn read_range(&self, start: u64, len: u64) -> anyhow::Result<Vec<u8>> {
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;
        let mut buffer = vec![0u8; len as usize];
        file.read_exact(&mut buffer).await?;
        Ok(buffer)
    }
}

/// In-memory upload source for payloads already held as bytes.
pub struct BytesUploadSource {
    bytes: Vec<u8>,
    file_name: Option<String>,
}

impl BytesUploadSource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: None,
        }
    }

    pub fn with_name(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: Some(file_name.into()),
        }
    }
}

#[async_trait]
impl UploadSource for BytesUploadSource {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    async fn read_range(&self, start: u64, len: u64) -> anyhow::Result<Vec<u8>> {
        let start = start as usize;
        let end = start + len as usize;
        let range = self
            .bytes
            .get(start..end)
            .with_context(|| format!("Range {start}..{end} out of bounds"))?;
        Ok(range.to_vec())
    }
}

/// Guess a content type from the file name extension.
pub fn guess_content_type(file_name: Option<&str>) -> &'static str {
    let extension = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, extension)| extension.to_ascii_lowercase());
    match extension.as_deref() {
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("webp") => "image/webp",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
