use crate::model::entity::UploadState;

pub type UploadResult<T> = Result<T, UploadException>;

#[derive(Debug, thiserror::Error)]
pub enum UploadException {
    #[error("File is empty, nothing to upload.")]
    EmptyFile,

    #[error("Parts count: {parts} exceeds the protocol maximum: {max}.")]
    TooManyParts { parts: u64, max: u64 },

    #[error("Part {part_number} failed after all retries: {source}")]
    PartFailed {
        part_number: u32,
        #[source]
        source: anyhow::Error,
    },

    #[error("No upload found for {bucket}/{key}.")]
    NoSuchUpload { bucket: String, key: String },

    #[error("Upload is in state: {state}, it can't be resumed.")]
    NotResumable { state: UploadState },

    #[error("Persisted upload covers {expected} bytes but the source has {actual}.")]
    MismatchedSize { expected: u64, actual: u64 },

    #[error("Part workers didn't finish within {secs} seconds.")]
    PoolTimeout { secs: u64 },

    #[error("Upload internal error: {source}")]
    InternalError {
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for UploadException {
    fn from(e: anyhow::Error) -> Self {
        UploadException::InternalError { source: e }
    }
}
