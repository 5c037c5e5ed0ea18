mod multipart;
mod object_storage;
mod source;

#[rustfmt::skip]
pub use {
    multipart::MultipartUploadService,
    object_storage::ObjectStorageClient,
    source::UploadSource,
};
