mod part;
mod upload_status;

#[rustfmt::skip]
pub use {
    part::{PartInfo, PartState},
    upload_status::{UploadState, UploadStatus},
};
