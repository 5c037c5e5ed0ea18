mod multipart;
mod planner;
mod progress;
mod resume;
mod source;
mod worker;

#[rustfmt::skip]
pub use {
    multipart::MultipartUploadServiceImpl,
    planner::plan_parts,
    progress::SpeedTracker,
    resume::ResumeManager,
    source::{guess_content_type, BytesUploadSource, FileUploadSource},
};
