mod upload_state;

pub use upload_state::UploadStateRepo;
