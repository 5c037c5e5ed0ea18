use std::sync::Arc;

use serde::Deserialize;
use typed_builder::TypedBuilder;

use crate::model::vo::ProgressListener;

/// Minimum part size the protocol accepts, 5 MiB.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;
/// Maximum parts count the protocol accepts.
pub const MAX_PARTS: u64 = 10_000;

const DEFAULT_CONCURRENCY: usize = 3;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MULTIPART_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Tuning knobs of the upload engine.
#[derive(Clone, TypedBuilder, Deserialize)]
pub struct UploadConfig {
    /// Part size in bytes, floor-clamped to [`MIN_PART_SIZE`].
    #[builder(default = MIN_PART_SIZE)]
    #[serde(default = "default_part_size")]
    pub part_size: u64,

    /// How many parts are uploaded at once.
    #[builder(default = DEFAULT_CONCURRENCY)]
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retries per part after the first failed attempt.
    #[builder(default = DEFAULT_MAX_RETRIES)]
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Bound on waiting for the part workers to settle.
    #[builder(default = DEFAULT_TIMEOUT_SECS)]
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Payloads below this size go through the single `put_object` call.
    #[builder(default = DEFAULT_MULTIPART_THRESHOLD)]
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold: u64,

    #[builder(default, setter(strip_option))]
    #[serde(skip)]
    pub progress_listener: Option<Arc<dyn ProgressListener>>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig::builder().build()
    }
}

fn default_part_size() -> u64 {
    MIN_PART_SIZE
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_multipart_threshold() -> u64 {
    DEFAULT_MULTIPART_THRESHOLD
}
