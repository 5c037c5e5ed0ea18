use std::sync::{Arc, Mutex};
use std::time::Instant;

use domain_upload::model::vo::{ProgressListener, UploadProgress};
use domain_upload::repository::UploadStateRepo;
use tracing::warn;

/// Wall-clock average transfer speed over one upload run.
pub struct SpeedTracker {
    started_at: Mutex<Instant>,
}

impl SpeedTracker {
    pub fn new() -> Self {
        Self {
            started_at: Mutex::new(Instant::now()),
        }
    }

    /// Restart the clock, e.g. when a resumed run begins.
    pub fn reset(&self) {
        *self.started_at.lock().unwrap() = Instant::now();
    }

    /// Average speed in bytes per second and the estimated seconds left.
    ///
    /// Both are `None` until the clock has measurably advanced; the estimate
    /// is also `None` while the average speed rounds down to zero.
    pub fn sample(&self, uploaded_bytes: u64, total_bytes: u64) -> (Option<u64>, Option<u64>) {
        let elapsed = self.started_at.lock().unwrap().elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return (None, None);
        }
        let speed = (uploaded_bytes as f64 / elapsed) as u64;
        if speed == 0 {
            return (Some(0), None);
        }
        let remaining = total_bytes.saturating_sub(uploaded_bytes) / speed;
        (Some(speed), Some(remaining))
    }
}

impl Default for SpeedTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Persists the running byte counter and fans progress snapshots out to the
/// caller's listener.
pub(crate) struct ProgressReporter {
    tracker: SpeedTracker,
    state_repo: Arc<dyn UploadStateRepo>,
    storage_key: String,
    listener: Option<Arc<dyn ProgressListener>>,
    total_bytes: u64,
    total_parts: u32,
}

impl ProgressReporter {
    pub(crate) fn new(
        state_repo: Arc<dyn UploadStateRepo>,
        storage_key: String,
        listener: Option<Arc<dyn ProgressListener>>,
        total_bytes: u64,
        total_parts: u32,
    ) -> Self {
        Self {
            tracker: SpeedTracker::new(),
            state_repo,
            storage_key,
            listener,
            total_bytes,
            total_parts,
        }
    }

    /// Called by part workers after each completed part. Persistence errors
    /// are logged and swallowed so a degraded store never kills the upload.
    pub(crate) async fn report(&self, uploaded_bytes: u64, current_part: u32) {
        if let Err(e) = self
            .state_repo
            .update_uploaded_size(&self.storage_key, uploaded_bytes)
            .await
        {
            warn!("Failed to persist progress for {}: {e}", self.storage_key);
        }
        if let Some(listener) = &self.listener {
            let percent = if self.total_bytes == 0 {
                0.0
            } else {
                (uploaded_bytes as f64 / self.total_bytes as f64 * 100.0).min(100.0)
            };
            let (speed_bytes_per_sec, remaining_seconds) =
                self.tracker.sample(uploaded_bytes, self.total_bytes);
            listener.on_progress(&UploadProgress {
                uploaded_bytes,
                total_bytes: self.total_bytes,
                percent,
                current_part: Some(current_part),
                total_parts: Some(self.total_parts),
                speed_bytes_per_sec,
                remaining_seconds,
            });
        }
    }
}
