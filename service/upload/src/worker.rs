use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use domain_upload::exception::{UploadException, UploadResult};
use domain_upload::model::entity::{PartInfo, PartState};
use domain_upload::model::vo::CompletedPart;
use domain_upload::repository::UploadStateRepo;
use domain_upload::service::{ObjectStorageClient, UploadSource};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::progress::ProgressReporter;

/// Uploads pending parts with bounded concurrency.
///
/// Each part retries with linearly growing backoff before its failure is
/// declared fatal. After a fatal failure, workers already in flight are
/// drained within `timeout_secs` and their results are discarded.
pub(crate) struct PartWorkerPool {
    pub client: Arc<dyn ObjectStorageClient>,
    pub state_repo: Arc<dyn UploadStateRepo>,
    pub concurrency: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
}

impl PartWorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub(crate) async fn run(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        storage_key: &str,
        pending: Vec<PartInfo>,
        source: Arc<dyn UploadSource>,
        reporter: Arc<ProgressReporter>,
        already_uploaded: u64,
    ) -> UploadResult<Vec<CompletedPart>> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
        let uploaded = Arc::new(AtomicU64::new(already_uploaded));
        let mut handles = Vec::with_capacity(pending.len());
        for part in pending {
            let worker = PartWorker {
                client: self.client.clone(),
                state_repo: self.state_repo.clone(),
                source: source.clone(),
                reporter: reporter.clone(),
                uploaded: uploaded.clone(),
                bucket: bucket.to_owned(),
                key: key.to_owned(),
                upload_id: upload_id.to_owned(),
                storage_key: storage_key.to_owned(),
                max_retries: self.max_retries,
            };
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| UploadException::InternalError {
                        source: anyhow::Error::new(e),
                    })?;
                worker.upload_with_retry(part).await
            }));
        }

        let mut parts = Vec::with_capacity(handles.len());
        let mut handles = handles.into_iter();
        let mut failure = None;
        for handle in handles.by_ref() {
            match handle.await {
                Ok(Ok(part)) => parts.push(part),
                Ok(Err(e)) => {
                    failure = Some(e);
                    break;
                }
                Err(e) => {
                    failure = Some(UploadException::InternalError {
                        source: anyhow::Error::new(e),
                    });
                    break;
                }
            }
        }
        let Some(failure) = failure else {
            return Ok(parts);
        };

        // Let in-flight workers settle so their part states get recorded,
        // but never wait past the shutdown bound.
        let drain = async move {
            for handle in handles {
                let _ = handle.await;
            }
        };
        match tokio::time::timeout(Duration::from_secs(self.timeout_secs), drain).await {
            Ok(()) => Err(failure),
            Err(_) => {
                warn!(
                    "Part workers of {bucket}/{key} did not settle within {}s after: {failure}",
                    self.timeout_secs
                );
                Err(UploadException::PoolTimeout {
                    secs: self.timeout_secs,
                })
            }
        }
    }
}

struct PartWorker {
    client: Arc<dyn ObjectStorageClient>,
    state_repo: Arc<dyn UploadStateRepo>,
    source: Arc<dyn UploadSource>,
    reporter: Arc<ProgressReporter>,
    uploaded: Arc<AtomicU64>,
    bucket: String,
    key: String,
    upload_id: String,
    storage_key: String,
    max_retries: u32,
}

impl PartWorker {
    /// Read the part's range and push it, retrying transient failures with a
    /// `1s * attempt` backoff. `max_retries` retries means `max_retries + 1`
    /// attempts in total.
    async fn upload_with_retry(&self, part: PartInfo) -> UploadResult<CompletedPart> {
        self.record_part(part.part_number, PartState::Uploading, None)
            .await;
        let mut attempt = 0u32;
        loop {
            match self.try_once(&part).await {
                Ok(etag) => {
                    self.record_part(part.part_number, PartState::Completed, Some(etag.clone()))
                        .await;
                    let uploaded = self
                        .uploaded
                        .fetch_add(part.size, Ordering::SeqCst)
                        + part.size;
                    self.reporter.report(uploaded, part.part_number).await;
                    debug!(
                        "Uploaded part {} of {}/{}, etag: {etag}",
                        part.part_number, self.bucket, self.key
                    );
                    return Ok(CompletedPart {
                        part_number: part.part_number,
                        etag,
                    });
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        self.record_part(part.part_number, PartState::Failed, None)
                            .await;
                        return Err(UploadException::PartFailed {
                            part_number: part.part_number,
                            source: e,
                        });
                    }
                    warn!(
                        "Part {} of {}/{} failed, retry {attempt}/{}: {e}",
                        part.part_number, self.bucket, self.key, self.max_retries
                    );
                    tokio::time::sleep(Duration::from_millis(1000 * u64::from(attempt))).await;
                }
            }
        }
    }

    async fn try_once(&self, part: &PartInfo) -> anyhow::Result<String> {
        let body = self.source.read_range(part.start, part.size).await?;
        self.client
            .upload_part(
                &self.bucket,
                &self.key,
                &self.upload_id,
                part.part_number,
                body,
            )
            .await
    }

    async fn record_part(&self, part_number: u32, state: PartState, etag: Option<String>) {
        if let Err(e) = self
            .state_repo
            .update_part_status(&self.storage_key, part_number, state, etag)
            .await
        {
            warn!(
                "Failed to persist part {part_number} state for {}: {e}",
                self.storage_key
            );
        }
    }
}
