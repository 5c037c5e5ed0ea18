use std::sync::Arc;

use async_trait::async_trait;
use domain_upload::exception::{UploadException, UploadResult};
use domain_upload::model::entity::{PartState, UploadState, UploadStatus};
use domain_upload::model::vo::{UploadConfig, UploadOutcome, UploadReceipt};
use domain_upload::repository::UploadStateRepo;
use domain_upload::service::{MultipartUploadService, ObjectStorageClient, UploadSource};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

use crate::planner::plan_parts;
use crate::progress::ProgressReporter;
use crate::resume::ResumeManager;
use crate::source::guess_content_type;
use crate::worker::PartWorkerPool;

/// Coordinates one upload end to end: planning, remote multipart creation,
/// the part worker pool, and the final complete or abort call. Progress is
/// persisted through [`UploadStateRepo`] after every part, which is what
/// makes an interrupted upload resumable.
///
/// Persistence failures while an upload runs are logged and swallowed; the
/// object store, not the state store, decides whether an upload succeeds.
#[derive(TypedBuilder)]
pub struct MultipartUploadServiceImpl {
    object_client: Arc<dyn ObjectStorageClient>,
    state_repo: Arc<dyn UploadStateRepo>,
    #[builder(default)]
    config: UploadConfig,
}

#[async_trait]
impl MultipartUploadService for MultipartUploadServiceImpl {
    async fn upload(
        &self,
        source: Arc<dyn UploadSource>,
        bucket: &str,
        key: &str,
    ) -> UploadResult<UploadOutcome> {
        let file_size = source.size();
        if file_size == 0 {
            return Err(UploadException::EmptyFile);
        }
        let storage_key = UploadStatus::storage_key(bucket, key);

        if let Some(existing) = self
            .resume_manager()
            .find_resumable(bucket, key)
            .await
            .map_err(UploadException::from)?
        {
            if existing.file_size != file_size {
                // A different payload is mid-flight for this destination;
                // hand its status back instead of clobbering it.
                return Ok(UploadOutcome::InProgress(existing));
            }
            info!(
                "Resuming upload {bucket}/{key}, upload id: {}, completed parts: {}",
                existing.upload_id,
                existing.completed_parts().len()
            );
            return self.run_parts(existing, source, &storage_key).await;
        }
        if let Some(existing) = self
            .state_repo
            .get_status(&storage_key)
            .await
            .map_err(UploadException::from)?
        {
            if existing.state == UploadState::Completed {
                debug!("Upload {bucket}/{key} already completed, skipping.");
                return Ok(UploadOutcome::Completed(receipt_of(&existing)));
            }
            // Failed or cancelled: start over from scratch.
        }

        if file_size < self.config.multipart_threshold {
            return self.put_small(source, bucket, key).await;
        }

        let parts = plan_parts(file_size, self.config.part_size)?;
        let content_type = guess_content_type(source.file_name());
        let upload_id = self
            .object_client
            .create_multipart_upload(bucket, key, Some(content_type.to_owned()))
            .await
            .map_err(UploadException::from)?;
        let status = UploadStatus::new(upload_id, bucket, key, file_size, parts);
        info!(
            "Initialized multipart upload {bucket}/{key}, upload id: {}, parts: {}",
            status.upload_id,
            status.parts.len()
        );
        self.persist(&storage_key, &status).await;
        self.run_parts(status, source, &storage_key).await
    }

    async fn resume(
        &self,
        source: Arc<dyn UploadSource>,
        bucket: &str,
        key: &str,
    ) -> UploadResult<UploadOutcome> {
        let storage_key = UploadStatus::storage_key(bucket, key);
        if let Some(status) = self
            .resume_manager()
            .find_resumable(bucket, key)
            .await
            .map_err(UploadException::from)?
        {
            if status.file_size != source.size() {
                return Err(UploadException::MismatchedSize {
                    expected: status.file_size,
                    actual: source.size(),
                });
            }
            info!(
                "Resuming upload {bucket}/{key}, upload id: {}, completed parts: {}",
                status.upload_id,
                status.completed_parts().len()
            );
            return self.run_parts(status, source, &storage_key).await;
        }
        match self
            .state_repo
            .get_status(&storage_key)
            .await
            .map_err(UploadException::from)?
        {
            Some(status) if status.state == UploadState::Completed => {
                debug!("Upload {bucket}/{key} already completed, nothing to resume.");
                Ok(UploadOutcome::Completed(receipt_of(&status)))
            }
            Some(status) => Err(UploadException::NotResumable {
                state: status.state,
            }),
            None => Err(UploadException::NoSuchUpload {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            }),
        }
    }

    async fn abort(&self, bucket: &str, key: &str) -> UploadResult<()> {
        let storage_key = UploadStatus::storage_key(bucket, key);
        let mut status = self
            .state_repo
            .get_status(&storage_key)
            .await
            .map_err(UploadException::from)?
            .ok_or_else(|| UploadException::NoSuchUpload {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })?;
        if !status.is_resumable() {
            // Terminal states have nothing left to cancel.
            return Ok(());
        }
        if let Err(e) = self
            .object_client
            .abort_multipart_upload(bucket, key, &status.upload_id)
            .await
        {
            warn!("Remote abort of upload {} failed: {e}", status.upload_id);
        }
        status.transition(UploadState::Cancelled, None);
        self.persist(&storage_key, &status).await;
        info!(
            "Aborted multipart upload {bucket}/{key}, upload id: {}",
            status.upload_id
        );
        Ok(())
    }

    async fn status(&self, bucket: &str, key: &str) -> UploadResult<Option<UploadStatus>> {
        self.state_repo
            .get_status(&UploadStatus::storage_key(bucket, key))
            .await
            .map_err(UploadException::from)
    }
}

impl MultipartUploadServiceImpl {
    fn resume_manager(&self) -> ResumeManager {
        ResumeManager::builder()
            .state_repo(self.state_repo.clone())
            .build()
    }

    /// Single-call path for payloads below the multipart threshold. Nothing
    /// is persisted: the call either stores the whole object or fails.
    async fn put_small(
        &self,
        source: Arc<dyn UploadSource>,
        bucket: &str,
        key: &str,
    ) -> UploadResult<UploadOutcome> {
        let file_size = source.size();
        let body = source
            .read_range(0, file_size)
            .await
            .map_err(UploadException::from)?;
        let content_type = guess_content_type(source.file_name());
        let etag = self
            .object_client
            .put_object(bucket, key, body, Some(content_type.to_owned()))
            .await
            .map_err(UploadException::from)?;
        info!("Uploaded {bucket}/{key} in a single call, etag: {etag}");
        Ok(UploadOutcome::Completed(UploadReceipt {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            upload_id: None,
            etag,
            file_size,
            parts_count: 1,
        }))
    }

    /// Drive the worker pool over the pending parts of `status`, then either
    /// complete the multipart upload or abort it and record the failure.
    async fn run_parts(
        &self,
        mut status: UploadStatus,
        source: Arc<dyn UploadSource>,
        storage_key: &str,
    ) -> UploadResult<UploadOutcome> {
        status.transition(UploadState::InProgress, None);
        self.persist(storage_key, &status).await;

        let pending = status.pending_parts();
        let mut parts = status.completed_parts();
        let reporter = Arc::new(ProgressReporter::new(
            self.state_repo.clone(),
            storage_key.to_owned(),
            self.config.progress_listener.clone(),
            status.file_size,
            status.parts.len() as u32,
        ));
        let pool = PartWorkerPool {
            client: self.object_client.clone(),
            state_repo: self.state_repo.clone(),
            concurrency: self.config.concurrency,
            max_retries: self.config.max_retries,
            timeout_secs: self.config.timeout_secs,
        };
        let uploaded = pool
            .run(
                &status.bucket,
                &status.key,
                &status.upload_id,
                storage_key,
                pending,
                source,
                reporter,
                status.uploaded_size,
            )
            .await;

        match uploaded {
            Ok(new_parts) => {
                parts.extend(new_parts);
                parts.sort_by_key(|p| p.part_number);
                let etag = self
                    .object_client
                    .complete_multipart_upload(
                        &status.bucket,
                        &status.key,
                        &status.upload_id,
                        &parts,
                    )
                    .await;
                match etag {
                    Ok(etag) => {
                        for part in &parts {
                            status.apply_part_update(
                                part.part_number,
                                PartState::Completed,
                                Some(&part.etag),
                            );
                        }
                        status.etag = Some(etag.clone());
                        status.transition(UploadState::Completed, None);
                        self.persist(storage_key, &status).await;
                        info!(
                            "Completed multipart upload {}/{}, upload id: {}, etag: {etag}",
                            status.bucket, status.key, status.upload_id
                        );
                        Ok(UploadOutcome::Completed(receipt_of(&status)))
                    }
                    Err(e) => {
                        let failure = UploadException::InternalError { source: e };
                        self.abandon(&mut status, storage_key, &failure).await;
                        Err(failure)
                    }
                }
            }
            Err(failure) => {
                self.abandon(&mut status, storage_key, &failure).await;
                Err(failure)
            }
        }
    }

    /// Best-effort remote abort plus a persisted `Failed` status.
    async fn abandon(
        &self,
        status: &mut UploadStatus,
        storage_key: &str,
        failure: &UploadException,
    ) {
        warn!(
            "Multipart upload {}/{} failed, aborting upload id {}: {failure}",
            status.bucket, status.key, status.upload_id
        );
        if let Err(e) = self
            .object_client
            .abort_multipart_upload(&status.bucket, &status.key, &status.upload_id)
            .await
        {
            warn!("Remote abort of upload {} failed: {e}", status.upload_id);
        }
        // Reload so part states recorded by the workers survive.
        if let Ok(Some(persisted)) = self.state_repo.get_status(storage_key).await {
            *status = persisted;
        }
        status.transition(UploadState::Failed, Some(failure.to_string()));
        self.persist(storage_key, status).await;
    }

    async fn persist(&self, storage_key: &str, status: &UploadStatus) {
        if let Err(e) = self.state_repo.save_status(storage_key, status).await {
            warn!("Failed to persist upload status for {storage_key}: {e}");
        }
    }
}

fn receipt_of(status: &UploadStatus) -> UploadReceipt {
    UploadReceipt {
        bucket: status.bucket.clone(),
        key: status.key.clone(),
        upload_id: Some(status.upload_id.clone()),
        etag: status.etag.clone().unwrap_or_default(),
        file_size: status.file_size,
        parts_count: status.parts.len() as u32,
    }
}
