use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use domain_upload::exception::UploadException;
use domain_upload::mock::{MockObjectStorageClient, MockUploadStateRepo};
use domain_upload::model::entity::{PartState, UploadState, UploadStatus};
use domain_upload::model::vo::{
    CompletedPart, ProgressListener, UploadConfig, UploadOutcome, UploadProgress,
};
use domain_upload::repository::UploadStateRepo;
use domain_upload::service::{MultipartUploadService, ObjectStorageClient, UploadSource};
use infrastructure_state_store::MemStateRepo;
use service_upload::{plan_parts, BytesUploadSource, MultipartUploadServiceImpl};

const MIB: u64 = 1024 * 1024;

fn source_of(len: u64) -> Arc<dyn UploadSource> {
    Arc::new(BytesUploadSource::new(vec![7u8; len as usize]))
}

fn multipart_config() -> UploadConfig {
    // Threshold of one byte forces the multipart path for any payload.
    UploadConfig::builder()
        .part_size(5 * MIB)
        .multipart_threshold(1)
        .build()
}

fn service_with(
    client: MockObjectStorageClient,
    repo: Arc<MemStateRepo>,
    config: UploadConfig,
) -> MultipartUploadServiceImpl {
    MultipartUploadServiceImpl::builder()
        .object_client(Arc::new(client) as Arc<dyn ObjectStorageClient>)
        .state_repo(repo as Arc<dyn UploadStateRepo>)
        .config(config)
        .build()
}

/// Three 4 MiB..5 MiB parts, part 1 already completed with etag `e1`.
fn in_flight_status() -> UploadStatus {
    let mut status = UploadStatus::new(
        "u-1",
        "bucket",
        "key",
        12 * MIB,
        plan_parts(12 * MIB, 5 * MIB).unwrap(),
    );
    status.apply_part_update(1, PartState::Completed, Some("e1"));
    status.transition(UploadState::InProgress, None);
    status
}

#[tokio::test]
async fn multipart_upload_uploads_every_part_and_completes() {
    let mut client = MockObjectStorageClient::new();
    client
        .expect_create_multipart_upload()
        .times(1)
        .returning(|_, _, _| Ok("u-1".to_owned()));
    client
        .expect_upload_part()
        .times(3)
        .returning(|_, _, upload_id, part_number, body| {
            assert_eq!(upload_id, "u-1");
            assert!(body.len() == 5 * MIB as usize || body.len() == 2 * MIB as usize);
            Ok(format!("e{part_number}"))
        });
    client
        .expect_complete_multipart_upload()
        .times(1)
        .withf(|_, _, upload_id, parts| {
            upload_id == "u-1"
                && parts.iter().map(|p| p.part_number).collect::<Vec<_>>() == vec![1, 2, 3]
        })
        .returning(|_, _, _, _| Ok("final-etag".to_owned()));

    let repo = Arc::new(MemStateRepo::default());
    let service = service_with(client, repo.clone(), multipart_config());

    let outcome = service
        .upload(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap();
    let UploadOutcome::Completed(receipt) = outcome else {
        panic!("expected a completed upload");
    };
    assert_eq!(receipt.etag, "final-etag");
    assert_eq!(receipt.upload_id.as_deref(), Some("u-1"));
    assert_eq!(receipt.parts_count, 3);

    let status = service.status("bucket", "key").await.unwrap().unwrap();
    assert_eq!(status.state, UploadState::Completed);
    assert_eq!(status.uploaded_size, 12 * MIB);
    assert_eq!(status.progress, 100.0);
    assert!(status.parts.iter().all(|p| p.state == PartState::Completed));
}

#[tokio::test(start_paused = true)]
async fn part_failure_retries_with_backoff_then_aborts() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut client = MockObjectStorageClient::new();
    client
        .expect_create_multipart_upload()
        .times(1)
        .returning(|_, _, _| Ok("u-1".to_owned()));
    let counted = attempts.clone();
    client
        .expect_upload_part()
        .times(6)
        .returning(move |_, _, _, part_number, _| {
            if part_number == 2 {
                counted.fetch_add(1, Ordering::SeqCst);
                return Err(anyhow::anyhow!("connection reset"));
            }
            Ok(format!("e{part_number}"))
        });
    client
        .expect_abort_multipart_upload()
        .times(1)
        .returning(|_, _, _| Ok(()));

    let repo = Arc::new(MemStateRepo::default());
    let config = UploadConfig::builder()
        .part_size(5 * MIB)
        .multipart_threshold(1)
        .concurrency(1)
        .max_retries(3)
        .build();
    let service = service_with(client, repo.clone(), config);

    let err = service
        .upload(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        UploadException::PartFailed { part_number: 2, .. }
    ));
    // 3 retries means 4 attempts in total.
    assert_eq!(attempts.load(Ordering::SeqCst), 4);

    let status = service.status("bucket", "key").await.unwrap().unwrap();
    assert_eq!(status.state, UploadState::Failed);
    assert!(status.error.is_some());
    let by_number = |n: u32| status.parts.iter().find(|p| p.part_number == n).unwrap();
    assert_eq!(by_number(1).state, PartState::Completed);
    assert_eq!(by_number(2).state, PartState::Failed);
    assert_eq!(by_number(3).state, PartState::Completed);
}

#[tokio::test]
async fn resume_reuses_upload_id_and_completed_parts() {
    let repo = Arc::new(MemStateRepo::default());
    let storage_key = UploadStatus::storage_key("bucket", "key");
    repo.save_status(&storage_key, &in_flight_status())
        .await
        .unwrap();

    let mut client = MockObjectStorageClient::new();
    client
        .expect_upload_part()
        .times(2)
        .returning(|_, _, upload_id, part_number, _| {
            assert_eq!(upload_id, "u-1");
            assert!(part_number == 2 || part_number == 3);
            Ok(format!("e{part_number}"))
        });
    client
        .expect_complete_multipart_upload()
        .times(1)
        .withf(|_, _, _, parts| {
            parts
                .iter()
                .map(|p| (p.part_number, p.etag.as_str()))
                .collect::<Vec<_>>()
                == vec![(1, "e1"), (2, "e2"), (3, "e3")]
        })
        .returning(|_, _, _, _| Ok("final-etag".to_owned()));

    let service = service_with(client, repo, multipart_config());
    let outcome = service
        .resume(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap();
    let UploadOutcome::Completed(receipt) = outcome else {
        panic!("expected a completed upload");
    };
    assert_eq!(receipt.upload_id.as_deref(), Some("u-1"));
    assert_eq!(receipt.etag, "final-etag");
}

#[tokio::test]
async fn upload_picks_up_an_incomplete_upload() {
    let repo = Arc::new(MemStateRepo::default());
    let storage_key = UploadStatus::storage_key("bucket", "key");
    repo.save_status(&storage_key, &in_flight_status())
        .await
        .unwrap();

    let mut client = MockObjectStorageClient::new();
    client
        .expect_upload_part()
        .times(2)
        .returning(|_, _, _, part_number, _| Ok(format!("e{part_number}")));
    client
        .expect_complete_multipart_upload()
        .times(1)
        .returning(|_, _, _, _| Ok("final-etag".to_owned()));

    let service = service_with(client, repo, multipart_config());
    let outcome = service
        .upload(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap();
    assert!(matches!(outcome, UploadOutcome::Completed(_)));
}

#[tokio::test]
async fn completed_upload_short_circuits_without_remote_calls() {
    let repo = Arc::new(MemStateRepo::default());
    let storage_key = UploadStatus::storage_key("bucket", "key");
    let mut status = in_flight_status();
    for n in 1..=3u32 {
        status.apply_part_update(n, PartState::Completed, Some(&format!("e{n}")));
    }
    status.etag = Some("final-etag".to_owned());
    status.transition(UploadState::Completed, None);
    repo.save_status(&storage_key, &status).await.unwrap();

    // Any remote call would panic: the mock carries no expectations.
    let service = service_with(MockObjectStorageClient::new(), repo, multipart_config());

    let outcome = service
        .upload(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap();
    let UploadOutcome::Completed(receipt) = outcome else {
        panic!("expected a completed upload");
    };
    assert_eq!(receipt.etag, "final-etag");

    let outcome = service
        .resume(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap();
    assert!(matches!(outcome, UploadOutcome::Completed(_)));
}

#[tokio::test]
async fn small_payload_goes_through_a_single_put() {
    let mut client = MockObjectStorageClient::new();
    client
        .expect_put_object()
        .times(1)
        .withf(|_, _, body, content_type| {
            body.len() == 1024 && content_type.as_deref() == Some("text/plain")
        })
        .returning(|_, _, _, _| Ok("etag-1".to_owned()));

    let repo = Arc::new(MemStateRepo::default());
    let service = service_with(client, repo, UploadConfig::default());

    let source = Arc::new(BytesUploadSource::with_name(vec![0u8; 1024], "notes.txt"));
    let outcome = service.upload(source, "bucket", "key").await.unwrap();
    let UploadOutcome::Completed(receipt) = outcome else {
        panic!("expected a completed upload");
    };
    assert_eq!(receipt.etag, "etag-1");
    assert_eq!(receipt.upload_id, None);
    assert_eq!(receipt.parts_count, 1);

    // Nothing to resume: the single call either stored the object or failed.
    assert!(service.status("bucket", "key").await.unwrap().is_none());
}

#[tokio::test]
async fn abort_cancels_a_running_upload() {
    let repo = Arc::new(MemStateRepo::default());
    let storage_key = UploadStatus::storage_key("bucket", "key");
    repo.save_status(&storage_key, &in_flight_status())
        .await
        .unwrap();

    let mut client = MockObjectStorageClient::new();
    client
        .expect_abort_multipart_upload()
        .times(1)
        .withf(|_, _, upload_id| upload_id == "u-1")
        .returning(|_, _, _| Ok(()));

    let service = service_with(client, repo, multipart_config());
    service.abort("bucket", "key").await.unwrap();
    let status = service.status("bucket", "key").await.unwrap().unwrap();
    assert_eq!(status.state, UploadState::Cancelled);

    // Aborting a terminal upload again is a no-op without a remote call.
    service.abort("bucket", "key").await.unwrap();

    assert!(matches!(
        service.abort("bucket", "other").await.unwrap_err(),
        UploadException::NoSuchUpload { .. }
    ));
}

#[tokio::test]
async fn upload_with_a_different_size_reports_the_upload_in_flight() {
    let repo = Arc::new(MemStateRepo::default());
    let storage_key = UploadStatus::storage_key("bucket", "key");
    repo.save_status(&storage_key, &in_flight_status())
        .await
        .unwrap();

    let service = service_with(MockObjectStorageClient::new(), repo, multipart_config());

    let outcome = service
        .upload(source_of(6 * MIB), "bucket", "key")
        .await
        .unwrap();
    let UploadOutcome::InProgress(status) = outcome else {
        panic!("expected the persisted status back");
    };
    assert_eq!(status.upload_id, "u-1");
    assert_eq!(status.file_size, 12 * MIB);

    assert!(matches!(
        service
            .resume(source_of(6 * MIB), "bucket", "key")
            .await
            .unwrap_err(),
        UploadException::MismatchedSize {
            expected,
            actual,
        } if expected == 12 * MIB && actual == 6 * MIB
    ));
}

#[tokio::test]
async fn empty_payload_is_rejected() {
    let repo = Arc::new(MemStateRepo::default());
    let service = service_with(MockObjectStorageClient::new(), repo, multipart_config());

    assert!(matches!(
        service
            .upload(source_of(0), "bucket", "key")
            .await
            .unwrap_err(),
        UploadException::EmptyFile
    ));
    assert!(service.status("bucket", "key").await.unwrap().is_none());
}

#[tokio::test]
async fn resume_needs_a_resumable_upload() {
    let repo = Arc::new(MemStateRepo::default());
    let service = service_with(
        MockObjectStorageClient::new(),
        repo.clone(),
        multipart_config(),
    );

    assert!(matches!(
        service
            .resume(source_of(12 * MIB), "bucket", "key")
            .await
            .unwrap_err(),
        UploadException::NoSuchUpload { .. }
    ));

    let storage_key = UploadStatus::storage_key("bucket", "key");
    let mut status = in_flight_status();
    status.transition(UploadState::Failed, Some("boom".to_owned()));
    repo.save_status(&storage_key, &status).await.unwrap();

    assert!(matches!(
        service
            .resume(source_of(12 * MIB), "bucket", "key")
            .await
            .unwrap_err(),
        UploadException::NotResumable {
            state: UploadState::Failed
        }
    ));
}

#[tokio::test]
async fn completion_failure_aborts_and_records_the_failure() {
    let mut client = MockObjectStorageClient::new();
    client
        .expect_create_multipart_upload()
        .times(1)
        .returning(|_, _, _| Ok("u-1".to_owned()));
    client
        .expect_upload_part()
        .times(3)
        .returning(|_, _, _, part_number, _| Ok(format!("e{part_number}")));
    client
        .expect_complete_multipart_upload()
        .times(1)
        .returning(|_, _, _, _| Err(anyhow::anyhow!("assembly rejected")));
    client
        .expect_abort_multipart_upload()
        .times(1)
        .returning(|_, _, _| Ok(()));

    let repo = Arc::new(MemStateRepo::default());
    let service = service_with(client, repo, multipart_config());

    let err = service
        .upload(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadException::InternalError { .. }));

    let status = service.status("bucket", "key").await.unwrap().unwrap();
    assert_eq!(status.state, UploadState::Failed);
    assert!(status.error.is_some());
}

#[tokio::test]
async fn state_store_failures_do_not_fail_the_upload() {
    let mut client = MockObjectStorageClient::new();
    client
        .expect_create_multipart_upload()
        .times(1)
        .returning(|_, _, _| Ok("u-1".to_owned()));
    client
        .expect_upload_part()
        .times(3)
        .returning(|_, _, _, part_number, _| Ok(format!("e{part_number}")));
    client
        .expect_complete_multipart_upload()
        .times(1)
        .returning(|_, _, _, _| Ok("final-etag".to_owned()));

    // Every write to the state store fails; the upload must still complete.
    let mut repo = MockUploadStateRepo::new();
    repo.expect_get_status().returning(|_| Ok(None));
    repo.expect_save_status()
        .returning(|_, _| Err(anyhow::anyhow!("state store down")));
    repo.expect_update_part_status()
        .withf(|_, _, _, etag| etag.as_ref().map_or(true, |etag| etag.starts_with('e')))
        .returning(|_, _, _, _| Err(anyhow::anyhow!("state store down")));
    repo.expect_update_uploaded_size()
        .returning(|_, _| Err(anyhow::anyhow!("state store down")));

    let service = MultipartUploadServiceImpl::builder()
        .object_client(Arc::new(client) as Arc<dyn ObjectStorageClient>)
        .state_repo(Arc::new(repo) as Arc<dyn UploadStateRepo>)
        .config(multipart_config())
        .build();

    let outcome = service
        .upload(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap();
    let UploadOutcome::Completed(receipt) = outcome else {
        panic!("expected a completed upload");
    };
    assert_eq!(receipt.etag, "final-etag");
}

/// Part 1 fails outright, part 2 never comes back.
struct StallingClient;

#[async_trait::async_trait]
impl ObjectStorageClient for StallingClient {
    async fn create_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _content_type: Option<String>,
    ) -> anyhow::Result<String> {
        Ok("u-1".to_owned())
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        part_number: u32,
        _body: Vec<u8>,
    ) -> anyhow::Result<String> {
        if part_number == 1 {
            return Err(anyhow::anyhow!("connection reset"));
        }
        tokio::time::sleep(std::time::Duration::from_secs(300)).await;
        Ok(format!("e{part_number}"))
    }

    async fn complete_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
        _parts: &[CompletedPart],
    ) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("completion not expected"))
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        _upload_id: &str,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    async fn put_object(
        &self,
        _bucket: &str,
        _key: &str,
        _body: Vec<u8>,
        _content_type: Option<String>,
    ) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("put not expected"))
    }

    async fn get_object(&self, _bucket: &str, _key: &str) -> anyhow::Result<Vec<u8>> {
        Err(anyhow::anyhow!("get not expected"))
    }
}

#[tokio::test(start_paused = true)]
async fn slow_workers_after_a_failure_surface_a_pool_timeout() {
    let repo = Arc::new(MemStateRepo::default());
    let config = UploadConfig::builder()
        .part_size(5 * MIB)
        .multipart_threshold(1)
        .concurrency(2)
        .max_retries(0)
        .timeout_secs(1)
        .build();
    let service = MultipartUploadServiceImpl::builder()
        .object_client(Arc::new(StallingClient) as Arc<dyn ObjectStorageClient>)
        .state_repo(repo.clone() as Arc<dyn UploadStateRepo>)
        .config(config)
        .build();

    let err = service
        .upload(source_of(10 * MIB), "bucket", "key")
        .await
        .unwrap_err();
    assert!(matches!(err, UploadException::PoolTimeout { secs: 1 }));

    let status = service.status("bucket", "key").await.unwrap().unwrap();
    assert_eq!(status.state, UploadState::Failed);
    assert!(status.error.is_some());
}

#[derive(Default)]
struct RecordingListener(Mutex<Vec<UploadProgress>>);

impl ProgressListener for RecordingListener {
    fn on_progress(&self, progress: &UploadProgress) {
        self.0.lock().unwrap().push(progress.clone());
    }
}

#[tokio::test]
async fn progress_events_reach_the_listener() {
    let mut client = MockObjectStorageClient::new();
    client
        .expect_create_multipart_upload()
        .times(1)
        .returning(|_, _, _| Ok("u-1".to_owned()));
    client
        .expect_upload_part()
        .times(3)
        .returning(|_, _, _, part_number, _| Ok(format!("e{part_number}")));
    client
        .expect_complete_multipart_upload()
        .times(1)
        .returning(|_, _, _, _| Ok("final-etag".to_owned()));

    let listener = Arc::new(RecordingListener::default());
    let config = UploadConfig::builder()
        .part_size(5 * MIB)
        .multipart_threshold(1)
        .concurrency(1)
        .progress_listener(listener.clone() as Arc<dyn ProgressListener>)
        .build();
    let repo = Arc::new(MemStateRepo::default());
    let service = service_with(client, repo, config);

    service
        .upload(source_of(12 * MIB), "bucket", "key")
        .await
        .unwrap();

    let events = listener.0.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].total_parts, Some(3));
    // Sequential parts make the byte counter strictly grow.
    assert!(events
        .windows(2)
        .all(|pair| pair[0].uploaded_bytes < pair[1].uploaded_bytes));
    let last = events.last().unwrap();
    assert_eq!(last.uploaded_bytes, 12 * MIB);
    assert!(last.is_complete());
}
