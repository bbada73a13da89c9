//! End-to-end media workflow over the in-memory admin API.
//!
//! Run with `cargo test -p fitcms-state --test media_workflow_test`.

use fitcms_api_client::testing::{FakeMediaServer, Method};
use fitcms_api_client::{MediaClient, RequestGate, ResponseCache, RetryPolicy};
use fitcms_core::{LocalFile, MediaError, MediaType, UploadForm, UploadStatus, ViewAngle};
use fitcms_state::{
    ControllerConfig, InMemoryPreviewStore, MediaStateController, RecordingNotifier,
};
use std::sync::Arc;
use std::time::Duration;

fn setup(server: Arc<FakeMediaServer>) -> (MediaStateController, Arc<InMemoryPreviewStore>) {
    let client = MediaClient::new(
        server,
        Arc::new(RequestGate::new(2)),
        Arc::new(ResponseCache::default()),
        RetryPolicy::default(),
    );
    let previews = Arc::new(InMemoryPreviewStore::new());
    let controller = MediaStateController::new(
        client,
        "ex1",
        Vec::new(),
        Arc::new(RecordingNotifier::new()),
        previews.clone(),
        ControllerConfig::default(),
    );
    (controller, previews)
}

#[tokio::test(start_paused = true)]
async fn test_front_image_then_side_video() {
    let server = Arc::new(FakeMediaServer::new());
    let (controller, previews) = setup(server.clone());

    let front = UploadForm::new(
        "ex1",
        ViewAngle::Front,
        MediaType::Image,
        LocalFile::new("squat-front.jpg", vec![0xFF; 4096]).with_content_type("image/jpeg"),
    );
    let first = controller.upload(front).await.unwrap();
    assert!(first.is_primary);

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.media.len(), 1);
    assert_eq!(
        controller.local_completeness().missing_angles,
        vec![ViewAngle::Side, ViewAngle::Rear, ViewAngle::Angle]
    );

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let check = controller.snapshot().completeness.unwrap();
    assert!(!check.is_complete);
    assert_eq!(
        check.missing_angles,
        vec![ViewAngle::Side, ViewAngle::Rear, ViewAngle::Angle]
    );

    let side = UploadForm::new(
        "ex1",
        ViewAngle::Side,
        MediaType::Video,
        LocalFile::new("squat-side.mp4", vec![0; 8192]).with_content_type("video/mp4"),
    )
    .with_title("Squat side");
    let second = controller.upload(side).await.unwrap();
    assert!(!second.is_primary);

    tokio::time::sleep(Duration::from_millis(1100)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.media.len(), 2);
    assert!(snapshot.pending.is_empty());
    assert_eq!(
        snapshot.completeness.unwrap().missing_angles,
        vec![ViewAngle::Rear, ViewAngle::Angle]
    );
    let stats = snapshot.stats.unwrap();
    assert_eq!(stats.count_for_type(MediaType::Video), 1);
    assert_eq!(stats.count_for_type(MediaType::Image), 1);
    assert_eq!(previews.live_count(), 0);

    let orders: Vec<i32> = snapshot.media.iter().map(|m| m.order).collect();
    assert_eq!(orders, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_work_respects_request_ceiling() {
    let server = Arc::new(FakeMediaServer::new().with_latency(Duration::from_millis(50)));
    let (controller, _) = setup(server.clone());

    let uploads = ViewAngle::ALL.iter().map(|angle| {
        let form = UploadForm::new(
            "ex1",
            *angle,
            MediaType::Image,
            LocalFile::new(format!("{}.png", angle), vec![1; 1024]),
        );
        let controller = controller.clone();
        async move { controller.upload(form).await }
    });
    let results = futures::future::join_all(uploads).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert!(server.peak_in_flight() <= 2);

    controller.load_completeness().await.unwrap();
    assert!(controller.snapshot().completeness.unwrap().is_complete);
}

#[tokio::test(start_paused = true)]
async fn test_failed_upload_is_kept_and_retry_succeeds() {
    let server = Arc::new(FakeMediaServer::new());
    let (controller, _) = setup(server.clone());
    server.fail_next(Method::Post, MediaError::from_status(413, None));

    let form = UploadForm::new(
        "ex1",
        ViewAngle::Rear,
        MediaType::Image,
        LocalFile::new("rear.webp", vec![2; 512]),
    );
    assert!(controller.upload(form).await.is_err());

    let failed = controller.snapshot().pending[0].clone();
    assert_eq!(failed.status, UploadStatus::Error);
    assert!(failed.error.is_some());

    controller.retry_upload(failed.temp_id).await.unwrap();
    assert_eq!(server.media_of("ex1").len(), 1);
    assert_eq!(server.call_count(Method::Post, "/exercises/media"), 2);
}
