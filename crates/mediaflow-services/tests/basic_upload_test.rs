//! Basic (single request) upload tests.
//!
//! Run with: `cargo test -p mediaflow-services --test basic_upload_test`

mod helpers;

use helpers::{mp4_bytes, setup_engine, FakeRunner, SHORT_VIDEO_PROBE};
use mediaflow_core::models::{MediaCategory, MediaStatus};
use mediaflow_core::{AppError, MediaRepository};
use mediaflow_services::{BasicUploadRequest, UploadPayload};

#[tokio::test]
async fn test_basic_document_upload() {
    let app = setup_engine(FakeRunner::default()).await;

    let record = app
        .engine
        .basic_upload(BasicUploadRequest::bytes("Meeting Notes.TXT", &b"hello world"[..]))
        .await
        .unwrap();

    assert_eq!(record.status, MediaStatus::Ready);
    assert_eq!(record.category, Some(MediaCategory::Document));
    assert_eq!(record.mime_type, "text/plain");
    assert_eq!(record.filename, "meeting_notes.txt");
    assert_eq!(record.title, "meeting_notes.txt");
    assert_eq!(record.file_size, 11);
    assert_eq!(record.progress, 1.0);
    assert!(record.path.ends_with("/meeting_notes.txt"));
    assert!(record.thumbnail.is_none() && record.preview.is_none());
    assert_eq!(
        std::fs::read(app.upload_path(&record.path)).unwrap(),
        b"hello world"
    );

    let stored = app.repo.find_by_id(record.id).await.unwrap().unwrap();
    assert_eq!(stored.status, MediaStatus::Ready);
    assert!(app.runner.calls().is_empty());
}

#[tokio::test]
async fn test_base64_upload_with_data_url_prefix() {
    let app = setup_engine(FakeRunner::default()).await;

    let record = app
        .engine
        .basic_upload(BasicUploadRequest {
            filename: Some("hello.txt".to_string()),
            title: Some("Greeting".to_string()),
            description: Some("A short note".to_string()),
            payload: UploadPayload::Base64("data:text/plain;base64,aGVsbG8gd29ybGQ=".to_string()),
            skip_save: false,
        })
        .await
        .unwrap();

    assert_eq!(record.title, "Greeting");
    assert_eq!(record.description, "A short note");
    assert_eq!(
        std::fs::read(app.upload_path(&record.path)).unwrap(),
        b"hello world"
    );
}

#[tokio::test]
async fn test_base64_upload_requires_filename() {
    let app = setup_engine(FakeRunner::default()).await;

    let err = app
        .engine
        .basic_upload(BasicUploadRequest {
            filename: None,
            title: None,
            description: None,
            payload: UploadPayload::Base64("aGVsbG8=".to_string()),
            skip_save: false,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidInput(_)));
    assert!(app.repo.is_empty().await);
}

#[tokio::test]
async fn test_skip_save_publishes_without_record() {
    let app = setup_engine(FakeRunner::default()).await;
    let mut request = BasicUploadRequest::bytes("notes.txt", &b"hello world"[..]);
    request.skip_save = true;

    let record = app.engine.basic_upload(request).await.unwrap();

    assert_eq!(record.id, 0);
    assert_eq!(record.status, MediaStatus::Ready);
    assert!(app.upload_path(&record.path).exists());
    assert!(app.repo.is_empty().await);
}

#[tokio::test]
async fn test_empty_upload_is_a_document() {
    let app = setup_engine(FakeRunner::default()).await;

    let record = app
        .engine
        .basic_upload(BasicUploadRequest::bytes("empty.bin", Vec::<u8>::new()))
        .await
        .unwrap();

    assert_eq!(record.category, Some(MediaCategory::Document));
    assert_eq!(record.mime_type, "application/octet-stream");
    assert_eq!(record.file_size, 0);
}

#[tokio::test]
async fn test_basic_video_upload_builds_artifacts() {
    let app = setup_engine(FakeRunner::with_probe(SHORT_VIDEO_PROBE)).await;

    let record = app
        .engine
        .basic_upload(BasicUploadRequest::bytes("clip.mp4", mp4_bytes()))
        .await
        .unwrap();

    let prefix = record.path.trim_end_matches("/clip.mp4");
    assert_eq!(record.category, Some(MediaCategory::Video));
    assert_eq!(record.duration, 8);
    assert_eq!(record.screen_size, "1280x720");
    assert_eq!(record.aspect_ratio, "16:9");
    assert_eq!(record.preview.as_deref(), Some(format!("{}/clip_preview.mp4", prefix).as_str()));
    assert_eq!(record.thumbnail.as_deref(), Some(format!("{}/clip_preview.jpg", prefix).as_str()));
    assert!(app.upload_path(record.preview.as_deref().unwrap()).exists());
}

#[tokio::test]
async fn test_basic_probe_failure_leaves_nothing_behind() {
    let runner = FakeRunner::with_probe(SHORT_VIDEO_PROBE);
    runner.fail_when("clip.mp4");
    let app = setup_engine(runner).await;

    let err = app
        .engine
        .basic_upload(BasicUploadRequest::bytes("clip.mp4", mp4_bytes()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Probe(_)));
    assert!(app.repo.is_empty().await);
    let leftovers: Vec<_> = std::fs::read_dir(&app.config.upload_dir)
        .unwrap()
        .collect();
    assert!(leftovers.is_empty());
}
