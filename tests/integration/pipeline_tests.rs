//! Pipeline integration tests for optimization and scratch-file handling.
//!
//! Tests verify:
//! - Quality resolution passed to the optimizer
//! - Both optimizer failure policies
//! - The builtin optimizer end to end
//! - Scratch directories are left empty

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;

use variant_cache::error::VariantError;
use variant_cache::optimize::{JpegOptimizer, NoopOptimizer, OptimizeFailurePolicy};
use variant_cache::server::RouterConfig;
use variant_cache::variant::{VariantConfig, VariantService};

use super::test_utils::{
    body_bytes, body_json, image_dimensions, is_valid_jpeg, jpeg_bytes, list_files, png_bytes,
    FailingOptimizer, MockOrigin, RecordingOptimizer, TestApp, UPSTREAM,
};

fn app_with_recorder(origin: MockOrigin) -> (TestApp, Arc<RecordingOptimizer>) {
    let optimizer = Arc::new(RecordingOptimizer::default());
    let app = TestApp::build(
        origin,
        optimizer.clone(),
        OptimizeFailurePolicy::Tolerate,
        RouterConfig::new(),
    );
    (app, optimizer)
}

// =============================================================================
// Quality
// =============================================================================

#[tokio::test]
async fn test_quality_passed_to_optimizer() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let (app, optimizer) = app_with_recorder(origin);

    let response = app.get("/a.jpg?w=50&q=75").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(optimizer.qualities(), vec![75]);
}

#[tokio::test]
async fn test_out_of_range_quality_uses_default() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let (app, optimizer) = app_with_recorder(origin);

    assert_eq!(app.get("/a.jpg?w=50&q=45").await.status(), StatusCode::OK);
    assert_eq!(app.get("/a.jpg?w=50&quality=150").await.status(), StatusCode::OK);
    assert_eq!(app.get("/a.jpg?w=50&q=abc").await.status(), StatusCode::OK);
    assert_eq!(app.get("/a.jpg?w=50").await.status(), StatusCode::OK);

    assert_eq!(optimizer.qualities(), vec![90, 90, 90, 90]);
}

#[tokio::test]
async fn test_optimizer_runs_on_passthrough() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let (app, optimizer) = app_with_recorder(origin);

    assert_eq!(app.get("/a.jpg?q=80").await.status(), StatusCode::OK);
    assert_eq!(optimizer.qualities(), vec![80]);
}

#[tokio::test]
async fn test_optimizer_skipped_on_cache_hit() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let (app, optimizer) = app_with_recorder(origin);

    app.get("/a.jpg?w=50").await;
    app.get("/a.jpg?w=50").await;

    assert_eq!(optimizer.calls().len(), 1);
}

#[tokio::test]
async fn test_optimizer_sees_staged_file_not_final_path() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let (app, optimizer) = app_with_recorder(origin);

    app.get("/a.jpg?w=50").await;

    let (path, _) = optimizer.calls().remove(0);
    assert_ne!(path, app.cache_file("w_50.a.jpg"));
    assert!(path.starts_with(app.storage.path()));
    assert!(!path.exists());
}

// =============================================================================
// Failure Policy
// =============================================================================

#[tokio::test]
async fn test_optimizer_failure_tolerated() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let optimizer = Arc::new(FailingOptimizer::default());
    let app = TestApp::build(
        origin,
        optimizer.clone(),
        OptimizeFailurePolicy::Tolerate,
        RouterConfig::new(),
    );

    let response = app.get("/a.jpg?w=50").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));
    assert_eq!(image_dimensions(&body), (50, 50));

    assert_eq!(optimizer.call_count(), 1);
    assert_eq!(app.cached_files(), vec![PathBuf::from("w_50.a.jpg")]);
}

#[tokio::test]
async fn test_optimizer_failure_fails_request() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let optimizer = Arc::new(FailingOptimizer::default());
    let app = TestApp::build(
        origin,
        optimizer.clone(),
        OptimizeFailurePolicy::Fail,
        RouterConfig::new(),
    );

    let response = app.get("/a.jpg?w=50").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["error"], "optimize_failed");

    assert_eq!(optimizer.call_count(), 1);
    assert!(app.cached_files().is_empty());
}

// =============================================================================
// Builtin Optimizer
// =============================================================================

#[tokio::test]
async fn test_builtin_optimizer_end_to_end() {
    let origin = MockOrigin::new().with_object("/photo.jpg", jpeg_bytes(640, 480));
    let app = TestApp::build(
        origin,
        Arc::new(JpegOptimizer::new()),
        OptimizeFailurePolicy::Fail,
        RouterConfig::new(),
    );

    let low = app.get("/photo.jpg?w=320&q=60").await;
    assert_eq!(low.status(), StatusCode::OK);
    let low = body_bytes(low).await;

    let high = app.get("/photo.jpg?w=320&q=100").await;
    assert_eq!(high.status(), StatusCode::OK);
    let high = body_bytes(high).await;

    assert!(is_valid_jpeg(&low));
    assert_eq!(image_dimensions(&low), (320, 240));
    assert!(low.len() < high.len());
}

#[tokio::test]
async fn test_builtin_optimizer_leaves_png_alone() {
    let original = png_bytes(40, 30);
    let origin = MockOrigin::new().with_object("/a.png", original.clone());
    let app = TestApp::build(
        origin,
        Arc::new(JpegOptimizer::new()),
        OptimizeFailurePolicy::Fail,
        RouterConfig::new(),
    );

    let response = app.get("/a.png?q=60").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), original.as_slice());
}

// =============================================================================
// Scratch Directory
// =============================================================================

#[tokio::test]
async fn test_scratch_dir_left_empty() {
    let cache = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let origin = MockOrigin::new()
        .with_object("/ok.jpg", jpeg_bytes(100, 100))
        .with_object("/bad.jpg", b"garbage".to_vec());

    let config = VariantConfig::new(cache.path(), UPSTREAM).with_temp_dir(scratch.path());
    let service =
        VariantService::new(config, origin).with_optimizer(Arc::new(NoopOptimizer));

    let ok = service.serve("/ok.jpg", Some("op=c2f&w=20&h=10")).await.unwrap();
    assert!(!ok.cache_hit);
    assert_eq!(image_dimensions(&ok.data), (20, 10));

    let bad = service.serve("/bad.jpg", Some("w=20")).await;
    assert!(matches!(bad, Err(VariantError::Transform(_))));

    assert!(list_files(scratch.path()).is_empty());
    assert_eq!(
        list_files(cache.path()),
        vec![cache.path().join("op_c2f_w_20_h_10.ok.jpg")]
    );
}
