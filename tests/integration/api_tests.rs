//! API integration tests for variant retrieval and error handling.
//!
//! Tests verify:
//! - Variant creation for every operation and the resulting dimensions
//! - Cache hits on repeated requests
//! - Error cases (unsupported extension, upstream errors, corrupt origins)
//! - HTTP response codes and headers

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;

use variant_cache::optimize::OptimizeFailurePolicy;
use variant_cache::server::RouterConfig;

use super::test_utils::{
    body_bytes, body_json, image_dimensions, is_valid_jpeg, jpeg_bytes, png_bytes,
    MockOrigin, RecordingOptimizer, TestApp,
};

// =============================================================================
// Basic Retrieval
// =============================================================================

#[tokio::test]
async fn test_variant_retrieval_success() {
    let origin = MockOrigin::new().with_object("/photos/cat.jpg", jpeg_bytes(800, 600));
    let app = TestApp::new(origin);

    let response = app.get("/photos/cat.jpg?w=400").await;
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "image/jpeg");
    assert_eq!(
        headers.get("last-modified").unwrap(),
        "Wed, 21 Oct 2015 07:28:00 GMT"
    );
    assert_eq!(
        headers.get("cache-control").unwrap(),
        "public, max-age=86400"
    );
    assert_eq!(headers.get("x-cache-hit").unwrap(), "false");

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));
    assert_eq!(image_dimensions(&body), (400, 300));

    assert_eq!(
        app.cached_files(),
        vec![PathBuf::from("photos/w_400.cat.jpg")]
    );
}

#[tokio::test]
async fn test_second_request_is_cache_hit() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(320, 240));
    let app = TestApp::new(origin);

    let first = app.get("/a.jpg?width=160").await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(first.headers().get("x-cache-hit").unwrap(), "false");
    let first_body = body_bytes(first).await;

    let second = app.get("/a.jpg?width=160").await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers().get("x-cache-hit").unwrap(), "true");
    assert_eq!(
        second.headers().get("last-modified").unwrap(),
        "Wed, 21 Oct 2015 07:28:00 GMT"
    );
    assert_eq!(body_bytes(second).await, first_body);

    assert_eq!(app.origin.request_count(), 1);
}

#[tokio::test]
async fn test_distinct_params_are_distinct_variants() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(320, 240));
    let app = TestApp::new(origin);

    assert_eq!(app.get("/a.jpg?w=100").await.status(), StatusCode::OK);
    assert_eq!(app.get("/a.jpg?w=200").await.status(), StatusCode::OK);
    assert_eq!(app.get("/a.jpg?w=100&q=70").await.status(), StatusCode::OK);

    assert_eq!(app.cached_files().len(), 3);
    assert_eq!(app.origin.request_count(), 3);
}

#[tokio::test]
async fn test_no_params_serves_origin() {
    let original = png_bytes(50, 40);
    let origin = MockOrigin::new().with_object("/icons/logo.png", original.clone());
    let app = TestApp::new(origin);

    let response = app.get("/icons/logo.png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");

    assert_eq!(body_bytes(response).await.as_ref(), original.as_slice());
    assert_eq!(app.cached_files(), vec![PathBuf::from("icons/logo.png")]);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new(MockOrigin::new());

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// Operations
// =============================================================================

#[tokio::test]
async fn test_crop_to_fit_exact_dimensions() {
    let sources = [(800, 200), (200, 800), (500, 500), (333, 777)];

    for (i, (w, h)) in sources.into_iter().enumerate() {
        let path = format!("/src{}.jpg", i);
        let origin = MockOrigin::new().with_object(&path, jpeg_bytes(w, h));
        let app = TestApp::new(origin);

        let response = app.get(&format!("{}?op=c2f&w=120&h=90", path)).await;
        assert_eq!(response.status(), StatusCode::OK, "source {}x{}", w, h);

        let body = body_bytes(response).await;
        assert_eq!(image_dimensions(&body), (120, 90), "source {}x{}", w, h);
    }
}

#[tokio::test]
async fn test_crop_to_fit_missing_height_is_bad_gateway() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let app = TestApp::new(origin);

    let response = app.get("/a.jpg?op=c2f&w=50").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_json(response).await;
    assert_eq!(json["error"], "transform_failed");
    assert!(app.cached_files().is_empty());
}

#[tokio::test]
async fn test_thumbnail_aspect_width_only() {
    let origin = MockOrigin::new().with_object("/wide.jpg", jpeg_bytes(1000, 400));
    let app = TestApp::new(origin);

    let response = app.get("/wide.jpg?op=t16x9&w=320").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(image_dimensions(&body_bytes(response).await), (320, 180));
}

#[tokio::test]
async fn test_thumbnail_aspect_height_only_portrait() {
    let origin = MockOrigin::new().with_object("/tall.png", png_bytes(300, 900));
    let app = TestApp::new(origin);

    let response = app.get("/tall.png?op=t16x9&h=200").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(image_dimensions(&body_bytes(response).await), (356, 200));
}

#[tokio::test]
async fn test_thumbnail_aspect_without_dimensions_fails() {
    let origin = MockOrigin::new().with_object("/a.jpg", jpeg_bytes(100, 100));
    let app = TestApp::new(origin);

    let response = app.get("/a.jpg?op=t16x9").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(app.cached_files().is_empty());
}

#[tokio::test]
async fn test_resize_to_width_with_max_height() {
    let origin = MockOrigin::new().with_object("/tall.jpg", jpeg_bytes(400, 800));
    let app = TestApp::new(origin);

    let response = app.get("/tall.jpg?op=r2w&w=200&h=150").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(image_dimensions(&body_bytes(response).await), (200, 150));
}

#[tokio::test]
async fn test_oversized_width_is_ignored() {
    let original = jpeg_bytes(64, 48);
    let origin = MockOrigin::new().with_object("/a.jpg", original.clone());
    let app = TestApp::new(origin);

    // Width above the maximum is dropped, leaving no operation
    let response = app.get("/a.jpg?w=5000").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_bytes(response).await.as_ref(), original.as_slice());
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_unsupported_extension_not_found() {
    let origin = MockOrigin::new().with_object("/anim.gif", b"GIF89a".to_vec());
    let app = TestApp::new(origin);

    let response = app.get("/anim.gif?w=100").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "unsupported_media");
    assert_eq!(json["status"], 404);

    assert_eq!(app.origin.request_count(), 0);
    assert!(app.cached_files().is_empty());
}

#[tokio::test]
async fn test_extension_is_case_insensitive() {
    let origin = MockOrigin::new().with_object("/LOUD.JPG", jpeg_bytes(40, 40));
    let app = TestApp::new(origin);

    let response = app.get("/LOUD.JPG").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/jpeg");
}

#[tokio::test]
async fn test_upstream_missing_is_not_found() {
    let app = TestApp::new(MockOrigin::new());

    let response = app.get("/invented/deep/missing.jpg?w=100").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "not_found");
    assert_eq!(app.origin.request_count(), 1);
    assert_eq!(std::fs::read_dir(app.storage.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_upstream_error_is_bad_gateway() {
    let origin = MockOrigin::new().with_status("/a.jpg", 500);
    let app = TestApp::new(origin);

    let response = app.get("/a.jpg?w=100").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_json(response).await;
    assert_eq!(json["error"], "fetch_failed");
    assert!(app.cached_files().is_empty());
    assert!(app.in_flight.is_empty());
}

#[tokio::test]
async fn test_corrupted_origin_leaves_nothing_cached() {
    let origin = MockOrigin::new().with_object("/broken.jpg", b"definitely not a jpeg".to_vec());
    let app = TestApp::new(origin);

    let response = app.get("/broken.jpg?op=c2f&w=50&h=50").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let json = body_json(response).await;
    assert_eq!(json["error"], "transform_failed");

    assert!(!app.cache_file("op_c2f_w_50_h_50.broken.jpg").exists());
    assert!(app.cached_files().is_empty());

    // A failed request is not remembered; the next one re-runs the pipeline
    let retry = app.get("/broken.jpg?op=c2f&w=50&h=50").await;
    assert_eq!(retry.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(app.origin.request_count(), 2);
}

#[tokio::test]
async fn test_traversal_stays_inside_cache_root() {
    let origin = MockOrigin::new().with_object("/secret.jpg", jpeg_bytes(20, 20));
    let app = TestApp::new(origin);

    let response = app.get("/a/../secret.jpg").await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.cached_files(), vec![PathBuf::from("secret.jpg")]);
    assert_eq!(app.origin.request_count(), 1);
}

#[tokio::test]
async fn test_dot_segments_map_to_their_origin() {
    let origin = MockOrigin::new()
        .with_object("/b.png", png_bytes(10, 10))
        .with_object("/a/b.png", png_bytes(20, 20))
        .with_object("/a/_b.png", png_bytes(30, 30));
    let app = TestApp::new(origin);

    let parent = body_bytes(app.get("/a/../b.png").await).await;
    let current = body_bytes(app.get("/a/./b.png").await).await;
    let literal = body_bytes(app.get("/a/_b.png").await).await;

    assert_eq!(image_dimensions(&parent), (10, 10));
    assert_eq!(image_dimensions(&current), (20, 20));
    assert_eq!(image_dimensions(&literal), (30, 30));

    assert_eq!(app.origin.request_count(), 3);
    assert_eq!(
        app.cached_files(),
        vec![
            PathBuf::from("a/_b.png"),
            PathBuf::from("a/b.png"),
            PathBuf::from("b.png"),
        ]
    );
}

#[tokio::test]
async fn test_lookalike_query_does_not_poison_variant() {
    let origin = MockOrigin::new().with_object("/a.png", png_bytes(64, 64));
    let app = TestApp::new(origin);

    let passthrough = app.get("/a.png?width.32").await;
    assert_eq!(passthrough.status(), StatusCode::OK);
    assert_eq!(image_dimensions(&body_bytes(passthrough).await), (64, 64));

    let resized = app.get("/a.png?width=32").await;
    assert_eq!(resized.status(), StatusCode::OK);
    assert_eq!(resized.headers().get("x-cache-hit").unwrap(), "false");
    assert_eq!(image_dimensions(&body_bytes(resized).await), (32, 32));

    assert_eq!(
        app.cached_files(),
        vec![PathBuf::from("a.png"), PathBuf::from("w_32.a.png")]
    );
}

#[tokio::test]
async fn test_extreme_aspect_source_is_served() {
    let origin = MockOrigin::new().with_object("/sliver.png", png_bytes(1, 4000));
    let app = TestApp::new(origin);

    let cropped = app.get("/sliver.png?op=c2f&w=2048&h=1024").await;
    assert_eq!(cropped.status(), StatusCode::OK);
    assert_eq!(image_dimensions(&body_bytes(cropped).await), (2048, 1024));

    let banded = app.get("/sliver.png?w=2048&h=1024").await;
    assert_eq!(banded.status(), StatusCode::OK);
    assert_eq!(image_dimensions(&body_bytes(banded).await), (2048, 1024));

    // Unbounded height would need billions of pixels
    let unbounded = app.get("/sliver.png?w=2048").await;
    assert_eq!(unbounded.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(unbounded).await["error"], "transform_failed");

    assert_eq!(app.get("/health").await.status(), StatusCode::OK);
}

// =============================================================================
// Routing
// =============================================================================

#[tokio::test]
async fn test_prefix_routing() {
    let origin = MockOrigin::new().with_object("/cat.jpg", jpeg_bytes(100, 100));
    let app = TestApp::build(
        origin,
        Arc::new(RecordingOptimizer::default()),
        OptimizeFailurePolicy::Tolerate,
        RouterConfig::new().with_prefix("/images").with_cache_max_age(60),
    );

    let response = app.get("/images/cat.jpg?w=50").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60"
    );
    assert_eq!(image_dimensions(&body_bytes(response).await), (50, 50));

    let unprefixed = app.get("/cat.jpg?w=50").await;
    assert_eq!(unprefixed.status(), StatusCode::NOT_FOUND);

    // Health stays at the root
    assert_eq!(app.get("/health").await.status(), StatusCode::OK);
}
