//! End-to-end tests: document payload to cached, transformed image bytes,
//! against a mock upstream server.

use std::io::Cursor;
use std::path::Path;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use image::{ImageFormat, Rgb, RgbImage};
use imgcache::{collect_links, create_router, AppState, Config};
use serde_json::{json, Value};
use tempfile::tempdir;
use tower::util::ServiceExt;

/// Opaque PNG with enough grain that it compresses poorly.
fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77);
        h ^= h >> 15;
        h = h.wrapping_mul(0x2C1B_3C6D);
        h ^= h >> 12;
        let grain = (h & 0x3F) as u8;
        Rgb([
            ((x * 255 / width) as u8).saturating_add(grain),
            ((y * 255 / height) as u8).saturating_add(grain / 2),
            128u8.saturating_add(grain),
        ])
    });
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn test_config(disk_dir: &Path) -> Config {
    Config {
        max_width: 180,
        max_height: 180,
        min_bytes_to_touch: 1_000,
        disk_cache_dir: disk_dir.to_path_buf(),
        fetch_attempts: 2,
        ..Config::default()
    }
}

fn encode(url: &str) -> String {
    url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_payload_to_bounded_jpeg_cached_on_disk() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/photo.png")
        .with_status(200)
        .with_header("content-type", "image/png")
        .with_body(noisy_png(400, 300))
        .expect(1)
        .create_async()
        .await;
    let url = format!("{}/photo.png", server.url());
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());

    // Prepare the document: collect + prefetch.
    let payload = json!({ "photo": { "link": url } });
    let links = collect_links(&payload);
    assert_eq!(links.len(), 1);

    let state = AppState::from_config(&config).unwrap();
    let getter = state.documents.prepare(&payload, None).await;
    assert_eq!(getter.report().unwrap().succeeded, 1);

    // Render: the image comes back as a bounded JPEG.
    let bytes = getter.get(&json!({ "link": url })).await.unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert!(decoded.width() <= 180 && decoded.height() <= 180);
    assert_eq!((decoded.width(), decoded.height()), (180, 135));

    let on_disk = std::fs::read(state.cache.disk().path_for(&url)).unwrap();
    assert_eq!(on_disk, bytes.to_vec());

    // A fresh process over the same disk directory does not touch the network.
    let restarted = AppState::from_config(&config).unwrap();
    let again = restarted.cache.get_or_fetch(&url, None).await.unwrap();
    assert_eq!(again, bytes);
    assert_eq!(restarted.cache.stats().await.disk_hits, 1);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_image_endpoint_serves_transformed_bytes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/banner.png")
        .with_status(200)
        .with_body(noisy_png(400, 300))
        .expect(1)
        .create_async()
        .await;
    let url = format!("{}/banner.png", server.url());
    let dir = tempdir().unwrap();
    let app = create_router(AppState::from_config(&test_config(dir.path())).unwrap());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/image?url={}", encode(&url)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/jpeg");
    }

    let response = app
        .oneshot(Request::builder().uri("/stats").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let stats = body_json(response).await;
    assert_eq!(stats["memory_hits"], 1);
    assert_eq!(stats["upstream_fetches"], 1);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_prefetch_endpoint_forwards_token() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/private.png")
        .match_header("authorization", "Bearer s3cret")
        .with_status(200)
        .with_body(noisy_png(64, 64))
        .expect(1)
        .create_async()
        .await;
    let url = format!("{}/private.png", server.url());
    let dir = tempdir().unwrap();
    let app = create_router(AppState::from_config(&test_config(dir.path())).unwrap());

    let payload = json!({ "rows": [{ "logo": { "link": url } }, { "text": "hello" }] });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/prefetch")
                .header("content-type", "application/json")
                .header("x-upstream-token", "s3cret")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["links"], 1);
    assert_eq!(body["succeeded"], 1);
    assert_eq!(body["failed"], 0);

    mock.assert_async().await;
}

#[tokio::test]
async fn test_prefetch_disabled_reports_skipped() {
    let dir = tempdir().unwrap();
    let config = Config {
        prefetch_enabled: false,
        ..test_config(dir.path())
    };
    let app = create_router(AppState::from_config(&config).unwrap());

    let payload = json!({ "a": { "link": "https://unreachable.invalid/a.png" } });
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/prefetch")
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["links"], 1);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["succeeded"], 0);
}

#[tokio::test]
async fn test_upstream_not_found_is_bad_gateway_and_not_cached() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/missing.png")
        .with_status(404)
        .expect(2)
        .create_async()
        .await;
    let url = format!("{}/missing.png", server.url());
    let dir = tempdir().unwrap();
    let app = create_router(AppState::from_config(&test_config(dir.path())).unwrap());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/image?url={}", encode(&url)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert!(body["error"].as_str().unwrap().contains("404"));
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_small_images_pass_through_untouched() {
    let original = noisy_png(20, 20);
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/icon.png")
        .with_status(200)
        .with_body(original.clone())
        .create_async()
        .await;
    let url = format!("{}/icon.png", server.url());
    let dir = tempdir().unwrap();
    let config = Config {
        min_bytes_to_touch: original.len() + 1,
        ..test_config(dir.path())
    };

    let state = AppState::from_config(&config).unwrap();
    let bytes = state.cache.get_or_fetch(&url, None).await.unwrap();
    assert_eq!(bytes.to_vec(), original);
}
