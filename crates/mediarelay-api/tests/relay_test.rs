mod helpers;

use axum::http::{HeaderValue, Method};
use helpers::{
    setup_test_app, setup_test_app_with, setup_test_app_with_fetcher, upstream_url, FakeTranscoder,
    RecordingFetcher,
};
use mediarelay_core::BodyMode;
use std::sync::Arc;

#[tokio::test]
async fn test_normalize_relays_body_with_forced_type() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("GET", "/videos/clip.mov")
        .with_status(200)
        .with_header("content-type", "video/quicktime")
        .with_body("quicktime-movie-bytes")
        .create_async()
        .await;

    let app = setup_test_app();
    let response = app
        .server
        .get("/relay")
        .add_query_param("url", upstream_url(&upstream, "/videos/clip.mov"))
        .await;

    assert_eq!(response.status_code(), 200);
    let headers = response.headers();
    assert_eq!(headers["content-type"], "video/mp4");
    assert_eq!(headers["accept-ranges"], "bytes");
    assert_eq!(headers["cache-control"], "public, max-age=3600");
    assert_eq!(
        headers["cdn-cache-control"],
        "public, max-age=86400, stale-while-revalidate=604800"
    );
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(response.text(), "quicktime-movie-bytes");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_range_request_passes_through() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("GET", "/clip.mov")
        .match_header("range", "bytes=0-99")
        .with_status(206)
        .with_header("content-type", "video/quicktime")
        .with_header("content-range", "bytes 0-99/1000")
        .with_header("accept-ranges", "bytes")
        .with_body(vec![7u8; 100])
        .create_async()
        .await;

    let app = setup_test_app();
    let response = app
        .server
        .get("/relay")
        .add_query_param("url", upstream_url(&upstream, "/clip.mov"))
        .add_query_param("mode", "raw")
        .add_header("Range", "bytes=0-99")
        .await;

    assert_eq!(response.status_code(), 206);
    let headers = response.headers();
    assert_eq!(headers["content-range"], "bytes 0-99/1000");
    assert_eq!(headers["content-type"], "video/quicktime");
    assert_eq!(response.as_bytes().len(), 100);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_range_forwarded_byte_for_byte() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let app = setup_test_app_with_fetcher(fetcher.clone());
    // 0xFF is legal in a header value but is not visible ASCII
    let range = HeaderValue::from_bytes(b"bytes=0-99\xff").unwrap();

    let response = app
        .server
        .get("/relay")
        .add_query_param("url", "http://127.0.0.1/clip.mov")
        .add_header("Range", range.clone())
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(fetcher.ranges(), vec![Some(range)]);
}

#[tokio::test]
async fn test_upstream_error_status_is_bad_gateway() {
    let mut upstream = mockito::Server::new_async().await;
    let _mock = upstream
        .mock("GET", "/missing.mov")
        .with_status(404)
        .with_body("NoSuchKey")
        .create_async()
        .await;

    let app = setup_test_app();
    let response = app
        .server
        .get("/relay")
        .add_query_param("url", upstream_url(&upstream, "/missing.mov"))
        .await;

    assert_eq!(response.status_code(), 502);
    assert!(response.text().contains("404"));
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_disallowed_host_rejected_without_upstream_call() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("GET", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let app = setup_test_app();
    for url in [
        "https://evil.example.com/clip.mov",
        "http://127.0.0.1.evil.example.com/clip.mov",
        "https://evil.example.com/?h=127.0.0.1/clip.mov",
    ] {
        let response = app.server.get("/relay").add_query_param("url", url).await;
        assert_eq!(response.status_code(), 403, "url: {}", url);
        assert_eq!(response.text(), "Host not allowed");
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_preflight_returns_cors_without_validation() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("GET", mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let app = setup_test_app();
    let response = app
        .server
        .method(Method::OPTIONS, "/relay")
        .add_query_param("url", "https://evil.example.com/clip.mov")
        .await;

    assert_eq!(response.status_code(), 204);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-origin"], "*");
    assert_eq!(headers["access-control-allow-methods"], "GET, OPTIONS");
    assert_eq!(
        headers["access-control-allow-headers"],
        "Content-Type, Range"
    );
    assert_eq!(
        headers["access-control-expose-headers"],
        "Content-Length, Content-Range, Accept-Ranges"
    );
    assert!(response.as_bytes().is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_missing_and_malformed_url() {
    let app = setup_test_app();

    let response = app.server.get("/relay").await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.text(), "Missing url parameter");

    let response = app
        .server
        .get("/relay")
        .add_query_param("url", "not a url")
        .await;
    assert_eq!(response.status_code(), 400);
    assert_eq!(response.text(), "Invalid url");

    let response = app
        .server
        .get("/relay")
        .add_query_param("url", "ftp://127.0.0.1/clip.mov")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_extension_checked_outside_raw_mode() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("GET", "/notes.txt")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("just text")
        .expect(1)
        .create_async()
        .await;

    let app = setup_test_app();
    let url = upstream_url(&upstream, "/notes.txt");

    let response = app.server.get("/relay").add_query_param("url", &url).await;
    assert_eq!(response.status_code(), 400);
    assert!(response.text().contains(".mov"));

    let response = app
        .server
        .get("/relay")
        .add_query_param("url", &url)
        .add_query_param("mode", "raw")
        .await;
    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers()["content-type"], "text/plain");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_encoded_object_path_accepted() {
    let mut upstream = mockito::Server::new_async().await;
    let mock = upstream
        .mock("GET", "/v0/b/bucket/o/videos%2Fclip.MOV")
        .match_query(mockito::Matcher::UrlEncoded("alt".into(), "media".into()))
        .with_status(200)
        .with_body("firebase-bytes")
        .create_async()
        .await;

    let app = setup_test_app();
    let response = app
        .server
        .get("/relay")
        .add_query_param(
            "url",
            upstream_url(&upstream, "/v0/b/bucket/o/videos%2Fclip.MOV?alt=media"),
        )
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "firebase-bytes");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_invalid_mode_rejected() {
    let app = setup_test_app();
    let response = app
        .server
        .get("/relay")
        .add_query_param("url", "http://127.0.0.1/clip.mov")
        .add_query_param("mode", "fast")
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_buffered_mode_sets_length() {
    let mut upstream = mockito::Server::new_async().await;
    let _mock = upstream
        .mock("GET", "/clip.mp4")
        .with_status(200)
        .with_body("buffered-bytes")
        .create_async()
        .await;

    let app = setup_test_app_with(
        |config| config.body_mode = BodyMode::Buffer,
        Arc::new(FakeTranscoder::copying()),
    );
    let response = app
        .server
        .get("/relay")
        .add_query_param("url", upstream_url(&upstream, "/clip.mp4"))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers()["content-length"], "14");
    assert_eq!(response.text(), "buffered-bytes");
}

#[tokio::test]
async fn test_buffer_limit_is_server_error() {
    let mut upstream = mockito::Server::new_async().await;
    let _mock = upstream
        .mock("GET", "/clip.mp4")
        .with_status(200)
        .with_body(vec![0u8; 4096])
        .create_async()
        .await;

    let app = setup_test_app_with(
        |config| {
            config.body_mode = BodyMode::Buffer;
            config.max_buffer_bytes = 1024;
        },
        Arc::new(FakeTranscoder::copying()),
    );
    let response = app
        .server
        .get("/relay")
        .add_query_param("url", upstream_url(&upstream, "/clip.mp4"))
        .await;

    assert_eq!(response.status_code(), 500);
    assert!(response.text().contains("buffer"));
}

#[tokio::test]
async fn test_redirect_to_disallowed_host_refused() {
    let mut upstream = mockito::Server::new_async().await;
    let _mock = upstream
        .mock("GET", "/clip.mov")
        .with_status(302)
        .with_header(
            "location",
            "http://metadata.google.internal/computeMetadata/v1/",
        )
        .create_async()
        .await;

    let app = setup_test_app();
    let response = app
        .server
        .get("/relay")
        .add_query_param("url", upstream_url(&upstream, "/clip.mov"))
        .await;

    assert_eq!(response.status_code(), 502);
}

#[tokio::test]
async fn test_redirect_within_allow_list_followed() {
    let mut upstream = mockito::Server::new_async().await;
    let target = upstream_url(&upstream, "/moved/clip.mov");
    let _mock = upstream
        .mock("GET", "/clip.mov")
        .with_status(301)
        .with_header("location", &target)
        .create_async()
        .await;
    let _mock = upstream
        .mock("GET", "/moved/clip.mov")
        .with_status(200)
        .with_body("moved-bytes")
        .create_async()
        .await;

    let app = setup_test_app();
    let response = app
        .server
        .get("/relay")
        .add_query_param("url", upstream_url(&upstream, "/clip.mov"))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "moved-bytes");
}

#[tokio::test]
async fn test_request_id_propagated() {
    let app = setup_test_app();
    let response = app
        .server
        .get("/health")
        .add_header("X-Request-ID", "trace-abc-123")
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.headers()["x-request-id"], "trace-abc-123");
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}
