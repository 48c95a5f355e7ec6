//! HTTP surface tests

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use stackctl::server::serve::router;
use stackctl::server::state::ServerState;
use tower::ServiceExt;

use crate::common::{activator, FakeRunner};

fn app(runner: &Arc<FakeRunner>) -> Router {
    router(Arc::new(ServerState::new(Arc::new(activator(runner)))))
}

async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, String) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_health() {
    let runner = Arc::new(FakeRunner::new());

    let (status, body) = send(app(&runner), Method::GET, "/health", "").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "stackctl");
}

#[tokio::test]
async fn test_put_stack_returns_engine_output() {
    let runner = Arc::new(FakeRunner::new().with_compose_output("Container blog-web-1  Healthy\n"));

    let (status, body) = send(
        app(&runner),
        Method::PUT,
        "/stacks/blog",
        "services:\n  web:\n    image: nginx\n",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Container blog-web-1  Healthy\n");
    assert_eq!(runner.calls(), vec!["compose -p blog -f - up -d --wait"]);
}

#[tokio::test]
async fn test_invalid_descriptor_is_bad_request() {
    let runner = Arc::new(FakeRunner::new());

    let (status, body) = send(app(&runner), Method::PUT, "/stacks/blog", "networks: {}\n").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("services"));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_engine_failure_is_server_error() {
    let runner = Arc::new(FakeRunner::new().failing("compose", "no such image: nginx:nope"));

    let (status, body) = send(
        app(&runner),
        Method::POST,
        "/up",
        "services:\n  web:\n    image: nginx:nope\n",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.contains("no such image"));
}

#[tokio::test]
async fn test_down() {
    let runner = Arc::new(FakeRunner::new());

    let (status, _) = send(
        app(&runner),
        Method::POST,
        "/stacks/blog/down",
        "services:\n  web:\n    image: nginx\n",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(runner.calls(), vec!["compose -p blog -f - down"]);
}
