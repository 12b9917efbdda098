//! Full-stack tests: router + coordinator + the real embedded interpreter.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use pyrepl_engine::EngineHandle;
use pyrepl_server::create_router;
use pyrepl_session::Coordinator;

async fn repl_router() -> Router {
    let engine = EngineHandle::spawn(vec!["json".to_owned()])
        .await
        .expect("engine starts");
    create_router(Arc::new(Coordinator::new(engine, None)))
}

async fn execute(router: &Router, lines: &[&str]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/execute")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({ "code": lines }).to_string()))
        .expect("request builds");
    let response = router.clone().oneshot(request).await.expect("router answers");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
    (status, serde_json::from_slice(&bytes).expect("body is JSON"))
}

async fn reset(router: &Router) -> StatusCode {
    let request = Request::builder()
        .method("POST")
        .uri("/reset")
        .body(Body::empty())
        .expect("request builds");
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router answers")
        .status()
}

#[tokio::test]
async fn namespace_persists_between_calls() {
    let router = repl_router().await;

    let (status, body) = execute(&router, &["x = 1"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = execute(&router, &["x"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "1");
}

#[tokio::test]
async fn failed_code_is_http_200_with_error_payload() {
    let router = repl_router().await;

    let (status, body) = execute(&router, &["1/0"]).await;
    assert_eq!(status, StatusCode::OK, "code errors are not transport errors");
    assert_eq!(body["success"], false);
    assert!(
        body["error"].as_str().unwrap().contains("ZeroDivisionError"),
        "error was: {}",
        body["error"]
    );

    // the failure left nothing stuck: the next call is admitted and works
    let (status, body) = execute(&router, &["2 + 2"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "4");
}

#[tokio::test]
async fn reset_clears_user_definitions() {
    let router = repl_router().await;

    execute(&router, &["x = 1"]).await;
    assert_eq!(reset(&router).await, StatusCode::OK);

    let (status, body) = execute(&router, &["x"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("NameError"));
}

#[tokio::test]
async fn preloaded_modules_survive_reset() {
    let router = repl_router().await;

    assert_eq!(reset(&router).await, StatusCode::OK);
    let (status, body) = execute(&router, &["json.loads('[3]')[0]"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"], "3", "error was: {}", body["error"]);
}

#[tokio::test]
async fn empty_submission_is_an_empty_success() {
    let router = repl_router().await;

    let (status, body) = execute(&router, &[]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["output"], "");
}

#[tokio::test]
async fn indented_selection_executes_after_dedent() {
    let router = repl_router().await;

    let (status, body) = execute(&router, &["    y = 10", "    y * 2"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true, "error was: {}", body["error"]);
    assert_eq!(body["value"], "20");
}

#[tokio::test]
async fn captured_stdout_comes_back_in_the_body() {
    let router = repl_router().await;

    let (status, body) = execute(&router, &["for i in range(3):", "    print(i)"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "0\n1\n2\n");
}
