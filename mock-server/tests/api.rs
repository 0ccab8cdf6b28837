use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Echo, StatusReply, ERROR_FIXTURE, USER_FIXTURE};
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- status ---

#[tokio::test]
async fn status_echoes_requested_code() {
    let resp = app().oneshot(get("/status/401/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let reply: StatusReply = body_json(resp).await;
    assert_eq!(reply.code, 401);
    assert_eq!(reply.description, "Unauthorized");
}

#[tokio::test]
async fn status_answers_any_method() {
    let req = Request::builder()
        .method("DELETE")
        .uri("/status/500/")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn status_204_has_empty_body() {
    let resp = app().oneshot(get("/status/204/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn status_out_of_range_is_400() {
    let resp = app().oneshot(get("/status/1000/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_requires_trailing_slash() {
    let resp = app().oneshot(get("/status/200")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- echo ---

#[tokio::test]
async fn echo_reflects_request() {
    let req = Request::builder()
        .method("POST")
        .uri("/echo/?a=1&b=two")
        .header(http::header::CONTENT_TYPE, "application/json")
        .header(http::header::AUTHORIZATION, "Bearer token")
        .body(r#"{"x":1}"#.to_string())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "POST");
    assert_eq!(echo.path, "/echo/");
    assert_eq!(echo.query.as_deref(), Some("a=1&b=two"));
    assert_eq!(echo.headers["content-type"], "application/json");
    assert_eq!(echo.headers["authorization"], "Bearer token");
    assert_eq!(echo.body, r#"{"x":1}"#);
}

#[tokio::test]
async fn echo_without_body_or_query() {
    let resp = app().oneshot(get("/echo/")).await.unwrap();
    let echo: Echo = body_json(resp).await;
    assert_eq!(echo.method, "GET");
    assert!(echo.query.is_none());
    assert!(echo.body.is_empty());
}

// --- fixtures ---

#[tokio::test]
async fn user_fixture() {
    let resp = app().oneshot(get("/fixtures/user/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[http::header::CONTENT_TYPE], "application/json");
    assert_eq!(body_bytes(resp).await, USER_FIXTURE.as_bytes());
}

#[tokio::test]
async fn error_fixture_is_served_with_200() {
    let resp = app().oneshot(get("/fixtures/error/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_bytes(resp).await, ERROR_FIXTURE.as_bytes());
}

#[tokio::test]
async fn empty_fixture_has_zero_length_body() {
    let resp = app().oneshot(get("/fixtures/empty/")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_bytes(resp).await.is_empty());
}

#[tokio::test]
async fn garbage_fixture_is_not_json() {
    let resp = app().oneshot(get("/fixtures/garbage/")).await.unwrap();
    let bytes = body_bytes(resp).await;
    assert!(serde_json::from_slice::<serde_json::Value>(&bytes).is_err());
}

#[tokio::test]
async fn unknown_fixture_is_404() {
    let resp = app().oneshot(get("/fixtures/nope/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let resp = app().oneshot(get("/nope")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
