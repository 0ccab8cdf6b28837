use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Body returned by `/status/{code}/` for codes that allow one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatusReply {
    pub code: u16,
    pub description: String,
}

/// What `/echo/` saw of the incoming request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

pub const USER_FIXTURE: &str = r#"{"intValue":1,"nested":{"hi":"hi","hello":2}}"#;
pub const ERROR_FIXTURE: &str = r#"{"code":"E42","message":"quota exceeded"}"#;
pub const GARBAGE_FIXTURE: &str = "<html>not json</html>";

pub fn app() -> Router {
    Router::new()
        .route("/status/{code}/", any(status))
        .route("/echo/", any(echo))
        .route("/fixtures/{name}/", get(fixture))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn status(Path(code): Path<u16>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    if !allows_body(status) {
        return status.into_response();
    }
    let reply = StatusReply {
        code,
        description: status.canonical_reason().unwrap_or("Unknown").to_string(),
    };
    (status, Json(reply)).into_response()
}

fn allows_body(status: StatusCode) -> bool {
    !(status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED)
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(name, value)| {
            let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
            (name.as_str().to_string(), value)
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn fixture(Path(name): Path<String>) -> Response {
    let json = [(header::CONTENT_TYPE, "application/json")];
    match name.as_str() {
        "user" => (json, USER_FIXTURE).into_response(),
        "error" => (json, ERROR_FIXTURE).into_response(),
        "empty" => StatusCode::OK.into_response(),
        "garbage" => ([(header::CONTENT_TYPE, "text/html")], GARBAGE_FIXTURE).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
