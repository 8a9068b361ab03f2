//! Test HTTP server for the courier client.
//!
//! Every route reproduces one situation the client must handle: JSON, empty
//! and malformed bodies, arbitrary statuses, slow or stalled responses, binary
//! downloads, and multipart uploads. Handlers are stateless.

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use axum::{
    body::Body,
    extract::Path,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use bytes::Bytes;
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Body served by `GET /file`.
pub const FILE_BYTES: &[u8] = b"\x00\x01courier file payload\xfe\xff";

/// Body served by `GET /text`.
pub const TEXT_BODY: &str = "plain text, not JSON";

/// What `POST /upload` saw.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadEcho {
    pub content_type: Option<String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/object", get(get_object).post(create_object).put(update_object))
        .route("/object/{code}", delete(delete_object))
        .route("/empty", get(empty))
        .route("/malformed", get(malformed))
        .route("/status/{code}", get(status))
        .route("/slow/{ms}", get(slow))
        .route("/stall", get(stall))
        .route("/text", get(text))
        .route("/file", get(file))
        .route("/headers", get(echo_headers))
        .route("/upload", post(upload))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn get_object() -> Json<Value> {
    Json(json!({ "a": 1 }))
}

async fn create_object(Json(input): Json<Value>) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, Json(input))
}

async fn update_object(Json(input): Json<Value>) -> Json<Value> {
    Json(input)
}

async fn delete_object(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn empty() -> StatusCode {
    StatusCode::OK
}

async fn malformed() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], r#"{"a":"#)
}

async fn status(Path(code): Path<u16>) -> Result<(StatusCode, String), StatusCode> {
    let status = StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)?;
    Ok((status, format!("status {code}")))
}

async fn slow(Path(ms): Path<u64>) -> Json<Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(json!({}))
}

/// Sends the head and one chunk, then never finishes the body.
async fn stall() -> Response {
    let first = stream::once(async { Ok::<_, io::Error>(Bytes::from_static(b"{\"partial\":")) });
    let body = Body::from_stream(first.chain(stream::pending()));
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

async fn text() -> &'static str {
    TEXT_BODY
}

async fn file() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        FILE_BYTES,
    )
}

async fn echo_headers(headers: HeaderMap) -> Json<BTreeMap<String, String>> {
    let echoed = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    Json(echoed)
}

async fn upload(headers: HeaderMap, body: Bytes) -> Json<UploadEcho> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    tracing::info!(bytes = body.len(), "received upload");
    Json(UploadEcho {
        content_type,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}
