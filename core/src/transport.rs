//! The seam between the facade and a concrete HTTP stack.
//!
//! # Design
//! The facade never talks to a socket itself. It builds a
//! `RequestDescriptor` and asks a `Transport` to send it. A transport only
//! moves bytes: it picks HTTP or HTTPS from the descriptor, returns the
//! response head as soon as it arrives and leaves the body as an unread
//! stream. Status classification, timeouts and body handling stay in the
//! facade, so a scripted transport exercises exactly the same logic as the
//! real one.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::redirect::Policy;

use crate::error::FetchError;
use crate::http::{HttpMethod, RequestBody, RequestDescriptor, ResponseHead, TransportResponse};

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `request` and return once the response head is available.
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse, FetchError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse, FetchError> {
        (**self).send(request).await
    }
}

/// Transport backed by reqwest with rustls.
///
/// Redirects are not followed; 3xx responses reach the caller as they are.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, FetchError> {
        let inner = reqwest::Client::builder()
            .redirect(Policy::none())
            .build()?;
        Ok(Self { inner })
    }

    /// Wrap an already configured reqwest client.
    pub fn from_reqwest(client: reqwest::Client) -> Self {
        Self { inner: client }
    }
}

fn reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse, FetchError> {
        let url = request.url();
        let mut builder = self.inner.request(reqwest_method(request.method), &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Bytes(bytes) => builder.body(bytes),
            RequestBody::Stream(stream) => builder.body(reqwest::Body::wrap_stream(stream)),
        };

        let response = builder.send().await?;

        let mut head = ResponseHead::new(response.status().as_u16());
        for (name, value) in response.headers() {
            match value.to_str() {
                Ok(value) => head.append_header(name.as_str(), value),
                Err(_) => tracing::debug!(header = %name, "skipping non-ASCII response header"),
            }
        }

        let body = response.bytes_stream().map_err(FetchError::from);
        Ok(TransportResponse {
            head,
            body: Box::pin(body),
        })
    }
}
