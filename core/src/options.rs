//! Per-call options for the facade operations.
//!
//! # Design
//! `FetchOptions` carries caller overrides. They are merged last, on top of
//! what the URI and the operation imply, so a caller can still change the
//! method of `create_object` or point a request at a different timeout.
//! The file and upload operations take their own option structs since
//! their inputs do not overlap with a plain fetch.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::error::FetchError;
use crate::http::{HttpMethod, RequestBody, RequestDescriptor};
use crate::uri::Target;

/// Overrides for a single fetch-style call.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Option<HttpMethod>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
    pub status_ok: BTreeSet<u16>,
    /// Copy every response header onto a header-capable sink.
    pub full_headers: bool,
    /// Headers forced onto a header-capable sink, winning over response headers.
    pub headers_override: BTreeMap<String, String>,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the body and mark it as JSON.
    pub fn json_body<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, FetchError> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header("Content-Type", "application/json")
            .body(body))
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn status_ok(mut self, status: u16) -> Self {
        self.status_ok.insert(status);
        self
    }

    pub fn full_headers(mut self, full_headers: bool) -> Self {
        self.full_headers = full_headers;
        self
    }

    pub fn header_override(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers_override.insert(name.into(), value.into());
        self
    }

    /// Build the descriptor for `target`, applying these overrides on top of
    /// the operation's defaults.
    pub(crate) fn into_request(
        self,
        target: Target,
        default_method: HttpMethod,
        default_timeout: Duration,
    ) -> (RequestDescriptor, HeaderForwarding) {
        let mut request = RequestDescriptor::new(target, self.method.unwrap_or(default_method));
        // Zero means "not set", as in the other timeout sources.
        request.timeout = self
            .timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(default_timeout);
        for (name, value) in self.headers {
            request.set_header(name, value);
        }
        if let Some(body) = self.body {
            request.body = RequestBody::Bytes(body);
        }
        request.status_ok = self.status_ok;

        let forwarding = HeaderForwarding {
            full_headers: self.full_headers,
            overrides: self.headers_override,
        };
        (request, forwarding)
    }
}

/// How response headers are copied onto a header-capable sink.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderForwarding {
    pub full_headers: bool,
    pub overrides: BTreeMap<String, String>,
}

impl HeaderForwarding {
    pub(crate) fn is_overridden(&self, name: &str) -> bool {
        self.overrides
            .keys()
            .any(|key| key.eq_ignore_ascii_case(name))
    }
}

/// Inputs for `Client::fetch_file`.
#[derive(Debug, Clone)]
pub struct FileFetchOptions {
    pub url: String,
    /// Opened in append mode and created when missing.
    pub destination: PathBuf,
    pub headers: BTreeMap<String, String>,
}

impl FileFetchOptions {
    pub fn new(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            destination: destination.into(),
            headers: BTreeMap::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Inputs for `Client::upload_file`.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub url: String,
    /// Local file whose bytes become the file part.
    pub tmp_filename: PathBuf,
    /// Filename reported in the part's `Content-Disposition`.
    pub orig_filename: String,
    pub content_type: String,
    /// Extra form fields, written before the file part in this order.
    pub form: Vec<(String, String)>,
    pub cookie: Option<String>,
}

impl UploadOptions {
    pub fn new(
        url: impl Into<String>,
        tmp_filename: impl Into<PathBuf>,
        orig_filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            tmp_filename: tmp_filename.into(),
            orig_filename: orig_filename.into(),
            content_type: content_type.into(),
            form: Vec::new(),
            cookie: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}
