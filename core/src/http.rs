//! HTTP request and response types shared by the facade and its transports.
//!
//! # Design
//! A `RequestDescriptor` is plain data built per call: the facade fills it
//! from a parsed URI plus caller overrides and hands it to a `Transport`.
//! Bodies are the only non-plain part. Both request and response bodies may
//! be streams, so uploads and downloads never have to sit in memory.
//!
//! Header names are matched case-insensitively everywhere. Response header
//! names are stored lower-cased.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;

use crate::config::DEFAULT_IDLE_TIMEOUT;
use crate::error::FetchError;
use crate::uri::Target;

/// Response body chunks as delivered by a transport.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, FetchError>> + Send>>;

/// Streaming request body. `Sync` because transports such as reqwest
/// require it to wrap the stream.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport protocol selected from the URI scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

/// Request payload.
pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    Stream(BodyStream),
}

impl RequestBody {
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(bytes) => bytes.is_empty(),
            RequestBody::Stream(_) => false,
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Everything a transport needs to issue one request.
///
/// Built per call and consumed by `Transport::send`. `timeout` is an idle
/// timeout: it bounds the wait for the response head and for every body
/// chunk, not the request as a whole.
#[derive(Debug)]
pub struct RequestDescriptor {
    pub protocol: Protocol,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub body: RequestBody,
    pub timeout: Duration,
    /// Statuses >= 400 that count as success for this call.
    pub status_ok: BTreeSet<u16>,
}

impl RequestDescriptor {
    pub fn new(target: Target, method: HttpMethod) -> Self {
        Self {
            protocol: target.protocol,
            host: target.host,
            port: target.port,
            path: target.path,
            method,
            headers: BTreeMap::new(),
            body: RequestBody::Empty,
            timeout: DEFAULT_IDLE_TIMEOUT,
            status_ok: BTreeSet::new(),
        }
    }

    /// Absolute URL of the request. The port is only rendered when explicit.
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!(
                "{}://{}:{}{}",
                self.protocol.scheme(),
                self.host,
                port,
                self.path
            ),
            None => format!("{}://{}{}", self.protocol.scheme(), self.host, self.path),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any existing entry that differs only in case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove_header(&name);
        self.headers.insert(name, value.into());
    }

    pub fn remove_header(&mut self, name: &str) -> Option<String> {
        let key = self
            .headers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()?;
        self.headers.remove(&key)
    }

    /// Whether a response with `status` completes the call successfully.
    pub fn accepts_status(&self, status: u16) -> bool {
        accepts_status(&self.status_ok, status)
    }
}

pub(crate) fn accepts_status(status_ok: &BTreeSet<u16>, status: u16) -> bool {
    status < 400 || status_ok.contains(&status)
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
}

impl ResponseHead {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Record a header. Repeated names are folded into one comma-separated value.
    pub fn append_header(&mut self, name: &str, value: &str) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
}

/// A response as returned by a transport: head plus an unread body.
pub struct TransportResponse {
    pub head: ResponseHead,
    pub body: ByteStream,
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// A decoded value together with the response it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched<T> {
    pub value: T,
    pub response: ResponseHead,
}
