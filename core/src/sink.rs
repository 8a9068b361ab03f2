//! Destinations for piped response bodies.
//!
//! # Design
//! A sink receives the body chunk by chunk instead of having it buffered by
//! the facade. Some sinks (an outgoing proxy response, say) can also take
//! headers; they opt in through `accepts_headers`, and the facade only copies
//! response headers onto sinks that do.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::http::ResponseHead;
use crate::options::HeaderForwarding;

#[async_trait]
pub trait Sink: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Called once after the last chunk.
    async fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn accepts_headers(&self) -> bool {
        false
    }

    fn set_header(&mut self, _name: &str, _value: &str) {}
}

/// Copy response headers onto `sink` according to `forwarding`.
///
/// Order matters: full headers first, then `Content-Type`, then overrides,
/// so overrides always win.
pub(crate) fn forward_headers(
    sink: &mut dyn Sink,
    head: &ResponseHead,
    forwarding: &HeaderForwarding,
) {
    if !sink.accepts_headers() {
        return;
    }
    if forwarding.full_headers {
        for (name, value) in &head.headers {
            if forwarding.is_overridden(name) {
                continue;
            }
            sink.set_header(name, value);
        }
    }
    if let Some(content_type) = head.header("content-type") {
        sink.set_header("Content-Type", content_type);
    }
    for (name, value) in &forwarding.overrides {
        sink.set_header(name, value);
    }
}

/// Appends the body to a file on disk.
#[derive(Debug)]
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Open `path` for appending, creating it when missing.
    pub async fn append(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self { file })
    }
}

#[async_trait]
impl Sink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.file.write_all(chunk).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.file.flush().await
    }
}

/// Collects the body and any forwarded headers in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    body: Vec<u8>,
    headers: BTreeMap<String, String>,
    finished: bool,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[async_trait]
impl Sink for BufferSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.finished = true;
        Ok(())
    }

    fn accepts_headers(&self) -> bool {
        true
    }

    /// Replaces any existing header whose name differs only in case.
    fn set_header(&mut self, name: &str, value: &str) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.to_string());
    }
}
