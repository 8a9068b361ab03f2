//! `multipart/form-data` encoding for single-file uploads.
//!
//! The body is: form fields, then the file part header, then the raw file
//! bytes, then the closing boundary. Only the file bytes are streamed; the
//! framing around them is small enough to build as strings.

use std::fmt;
use std::io;

use bytes::Bytes;
use futures::{future, stream, StreamExt};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use crate::http::BodyStream;

/// Form field name under which the file is sent.
pub const FILE_FIELD: &str = "upload_filenames[0]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary(String);

impl Boundary {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// 32 random lower-case hex characters.
    pub fn random() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Boundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of the request's `Content-Type` header.
pub fn content_type(boundary: &Boundary) -> String {
    format!("multipart/form-data; boundary=\"{boundary}\"")
}

pub fn form_fields(boundary: &Boundary, fields: &[(String, String)]) -> String {
    fields
        .iter()
        .map(|(name, value)| {
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
        })
        .collect()
}

pub fn file_part_header(boundary: &Boundary, content_type: &str, filename: &str) -> String {
    format!(
        "--{boundary}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Disposition: form-data; name=\"{FILE_FIELD}\"; filename=\"{filename}\"\r\n\
         Content-Transfer-Encoding: binary\r\n\r\n"
    )
}

pub fn closing(boundary: &Boundary) -> String {
    format!("\r\n--{boundary}--")
}

/// Full upload body: `preamble`, then the bytes of `file`, then the closing
/// boundary.
pub fn body_stream(preamble: String, file: File, boundary: &Boundary) -> BodyStream {
    let head = stream::once(future::ready(Ok::<_, io::Error>(Bytes::from(preamble))));
    let tail = stream::once(future::ready(Ok::<_, io::Error>(Bytes::from(closing(
        boundary,
    )))));
    Box::pin(head.chain(ReaderStream::new(file)).chain(tail))
}
