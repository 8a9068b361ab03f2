//! Asynchronous HTTP convenience client.
//!
//! # Overview
//! `Client` wraps an injected `Transport` and offers the handful of calls an
//! API integration usually needs: JSON objects in and out, raw text, file
//! downloads appended to disk, and multipart file uploads. Every call is one
//! request/response round-trip. Nothing is retried or cached.
//!
//! # Design
//! - All operations go through `Client::fetch`, which forces
//!   `Connection: Close`, arms the idle timeout and classifies statuses.
//! - The HTTP stack sits behind the `Transport` trait. `ReqwestTransport` is
//!   the default; tests substitute scripted transports.
//! - Response bodies are streamed. Callers get them buffered as text or JSON,
//!   chunk by chunk, or piped into a `Sink`.
//! - Every operation is a single future resolving to one `Result`.
//!
//! ```no_run
//! use courier_core::{Client, FetchOptions};
//! use serde_json::Value;
//!
//! # async fn example() -> Result<(), courier_core::FetchError> {
//! let client = Client::new()?;
//! let fetched = client
//!     .fetch_object::<Value>("https://api.example.com/items/1", FetchOptions::new())
//!     .await?;
//! println!("{:?} ({})", fetched.value, fetched.response.status);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod http;
mod idle;
pub mod multipart;
pub mod options;
pub mod sink;
pub mod transport;
pub mod uri;

pub use client::{BodyTarget, Client};
pub use config::ClientConfig;
pub use error::FetchError;
pub use http::{
    Fetched, HttpMethod, Protocol, RequestBody, RequestDescriptor, ResponseHead, TransportResponse,
};
pub use options::{FetchOptions, FileFetchOptions, HeaderForwarding, UploadOptions};
pub use sink::{BufferSink, FileSink, Sink};
pub use transport::{ReqwestTransport, Transport};
pub use uri::Target;
