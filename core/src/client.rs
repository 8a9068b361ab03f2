//! The HTTP client facade.
//!
//! # Design
//! Every operation funnels into `Client::fetch`, which owns the behaviour
//! shared by all calls: `Connection: Close`, dropping an empty cookie, the
//! idle timeout, piping or chunk forwarding, and status classification. The
//! higher-level operations only differ in how they build the descriptor and
//! what they do with the body afterwards.
//!
//! Each operation is a single future that resolves to one `Result`, so a
//! call can never complete twice.

use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::http::{
    accepts_status, ByteStream, Fetched, HttpMethod, Protocol, RequestBody, RequestDescriptor,
    ResponseHead, TransportResponse,
};
use crate::idle::IdleTimer;
use crate::multipart::{self, Boundary};
use crate::options::{FetchOptions, FileFetchOptions, HeaderForwarding, UploadOptions};
use crate::sink::{forward_headers, FileSink, Sink};
use crate::transport::{ReqwestTransport, Transport};
use crate::uri::Target;

/// Where `Client::fetch` delivers the response body.
pub enum BodyTarget<'a> {
    /// Stream the body into a sink, forwarding headers if it accepts them.
    Pipe {
        sink: &'a mut dyn Sink,
        forwarding: HeaderForwarding,
    },
    /// Hand every chunk to a callback as it arrives.
    Chunks(&'a mut (dyn FnMut(Bytes) + Send)),
    /// Read and drop the body.
    Discard,
}

/// HTTP convenience client over an injected `Transport`.
#[derive(Debug, Clone)]
pub struct Client<T = ReqwestTransport> {
    transport: T,
    config: ClientConfig,
}

impl Client<ReqwestTransport> {
    /// Client over reqwest, configured from the environment.
    pub fn new() -> Result<Self, FetchError> {
        Ok(Self::with_config(ReqwestTransport::new()?, ClientConfig::from_env()))
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    pub fn with_config(transport: T, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// POST, then decode the response like `fetch_object`.
    pub async fn create_object<R: DeserializeOwned>(
        &self,
        uri: &str,
        options: FetchOptions,
    ) -> Result<Fetched<Option<R>>, FetchError> {
        self.object(uri, options, HttpMethod::Post).await
    }

    /// PUT, then decode the response like `fetch_object`.
    pub async fn update_object<R: DeserializeOwned>(
        &self,
        uri: &str,
        options: FetchOptions,
    ) -> Result<Fetched<Option<R>>, FetchError> {
        self.object(uri, options, HttpMethod::Put).await
    }

    /// GET and decode the body as JSON.
    ///
    /// An empty body yields `None` rather than a decode error. On failure the
    /// text read so far is attached to the error.
    pub async fn fetch_object<R: DeserializeOwned>(
        &self,
        uri: &str,
        options: FetchOptions,
    ) -> Result<Fetched<Option<R>>, FetchError> {
        self.object(uri, options, HttpMethod::Get).await
    }

    /// GET and return the body as text.
    pub async fn fetch_text(
        &self,
        uri: &str,
        options: FetchOptions,
    ) -> Result<Fetched<String>, FetchError> {
        let (request, _) = self.prepare(uri, options, HttpMethod::Get)?;
        self.collect_text(request).await
    }

    /// Request `uri` and stream the response body into `sink`.
    pub async fn pipe_to(
        &self,
        uri: &str,
        options: FetchOptions,
        sink: &mut dyn Sink,
    ) -> Result<ResponseHead, FetchError> {
        let (request, forwarding) = self.prepare(uri, options, HttpMethod::Get)?;
        self.fetch(request, BodyTarget::Pipe { sink, forwarding })
            .await
    }

    /// Download `options.url`, appending the body to `options.destination`.
    ///
    /// Resolves only after the file is flushed, and after yielding once to
    /// the scheduler so the caller's continuation is not run as part of the
    /// response completion.
    pub async fn fetch_file(&self, options: FileFetchOptions) -> Result<(), FetchError> {
        let target = Target::parse(&options.url)?;
        let mut request = RequestDescriptor::new(target, HttpMethod::Get);
        request.timeout = self.config.idle_timeout;
        for (name, value) in options.headers {
            request.set_header(name, value);
        }

        let mut sink = FileSink::append(&options.destination).await?;
        let result = self
            .fetch(
                request,
                BodyTarget::Pipe {
                    sink: &mut sink,
                    forwarding: HeaderForwarding::default(),
                },
            )
            .await;
        drop(sink);
        result?;

        tokio::task::yield_now().await;
        Ok(())
    }

    /// Upload a local file as `multipart/form-data` and return the response text.
    ///
    /// Always sent as an HTTPS POST, whatever the URL's scheme says.
    pub async fn upload_file(&self, options: UploadOptions) -> Result<String, FetchError> {
        let mut target = Target::parse(&options.url)?;
        target.protocol = Protocol::Https;

        let file = tokio::fs::File::open(&options.tmp_filename).await?;
        let boundary = Boundary::random();
        let mut preamble = multipart::form_fields(&boundary, &options.form);
        preamble.push_str(&multipart::file_part_header(
            &boundary,
            &options.content_type,
            &options.orig_filename,
        ));

        let mut request = RequestDescriptor::new(target, HttpMethod::Post);
        request.timeout = self.config.idle_timeout;
        if let Some(cookie) = options.cookie {
            request.set_header("cookie", cookie);
        }
        request.set_header("Content-Type", multipart::content_type(&boundary));
        request.body = RequestBody::Stream(multipart::body_stream(preamble, file, &boundary));

        let fetched = self.collect_text(request).await?;
        Ok(fetched.value)
    }

    /// DELETE `uri`. Resolves `true` for a 2xx status and `false` for any
    /// other status; only URI and transport failures are errors.
    pub async fn delete_object(&self, uri: &str, options: FetchOptions) -> Result<bool, FetchError> {
        let (request, _) = self.prepare(uri, options, HttpMethod::Delete)?;
        match self.fetch(request, BodyTarget::Discard).await {
            Ok(head) => Ok(head.is_success()),
            Err(FetchError::Status { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Send one request and deliver its body to `target`.
    ///
    /// Resolves with the response head once the body has been fully
    /// delivered. A status >= 400 outside `status_ok` is a
    /// `FetchError::Status`, reported after the body was delivered.
    pub async fn fetch(
        &self,
        mut request: RequestDescriptor,
        target: BodyTarget<'_>,
    ) -> Result<ResponseHead, FetchError> {
        request.set_header("Connection", "Close");
        if request.header("cookie").is_some_and(str::is_empty) {
            request.remove_header("cookie");
        }

        let idle = request.timeout;
        let status_ok = std::mem::take(&mut request.status_ok);
        let method = request.method;
        let url = request.url();
        debug!(%method, %url, "sending request");

        // Upload progress counts as activity while the transport is sending.
        let timer = IdleTimer::new(idle);
        request.body = match request.body {
            RequestBody::Stream(body) => RequestBody::Stream(timer.watch_body(body)),
            other => other,
        };

        let TransportResponse { head, mut body } =
            match timer.run(self.transport.send(request)).await {
                Some(response) => response?,
                None => {
                    warn!(%method, %url, ?idle, "request timed out waiting for response");
                    return Err(FetchError::timeout(idle));
                }
            };

        let delivered = deliver(&head, &mut body, target, idle).await;
        if let Err(err) = delivered {
            if matches!(err, FetchError::Timeout { .. }) {
                warn!(%method, %url, ?idle, "request timed out reading body");
            }
            return Err(err);
        }

        if !accepts_status(&status_ok, head.status) {
            warn!(%method, %url, status = head.status, "request returned bad status");
            return Err(FetchError::Status {
                status: head.status,
                head,
                body: String::new(),
            });
        }
        Ok(head)
    }

    fn prepare(
        &self,
        uri: &str,
        options: FetchOptions,
        default_method: HttpMethod,
    ) -> Result<(RequestDescriptor, HeaderForwarding), FetchError> {
        let target = Target::parse(uri)?;
        Ok(options.into_request(target, default_method, self.config.idle_timeout))
    }

    async fn object<R: DeserializeOwned>(
        &self,
        uri: &str,
        options: FetchOptions,
        default_method: HttpMethod,
    ) -> Result<Fetched<Option<R>>, FetchError> {
        let (request, _) = self.prepare(uri, options, default_method)?;
        let fetched = self.collect_text(request).await?;
        decode_object(fetched)
    }

    async fn collect_text(&self, request: RequestDescriptor) -> Result<Fetched<String>, FetchError> {
        let mut data = Vec::new();
        let result = {
            let mut collect = |chunk: Bytes| data.extend_from_slice(&chunk);
            self.fetch(request, BodyTarget::Chunks(&mut collect)).await
        };
        let text = String::from_utf8_lossy(&data).into_owned();
        match result {
            Ok(response) => Ok(Fetched {
                value: text,
                response,
            }),
            Err(err) => Err(err.with_partial_body(text)),
        }
    }
}

async fn deliver(
    head: &ResponseHead,
    body: &mut ByteStream,
    target: BodyTarget<'_>,
    idle: Duration,
) -> Result<(), FetchError> {
    match target {
        BodyTarget::Pipe { sink, forwarding } => {
            forward_headers(&mut *sink, head, &forwarding);
            while let Some(chunk) = next_chunk(body, idle).await? {
                sink.write_chunk(&chunk).await?;
            }
            sink.finish().await?;
        }
        BodyTarget::Chunks(handler) => {
            while let Some(chunk) = next_chunk(body, idle).await? {
                handler(chunk);
            }
        }
        BodyTarget::Discard => while next_chunk(body, idle).await?.is_some() {},
    }
    Ok(())
}

async fn next_chunk(body: &mut ByteStream, idle: Duration) -> Result<Option<Bytes>, FetchError> {
    match timeout(idle, body.next()).await {
        Ok(Some(chunk)) => chunk.map(Some),
        Ok(None) => Ok(None),
        Err(_) => Err(FetchError::timeout(idle)),
    }
}

fn decode_object<R: DeserializeOwned>(
    fetched: Fetched<String>,
) -> Result<Fetched<Option<R>>, FetchError> {
    let Fetched { value, response } = fetched;
    if value.is_empty() {
        return Ok(Fetched {
            value: None,
            response,
        });
    }
    match serde_json::from_str(&value) {
        Ok(decoded) => Ok(Fetched {
            value: Some(decoded),
            response,
        }),
        Err(err) => Err(FetchError::Decode {
            message: err.to_string(),
            body: value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, VecDeque};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use futures::{stream, TryStreamExt};
    use serde_json::{json, Value};

    use super::*;
    use crate::sink::BufferSink;

    /// What the scripted transport does for one request.
    enum Reply {
        Respond {
            status: u16,
            headers: Vec<(&'static str, &'static str)>,
            chunks: Vec<&'static str>,
        },
        Fail(&'static str),
        /// Never produce a response head.
        Hang,
        /// Produce a head and one chunk, then never finish the body.
        Stall { status: u16, first: &'static str },
        /// Produce one chunk, then fail the body stream.
        Reset { first: &'static str },
    }

    fn ok(body: &'static str) -> Reply {
        Reply::Respond {
            status: 200,
            headers: Vec::new(),
            chunks: vec![body],
        }
    }

    fn status(status: u16, body: &'static str) -> Reply {
        Reply::Respond {
            status,
            headers: Vec::new(),
            chunks: vec![body],
        }
    }

    #[derive(Debug, Clone)]
    struct Recorded {
        method: HttpMethod,
        url: String,
        headers: BTreeMap<String, String>,
        body: Vec<u8>,
    }

    struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        requests: Mutex<Vec<Recorded>>,
    }

    impl ScriptedTransport {
        fn new(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<Recorded> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse, FetchError> {
            let url = request.url();
            let body = match request.body {
                RequestBody::Empty => Vec::new(),
                RequestBody::Bytes(bytes) => bytes.to_vec(),
                RequestBody::Stream(stream) => {
                    let chunks: Vec<Bytes> = stream.try_collect().await?;
                    chunks.concat()
                }
            };
            self.requests.lock().unwrap().push(Recorded {
                method: request.method,
                url,
                headers: request.headers,
                body,
            });

            let reply = self.replies.lock().unwrap().pop_front();
            match reply.expect("no scripted reply left") {
                Reply::Respond {
                    status,
                    headers,
                    chunks,
                } => {
                    let mut head = ResponseHead::new(status);
                    for (name, value) in headers {
                        head.append_header(name, value);
                    }
                    let body = stream::iter(
                        chunks
                            .into_iter()
                            .map(|chunk| Ok::<_, FetchError>(Bytes::from_static(chunk.as_bytes()))),
                    );
                    Ok(TransportResponse {
                        head,
                        body: Box::pin(body),
                    })
                }
                Reply::Fail(message) => Err(FetchError::transport(message)),
                Reply::Hang => futures::future::pending().await,
                Reply::Stall { status, first } => {
                    let body = stream::once(async move { Ok::<_, FetchError>(Bytes::from_static(first.as_bytes())) })
                        .chain(stream::pending());
                    Ok(TransportResponse {
                        head: ResponseHead::new(status),
                        body: Box::pin(body),
                    })
                }
                Reply::Reset { first } => {
                    let body = stream::iter(vec![
                        Ok(Bytes::from_static(first.as_bytes())),
                        Err(FetchError::transport("connection reset")),
                    ]);
                    Ok(TransportResponse {
                        head: ResponseHead::new(200),
                        body: Box::pin(body),
                    })
                }
            }
        }
    }

    fn client(replies: Vec<Reply>) -> (Client<Arc<ScriptedTransport>>, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new(replies);
        (Client::with_transport(transport.clone()), transport)
    }

    const URI: &str = "http://api.test:8080/object";

    // --- fetch_object ---

    #[tokio::test]
    async fn fetch_object_decodes_json() {
        let (client, transport) = client(vec![ok(r#"{"a":1}"#)]);
        let fetched = client
            .fetch_object::<Value>(URI, FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(fetched.value, Some(json!({ "a": 1 })));
        assert_eq!(fetched.response.status, 200);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, HttpMethod::Get);
        assert_eq!(sent.url, URI);
    }

    #[tokio::test]
    async fn fetch_object_joins_chunks_before_decoding() {
        let (client, _) = client(vec![Reply::Respond {
            status: 200,
            headers: Vec::new(),
            chunks: vec![r#"{"name":"#, r#""split"}"#],
        }]);
        let fetched = client
            .fetch_object::<Value>(URI, FetchOptions::new())
            .await
            .unwrap();
        assert_eq!(fetched.value, Some(json!({ "name": "split" })));
    }

    #[tokio::test]
    async fn empty_body_yields_none() {
        let (client, _) = client(vec![ok("")]);
        let fetched = client
            .fetch_object::<Value>(URI, FetchOptions::new())
            .await
            .unwrap();
        assert!(fetched.value.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_error() {
        let (client, _) = client(vec![ok(r#"{"a":"#)]);
        let err = client
            .fetch_object::<Value>(URI, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(&err, FetchError::Decode { body, .. } if body == r#"{"a":"#));
    }

    #[tokio::test]
    async fn bad_status_carries_partial_body() {
        let (client, _) = client(vec![status(404, "no such object")]);
        let err = client
            .fetch_object::<Value>(URI, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 404, .. }));
        assert_eq!(err.partial_body(), Some("no such object"));
    }

    #[tokio::test]
    async fn whitelisted_status_succeeds_with_body() {
        let (client, _) = client(vec![status(404, r#"{"a":1}"#)]);
        let fetched = client
            .fetch_object::<Value>(URI, FetchOptions::new().status_ok(404))
            .await
            .unwrap();
        assert_eq!(fetched.value, Some(json!({ "a": 1 })));
        assert_eq!(fetched.response.status, 404);
    }

    #[tokio::test]
    async fn invalid_uri_never_reaches_transport() {
        let (client, transport) = client(Vec::new());
        let err = client
            .fetch_object::<Value>("not a uri", FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidUri(_)));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_propagates() {
        let (client, _) = client(vec![Reply::Fail("connection refused")]);
        let err = client
            .fetch_text(URI, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(&err, FetchError::Transport { message, .. } if message == "connection refused"));
        assert!(err.partial_body().is_none());
    }

    #[tokio::test]
    async fn body_failure_keeps_text_read_so_far() {
        let (client, _) = client(vec![Reply::Reset { first: "{\"items\":[1," }]);
        let err = client
            .fetch_object::<Value>(URI, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(&err, FetchError::Transport { message, .. } if message == "connection reset"));
        assert_eq!(err.partial_body(), Some("{\"items\":[1,"));
    }

    // --- create / update ---

    #[tokio::test]
    async fn create_and_update_use_post_and_put() {
        let (client, transport) = client(vec![status(201, r#"{"id":7}"#), ok(r#"{"id":7}"#)]);
        let body = json!({ "title": "draft" });

        let created = client
            .create_object::<Value>(URI, FetchOptions::new().json_body(&body).unwrap())
            .await
            .unwrap();
        assert_eq!(created.value, Some(json!({ "id": 7 })));
        client
            .update_object::<Value>(URI, FetchOptions::new().json_body(&body).unwrap())
            .await
            .unwrap();

        let sent = transport.requests();
        assert_eq!(sent[0].method, HttpMethod::Post);
        assert_eq!(sent[1].method, HttpMethod::Put);
        assert_eq!(sent[0].body, br#"{"title":"draft"}"#);
        assert_eq!(
            sent[0].headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn caller_method_overrides_operation_default() {
        let (client, transport) = client(vec![ok("")]);
        client
            .create_object::<Value>(URI, FetchOptions::new().method(HttpMethod::Put))
            .await
            .unwrap();
        assert_eq!(transport.requests()[0].method, HttpMethod::Put);
    }

    // --- fetch primitive ---

    #[tokio::test]
    async fn connection_close_is_forced_and_empty_cookie_dropped() {
        let (client, transport) = client(vec![ok("")]);
        client
            .fetch_text(
                URI,
                FetchOptions::new()
                    .header("connection", "keep-alive")
                    .header("cookie", ""),
            )
            .await
            .unwrap();

        let headers = &transport.requests()[0].headers;
        assert_eq!(headers.get("Connection").map(String::as_str), Some("Close"));
        assert!(!headers.contains_key("connection"));
        assert!(!headers.contains_key("cookie"));
    }

    #[tokio::test]
    async fn non_empty_cookie_is_kept() {
        let (client, transport) = client(vec![ok("")]);
        client
            .fetch_text(URI, FetchOptions::new().header("cookie", "sid=1"))
            .await
            .unwrap();
        assert_eq!(
            transport.requests()[0].headers.get("cookie").map(String::as_str),
            Some("sid=1")
        );
    }

    #[tokio::test]
    async fn chunks_are_forwarded_in_order() {
        let (client, _) = client(vec![Reply::Respond {
            status: 200,
            headers: Vec::new(),
            chunks: vec!["one", "two", "three"],
        }]);
        let request = RequestDescriptor::new(Target::parse(URI).unwrap(), HttpMethod::Get);
        let mut seen = Vec::new();
        let mut handler = |chunk: Bytes| seen.push(chunk);
        client
            .fetch(request, BodyTarget::Chunks(&mut handler))
            .await
            .unwrap();
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn pipe_forwards_headers_and_body() {
        let (client, _) = client(vec![Reply::Respond {
            status: 200,
            headers: vec![("content-type", "image/png"), ("etag", "\"v1\"")],
            chunks: vec!["PNG", "DATA"],
        }]);
        let mut sink = BufferSink::new();
        let head = client
            .pipe_to(
                URI,
                FetchOptions::new()
                    .full_headers(true)
                    .header_override("Cache-Control", "no-store"),
                &mut sink,
            )
            .await
            .unwrap();

        assert_eq!(head.status, 200);
        assert_eq!(sink.body(), b"PNGDATA");
        assert!(sink.is_finished());
        assert_eq!(sink.header("etag"), Some("\"v1\""));
        assert_eq!(sink.header("cache-control"), Some("no-store"));
        assert_eq!(sink.header("content-type"), Some("image/png"));
    }

    #[tokio::test]
    async fn pipe_reports_bad_status_after_delivery() {
        let (client, _) = client(vec![status(502, "upstream down")]);
        let mut sink = BufferSink::new();
        let err = client
            .pipe_to(URI, FetchOptions::new(), &mut sink)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 502, .. }));
        assert_eq!(sink.body(), b"upstream down");
    }

    #[tokio::test]
    async fn redirects_are_not_errors() {
        let (client, _) = client(vec![Reply::Respond {
            status: 302,
            headers: vec![("location", "/elsewhere")],
            chunks: Vec::new(),
        }]);
        let fetched = client.fetch_text(URI, FetchOptions::new()).await.unwrap();
        assert_eq!(fetched.response.status, 302);
        assert_eq!(fetched.response.header("Location"), Some("/elsewhere"));
    }

    // --- timeouts ---

    #[tokio::test]
    async fn hung_request_times_out_with_call_timeout() {
        let (client, _) = client(vec![Reply::Hang]);
        let err = client
            .fetch_text(URI, FetchOptions::new().timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { after, .. } if after == Duration::from_millis(50)));
    }

    #[tokio::test(start_paused = true)]
    async fn default_timeout_is_ten_seconds() {
        let (client, _) = client(vec![Reply::Hang]);
        let err = client
            .fetch_text(URI, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { after, .. } if after == Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn stalled_body_times_out() {
        let (client, _) = client(vec![Reply::Stall {
            status: 200,
            first: "{\"partial\":",
        }]);
        let err = client
            .fetch_object::<Value>(URI, FetchOptions::new().timeout(Duration::from_millis(50)))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { .. }));
        assert_eq!(err.partial_body(), Some("{\"partial\":"));
    }

    #[tokio::test]
    async fn zero_timeout_falls_back_to_default() {
        let transport = ScriptedTransport::new(vec![Reply::Hang]);
        let client = Client::with_config(
            transport,
            ClientConfig::default().with_idle_timeout(Duration::from_millis(40)),
        );
        let err = client
            .fetch_text(URI, FetchOptions::new().timeout(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { after, .. } if after == Duration::from_millis(40)));
    }

    #[tokio::test]
    async fn config_timeout_applies_when_call_has_none() {
        let transport = ScriptedTransport::new(vec![Reply::Hang]);
        let client = Client::with_config(
            transport,
            ClientConfig::default().with_idle_timeout(Duration::from_millis(30)),
        );
        let err = client
            .fetch_text(URI, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Timeout { after, .. } if after == Duration::from_millis(30)));
    }

    /// Consumes the request body one chunk at a time with a pause between
    /// reads, optionally giving up after a number of chunks.
    struct SlowReader {
        pause: Duration,
        read_limit: Option<usize>,
        received: Mutex<usize>,
    }

    impl SlowReader {
        fn new(pause: Duration, read_limit: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                pause,
                read_limit,
                received: Mutex::new(0),
            })
        }

        fn received(&self) -> usize {
            *self.received.lock().unwrap()
        }
    }

    #[async_trait]
    impl Transport for SlowReader {
        async fn send(&self, request: RequestDescriptor) -> Result<TransportResponse, FetchError> {
            if let RequestBody::Stream(mut body) = request.body {
                let mut reads = 0;
                while let Some(chunk) = body.next().await {
                    *self.received.lock().unwrap() += chunk?.len();
                    reads += 1;
                    if self.read_limit.is_some_and(|limit| reads >= limit) {
                        futures::future::pending::<()>().await;
                    }
                    tokio::time::sleep(self.pause).await;
                }
            }
            Ok(TransportResponse {
                head: ResponseHead::new(200),
                body: Box::pin(stream::iter(vec![Ok::<_, FetchError>(Bytes::from_static(b"stored"))])),
            })
        }
    }

    fn chunked_body(chunks: usize, size: usize) -> RequestBody {
        let body: crate::http::BodyStream = Box::pin(stream::iter(
            (0..chunks).map(move |_| Ok::<_, std::io::Error>(Bytes::from(vec![b'x'; size]))),
        ));
        RequestBody::Stream(body)
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_upload_outlasting_idle_timeout_succeeds() {
        let transport = SlowReader::new(Duration::from_millis(30), None);
        let client = Client::with_transport(transport.clone());
        let mut request = RequestDescriptor::new(Target::parse(URI).unwrap(), HttpMethod::Post);
        request.timeout = Duration::from_millis(100);
        request.body = chunked_body(16, 4096);

        let started = tokio::time::Instant::now();
        let head = client.fetch(request, BodyTarget::Discard).await.unwrap();
        assert_eq!(head.status, 200);
        assert_eq!(transport.received(), 64 * 1024);
        assert!(started.elapsed() > Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn upload_that_stops_moving_times_out() {
        let transport = SlowReader::new(Duration::from_millis(30), Some(2));
        let client = Client::with_transport(transport.clone());
        let mut request = RequestDescriptor::new(Target::parse(URI).unwrap(), HttpMethod::Post);
        request.timeout = Duration::from_millis(100);
        request.body = chunked_body(16, 4096);

        let err = client.fetch(request, BodyTarget::Discard).await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout { after, .. } if after == Duration::from_millis(100)));
        assert_eq!(transport.received(), 2 * 4096);
    }

    #[tokio::test]
    async fn slow_file_upload_is_not_cut_off() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("large.tmp");
        tokio::fs::write(&path, vec![7u8; 64 * 1024]).await.unwrap();

        let transport = SlowReader::new(Duration::from_millis(30), None);
        let client = Client::with_config(
            transport.clone(),
            ClientConfig::default().with_idle_timeout(Duration::from_millis(100)),
        );
        let text = client
            .upload_file(UploadOptions::new("https://media.test/upload", &path, "large.bin", "application/octet-stream"))
            .await
            .unwrap();
        assert_eq!(text, "stored");
        assert!(transport.received() > 64 * 1024);
    }

    // --- delete ---

    #[tokio::test]
    async fn delete_maps_status_to_bool() {
        let (client, transport) = client(vec![status(204, ""), status(500, "boom")]);
        assert!(client.delete_object(URI, FetchOptions::new()).await.unwrap());
        assert!(!client.delete_object(URI, FetchOptions::new()).await.unwrap());
        assert!(transport
            .requests()
            .iter()
            .all(|r| r.method == HttpMethod::Delete));
    }

    #[tokio::test]
    async fn delete_treats_redirect_as_failure() {
        let (client, _) = client(vec![status(301, "")]);
        assert!(!client.delete_object(URI, FetchOptions::new()).await.unwrap());
    }

    #[tokio::test]
    async fn delete_surfaces_transport_errors() {
        let (client, _) = client(vec![Reply::Fail("reset")]);
        let err = client
            .delete_object(URI, FetchOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }

    // --- files ---

    #[tokio::test]
    async fn fetch_file_appends_to_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download.bin");
        tokio::fs::write(&path, b"existing|").await.unwrap();

        let (client, transport) = client(vec![Reply::Respond {
            status: 200,
            headers: Vec::new(),
            chunks: vec!["new ", "bytes"],
        }]);
        client
            .fetch_file(FileFetchOptions::new(URI, &path).header("Authorization", "Bearer t"))
            .await
            .unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"existing|new bytes");
        let sent = &transport.requests()[0];
        assert_eq!(sent.method, HttpMethod::Get);
        assert_eq!(
            sent.headers.get("Authorization").map(String::as_str),
            Some("Bearer t")
        );
    }

    #[tokio::test]
    async fn fetch_file_reports_bad_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download.bin");
        let (client, _) = client(vec![status(403, "denied")]);
        let err = client
            .fetch_file(FileFetchOptions::new(URI, &path))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 403, .. }));
    }

    #[tokio::test]
    async fn upload_sends_multipart_over_https() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.tmp");
        tokio::fs::write(&path, b"\x89PNG-bytes").await.unwrap();

        let (client, transport) = client(vec![ok(r#"{"uploaded":true}"#)]);
        let text = client
            .upload_file(
                UploadOptions::new("http://media.test/upload", &path, "cat.png", "image/png")
                    .field("album", "7")
                    .cookie("sid=abc"),
            )
            .await
            .unwrap();
        assert_eq!(text, r#"{"uploaded":true}"#);

        let sent = &transport.requests()[0];
        assert_eq!(sent.method, HttpMethod::Post);
        assert_eq!(sent.url, "https://media.test/upload");
        assert_eq!(sent.headers.get("cookie").map(String::as_str), Some("sid=abc"));

        let content_type = sent.headers.get("Content-Type").unwrap();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=\"")
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap();
        let mut expected = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"album\"\r\n\r\n7\r\n\
             --{boundary}\r\nContent-Type: image/png\r\n\
             Content-Disposition: form-data; name=\"upload_filenames[0]\"; filename=\"cat.png\"\r\n\
             Content-Transfer-Encoding: binary\r\n\r\n"
        )
        .into_bytes();
        expected.extend_from_slice(b"\x89PNG-bytes");
        expected.extend_from_slice(format!("\r\n--{boundary}--").as_bytes());
        assert_eq!(sent.body, expected);
    }

    #[tokio::test]
    async fn upload_drops_empty_cookie() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.tmp");
        tokio::fs::write(&path, b"x").await.unwrap();

        let (client, transport) = client(vec![ok("ok")]);
        client
            .upload_file(UploadOptions::new("https://media.test/upload", &path, "f", "text/plain").cookie(""))
            .await
            .unwrap();
        assert!(!transport.requests()[0].headers.contains_key("cookie"));
    }

    #[tokio::test]
    async fn upload_of_missing_file_is_io_error() {
        let (client, transport) = client(Vec::new());
        let err = client
            .upload_file(UploadOptions::new(
                "https://media.test/upload",
                "/definitely/not/here",
                "f",
                "text/plain",
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io(_)));
        assert!(transport.requests().is_empty());
    }
}
