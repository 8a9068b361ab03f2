//! URI parsing into the pieces a request descriptor needs.

use url::Url;

use crate::error::FetchError;
use crate::http::Protocol;

/// Protocol, host, optional port and path (query included) of a URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub protocol: Protocol,
    pub host: String,
    /// Only set when the URI names a non-default port.
    pub port: Option<u16>,
    pub path: String,
}

impl Target {
    pub fn parse(uri: &str) -> Result<Self, FetchError> {
        let parsed = Url::parse(uri)?;
        let protocol = match parsed.scheme() {
            "http" => Protocol::Http,
            "https" => Protocol::Https,
            other => {
                return Err(FetchError::InvalidUri(format!(
                    "unsupported scheme `{other}` in {uri}"
                )))
            }
        };
        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| FetchError::InvalidUri(format!("missing host in {uri}")))?
            .to_string();

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        Ok(Self {
            protocol,
            host,
            port: parsed.port(),
            path,
        })
    }
}
