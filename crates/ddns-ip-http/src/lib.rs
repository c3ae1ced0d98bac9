// # HTTP IP Source
//
// This crate provides HTTP(S) "what is my IP" sources for the DDNS
// consensus resolver.
//
// ## Purpose
//
// Each source asks one external service for our public address. None of
// them is trusted on its own; the resolver weighs their answers against
// each other.
//
// ## Trust
//
// The transport is derived from the URL scheme. HTTPS services are harder
// to spoof on-path and get a higher weight in the default voter set (see
// [`weight_for`]).
//
// ## Response formats
//
// - [`ResponseFormat::PlainText`]: the whole body is the address
//   (icanhazip.com, checkip.amazonaws.com, ...)
// - [`ResponseFormat::JsonField`]: the address is a top-level string field
//   of a JSON object (e.g. `{"ip": "203.0.113.7"}`)

use ddns_core::registry::VoterRegistry;
use ddns_core::traits::{IpSource, Transport, normalize};
use ddns_core::{Error, Result};

use serde_json::Value;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Voter weight for HTTPS services
pub const ENCRYPTED_WEIGHT: u32 = 3;

/// Voter weight for plain HTTP services
pub const PLAINTEXT_WEIGHT: u32 = 1;

/// Services queried by [`default_voters`]
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://icanhazip.com/",
    "https://myexternalip.com/raw",
    "http://ifconfig.io/ip",
    "http://checkip.amazonaws.com/",
    "http://ident.me/",
    "http://whatismyip.akamai.com/",
    "http://tnx.nl/ip",
    "http://diagnostic.opendns.com/myip",
];

/// How the address is encoded in a response body
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResponseFormat {
    /// The trimmed body is the address
    #[default]
    PlainText,
    /// The body is a JSON object holding the address in this field
    JsonField(String),
}

/// A single HTTP(S) "what is my IP" endpoint
pub struct HttpIpSource {
    /// Endpoint URL, also the source identity
    url: String,

    /// Body encoding
    format: ResponseFormat,

    /// Derived from the URL scheme
    transport: Transport,

    /// HTTP client with the request timeout applied
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpIpSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIpSource")
            .field("url", &self.url)
            .field("format", &self.format)
            .field("transport", &self.transport)
            .finish()
    }
}

impl HttpIpSource {
    /// Create a source with the default timeout
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the URL is not `http://` or `https://`, or the
    /// HTTP client cannot be built.
    pub fn new(url: impl Into<String>, format: ResponseFormat) -> Result<Self> {
        Self::with_timeout(url, format, DEFAULT_TIMEOUT)
    }

    /// Create a plain-text source with the default timeout
    pub fn plain(url: impl Into<String>) -> Result<Self> {
        Self::new(url, ResponseFormat::PlainText)
    }

    /// Create a source with a custom request timeout
    pub fn with_timeout(
        url: impl Into<String>,
        format: ResponseFormat,
        timeout: Duration,
    ) -> Result<Self> {
        let url = url.into();
        let transport = transport_for(&url)?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            format,
            transport,
            client,
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Extract the address from a response body
    fn parse_body(&self, body: &str) -> Result<IpAddr> {
        let body = body.trim();

        let parsed = match &self.format {
            ResponseFormat::PlainText => body.parse::<IpAddr>().ok(),
            ResponseFormat::JsonField(field) => serde_json::from_str::<Value>(body)
                .ok()
                .and_then(|json| {
                    json.get(field)
                        .and_then(Value::as_str)
                        .and_then(|s| s.trim().parse::<IpAddr>().ok())
                }),
        };

        parsed.ok_or_else(|| Error::malformed(&self.url, body))
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    fn id(&self) -> &str {
        &self.url
    }

    fn transport(&self) -> Transport {
        self.transport
    }

    async fn fetch(&self) -> Result<IpAddr> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::unreachable(&self.url, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::unreachable(&self.url, format!("HTTP error: {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::unreachable(&self.url, format!("Failed to read response: {}", e)))?;

        let ip = normalize(self.parse_body(&body)?);
        tracing::trace!(source = %self.url, %ip, "Fetched address");
        Ok(ip)
    }
}

/// Transport implied by a URL scheme
pub fn transport_for(url: &str) -> Result<Transport> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::config(format!("Invalid source URL {:?}: {}", url, e)))?;

    match parsed.scheme() {
        "https" => Ok(Transport::Encrypted),
        "http" => Ok(Transport::Plaintext),
        other => Err(Error::config(format!(
            "Unsupported scheme {:?} in source URL {:?}",
            other, url
        ))),
    }
}

/// Default voter weight for a transport
pub fn weight_for(transport: Transport) -> u32 {
    match transport {
        Transport::Encrypted => ENCRYPTED_WEIGHT,
        Transport::Plaintext => PLAINTEXT_WEIGHT,
    }
}

/// Registry over [`DEFAULT_ENDPOINTS`], weighted by transport
pub fn default_voters() -> Result<VoterRegistry> {
    voters_for(DEFAULT_ENDPOINTS, DEFAULT_TIMEOUT)
}

/// Registry over plain-text `urls`, weighted by transport
pub fn voters_for(urls: &[&str], timeout: Duration) -> Result<VoterRegistry> {
    let mut builder = VoterRegistry::builder();
    for url in urls {
        let source = HttpIpSource::with_timeout(*url, ResponseFormat::PlainText, timeout)?;
        let weight = weight_for(source.transport());
        builder.add_voter(Arc::new(source), weight)?;
    }
    Ok(builder.build())
}
