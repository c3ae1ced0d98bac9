// # Cloudflare DNS Provider
//
// This crate provides the Cloudflare API v4 record reconciler for the DDNS
// system.
//
// ## Scope
//
// - One HTTP request per operation
// - Full error propagation to the engine (the poll loop owns retries)
// - HTTP timeout configured (30 seconds)
// - Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - `success: false` envelopes surface Cloudflare's own error messages
// - A records for IPv4, AAAA records for IPv6
// - Zone lookup by name, or an explicit zone ID
//
// ## Trust Level: Untrusted (DNS Provider)
//
// The provider never spawns tasks, never retries and never caches records
// beyond a single request. Deciding whether an update is needed belongs to
// `DdnsEngine`.
//
// ## Security Requirements
//
// - Credentials NEVER appear in logs or `Debug` output
// - Construction fails fast if the token is empty
//
// ## Authentication
//
// - API token: `Authorization: Bearer <token>`
// - Global API key: `X-Auth-Email` + `X-Auth-Key`, selected when an account
//   email is configured
//
// ## API Reference
//
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::traits::{DnsProvider, DnsRecord, record_type_for};
use ddns_core::{Error, Result};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

const PROVIDER: &str = "cloudflare";

/// How requests are authenticated
#[derive(Clone)]
enum Credentials {
    /// Scoped API token
    Token(String),
    /// Global API key plus account email
    Key { email: String, key: String },
}

/// Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    message: String,
}

impl<T> Envelope<T> {
    fn into_result(self, context: &str) -> Result<T> {
        if !self.success {
            let messages: Vec<String> = self
                .errors
                .iter()
                .map(|e| format!("{} (code {})", e.message, e.code))
                .collect();
            return Err(Error::provider(
                PROVIDER,
                format!("{} failed: {}", context, messages.join("; ")),
            ));
        }

        self.result.ok_or_else(|| {
            Error::provider(
                PROVIDER,
                format!("{} failed: response has no result", context),
            )
        })
    }
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

/// Body of create and update requests
#[derive(Debug, Serialize)]
struct RecordPayload<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: String,
}

impl<'a> RecordPayload<'a> {
    fn new(name: &'a str, ip: IpAddr) -> Self {
        Self {
            record_type: record_type_for(ip),
            name,
            content: ip.to_string(),
        }
    }
}

/// Cloudflare DNS provider
///
/// # Trust Level: Untrusted
///
/// This provider is isolated, stateless and single-shot. All coordination
/// (retries, scheduling) is owned by `DdnsEngine`.
///
/// # Security
///
/// The Debug implementation does NOT expose credentials.
pub struct CloudflareProvider {
    /// Token or key pair
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// Zone ID, either configured or resolved with [`CloudflareProvider::resolve_zone`]
    zone_id: Option<String>,

    /// API base URL (overridable for tests)
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match &self.credentials {
            Credentials::Token(_) => "token",
            Credentials::Key { .. } => "key",
        };
        f.debug_struct("CloudflareProvider")
            .field("auth", &auth)
            .field("credentials", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: API token with Zone:DNS:Edit permissions, or the
    ///   global API key when `email` is set
    /// - `email`: Account email for key authentication
    /// - `zone_id`: Zone ID, if already known
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when the token is empty or the HTTP client cannot
    /// be built.
    pub fn new(
        api_token: impl Into<String>,
        email: Option<String>,
        zone_id: Option<String>,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let credentials = match email.filter(|e| !e.is_empty()) {
            Some(email) => Credentials::Key {
                email,
                key: api_token,
            },
            None => Credentials::Token(api_token),
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            zone_id,
            api_base: CLOUDFLARE_API_BASE.to_string(),
            client,
        })
    }

    /// Send requests to another API base (e.g. a mock server)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Zone ID in use, if known
    pub fn zone_id(&self) -> Option<&str> {
        self.zone_id.as_deref()
    }

    /// Make sure the zone ID is known, looking it up by name if needed
    ///
    /// If a zone ID was configured it is returned directly.
    pub async fn resolve_zone(&mut self, zone_name: &str) -> Result<String> {
        if let Some(zone_id) = &self.zone_id {
            tracing::debug!("Using pre-configured zone ID");
            return Ok(zone_id.clone());
        }

        let zone_id = self.zone_id_by_name(zone_name).await?;
        self.zone_id = Some(zone_id.clone());
        Ok(zone_id)
    }

    /// Look up a zone ID by zone name
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// ```
    pub async fn zone_id_by_name(&self, zone_name: &str) -> Result<String> {
        tracing::debug!("Looking up zone ID for domain: {}", zone_name);

        let url = format!("{}/zones", self.api_base);
        let request = self.request(Method::GET, &url).query(&[("name", zone_name)]);
        let zones: Vec<Zone> = self.send(request, "Zone lookup").await?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone_name)))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(zone.id)
    }

    fn zone(&self) -> Result<&str> {
        self.zone_id
            .as_deref()
            .ok_or_else(|| Error::config("Cloudflare zone ID has not been resolved"))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");

        match &self.credentials {
            Credentials::Token(token) => builder.bearer_auth(token),
            Credentials::Key { email, key } => builder
                .header("X-Auth-Email", email)
                .header("X-Auth-Key", key),
        }
    }

    /// Send a request and unwrap the Cloudflare envelope
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, context: &str) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(status_error(status, context, &error_text));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| Error::provider(PROVIDER, format!("Failed to parse response: {}", e)))?;

        envelope.into_result(context)
    }
}

/// Map a non-2xx status to an error
fn status_error(status: StatusCode, context: &str, error_text: &str) -> Error {
    match status.as_u16() {
        401 | 403 => Error::provider(
            PROVIDER,
            format!(
                "Authentication failed: Invalid credentials or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{}: {} - {}", context, status, error_text)),
        409 => Error::provider(
            PROVIDER,
            format!("Conflict: Record is being updated by another process. Status: {}", status),
        ),
        429 => Error::provider(
            PROVIDER,
            format!("Rate limit exceeded. Please retry later. Status: {}", status),
        ),
        500..=599 => Error::provider(
            PROVIDER,
            format!("Cloudflare server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::provider(
            PROVIDER,
            format!("{} failed: {} - {}", context, status, error_text),
        ),
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=home.example.com
    /// ```
    async fn find_record(&self, name: &str) -> Result<Option<DnsRecord>> {
        tracing::debug!("Looking up record: {}", name);

        let url = format!("{}/zones/{}/dns_records", self.api_base, self.zone()?);
        let request = self.request(Method::GET, &url).query(&[("name", name)]);
        let mut records: Vec<DnsRecord> = self.send(request, "Record lookup").await?;

        match records.len() {
            0 => Ok(None),
            1 => Ok(records.pop()),
            count => Err(Error::TooManyRecords {
                name: name.to_string(),
                count,
            }),
        }
    }

    /// # API Call
    ///
    /// ```http
    /// POST /zones/:zone_id/dns_records
    /// { "type": "A", "name": "home.example.com", "content": "1.2.3.4" }
    /// ```
    async fn create_record(&self, name: &str, ip: IpAddr) -> Result<DnsRecord> {
        let payload = RecordPayload::new(name, ip);
        tracing::info!(
            "Creating Cloudflare DNS record: {} -> {} ({})",
            name,
            ip,
            payload.record_type
        );

        let url = format!("{}/zones/{}/dns_records", self.api_base, self.zone()?);
        let request = self.request(Method::POST, &url).json(&payload);
        self.send(request, "Record creation").await
    }

    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// { "type": "A", "name": "home.example.com", "content": "1.2.3.4" }
    /// ```
    async fn update_record(&self, id: &str, name: &str, ip: IpAddr) -> Result<()> {
        let payload = RecordPayload::new(name, ip);
        tracing::info!(
            "Updating Cloudflare DNS record: {} -> {} ({})",
            name,
            ip,
            payload.record_type
        );

        let url = format!("{}/zones/{}/dns_records/{}", self.api_base, self.zone()?, id);
        let request = self.request(Method::PUT, &url).json(&payload);
        let _updated: DnsRecord = self.send(request, "Record update").await?;

        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record_json(id: &str, name: &str, content: &str) -> serde_json::Value {
        json!({
            "id": id,
            "zone_id": "zone-1",
            "name": name,
            "type": "A",
            "content": content,
            "proxied": false,
            "ttl": 1
        })
    }

    fn ok(result: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "errors": [],
            "messages": [],
            "result": result
        }))
    }

    fn provider(server: &MockServer) -> CloudflareProvider {
        CloudflareProvider::new("test_token", None, Some("zone-1".to_string()))
            .unwrap()
            .with_api_base(server.uri())
    }

    #[tokio::test]
    async fn test_zone_lookup_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .and(query_param("name", "example.com"))
            .and(header("authorization", "Bearer test_token"))
            .respond_with(ok(json!([{ "id": "zone-42", "name": "example.com" }])))
            .mount(&server)
            .await;

        let mut provider = CloudflareProvider::new("test_token", None, None)
            .unwrap()
            .with_api_base(server.uri());

        assert_eq!(provider.resolve_zone("example.com").await.unwrap(), "zone-42");
        assert_eq!(provider.zone_id(), Some("zone-42"));
    }

    #[tokio::test]
    async fn test_unknown_zone_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones"))
            .respond_with(ok(json!([])))
            .mount(&server)
            .await;

        let provider = provider(&server);

        assert!(matches!(
            provider.zone_id_by_name("missing.example").await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_preconfigured_zone_skips_lookup() {
        let server = MockServer::start().await;
        let mut provider = provider(&server);

        assert_eq!(provider.resolve_zone("example.com").await.unwrap(), "zone-1");
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_find_record_variants() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .and(query_param("name", "home.example.com"))
            .respond_with(ok(json!([record_json("r1", "home.example.com", "192.0.2.1")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .and(query_param("name", "none.example.com"))
            .respond_with(ok(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .and(query_param("name", "dup.example.com"))
            .respond_with(ok(json!([
                record_json("r2", "dup.example.com", "192.0.2.1"),
                record_json("r3", "dup.example.com", "192.0.2.2")
            ])))
            .mount(&server)
            .await;

        let provider = provider(&server);

        let record = provider.find_record("home.example.com").await.unwrap().unwrap();
        assert_eq!(record.id, "r1");
        assert_eq!(record.content, "192.0.2.1");
        assert_eq!(record.record_type, "A");

        assert!(provider.find_record("none.example.com").await.unwrap().is_none());

        match provider.find_record("dup.example.com").await {
            Err(Error::TooManyRecords { name, count }) => {
                assert_eq!(name, "dup.example.com");
                assert_eq!(count, 2);
            }
            other => panic!("expected TooManyRecords, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_record_posts_a_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zones/zone-1/dns_records"))
            .and(body_json(json!({
                "type": "A",
                "name": "home.example.com",
                "content": "198.51.100.7"
            })))
            .respond_with(ok(record_json("r9", "home.example.com", "198.51.100.7")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        let record = provider
            .create_record("home.example.com", IpAddr::from([198, 51, 100, 7]))
            .await
            .unwrap();

        assert_eq!(record.id, "r9");
    }

    #[tokio::test]
    async fn test_create_record_uses_aaaa_for_ipv6() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/zones/zone-1/dns_records"))
            .and(body_json(json!({
                "type": "AAAA",
                "name": "home.example.com",
                "content": "2001:db8::7"
            })))
            .respond_with(ok(json!({
                "id": "r6",
                "name": "home.example.com",
                "type": "AAAA",
                "content": "2001:db8::7"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);
        let record = provider
            .create_record("home.example.com", "2001:db8::7".parse().unwrap())
            .await
            .unwrap();

        assert_eq!(record.record_type, "AAAA");
    }

    #[tokio::test]
    async fn test_update_record_puts_new_content() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/zones/zone-1/dns_records/r1"))
            .and(body_json(json!({
                "type": "A",
                "name": "home.example.com",
                "content": "203.0.113.5"
            })))
            .respond_with(ok(record_json("r1", "home.example.com", "203.0.113.5")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(&server);

        provider
            .update_record("r1", "home.example.com", IpAddr::from([203, 0, 113, 5]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_envelope_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "errors": [{ "code": 81057, "message": "Record already exists." }],
                "messages": [],
                "result": null
            })))
            .mount(&server)
            .await;

        let provider = provider(&server);

        match provider
            .update_record("r1", "home.example.com", IpAddr::from([203, 0, 113, 5]))
            .await
        {
            Err(Error::Provider { provider, message }) => {
                assert_eq!(provider, "cloudflare");
                assert!(message.contains("Record already exists."));
                assert!(message.contains("81057"));
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_code_mapping() {
        let cases: [(u16, &str); 4] = [
            (403, "Authentication failed"),
            (409, "Conflict"),
            (429, "Rate limit"),
            (502, "transient"),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(status).set_body_string("{}"))
                .mount(&server)
                .await;

            let provider = provider(&server);
            let err = provider.find_record("home.example.com").await.unwrap_err();
            assert!(
                err.to_string().contains(expected),
                "status {} produced {}",
                status,
                err
            );
        }
    }

    #[tokio::test]
    async fn test_missing_record_on_update_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
            .mount(&server)
            .await;

        let provider = provider(&server);

        assert!(matches!(
            provider
                .update_record("gone", "home.example.com", IpAddr::from([192, 0, 2, 1]))
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_email_selects_key_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/zones/zone-1/dns_records"))
            .and(header("X-Auth-Email", "ops@example.com"))
            .and(header("X-Auth-Key", "global_key"))
            .respond_with(ok(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let provider = CloudflareProvider::new(
            "global_key",
            Some("ops@example.com".to_string()),
            Some("zone-1".to_string()),
        )
        .unwrap()
        .with_api_base(server.uri());

        assert!(provider.find_record("home.example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unresolved_zone_is_config_error() {
        let provider = CloudflareProvider::new("test_token", None, None).unwrap();

        assert!(matches!(
            provider.find_record("home.example.com").await,
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_empty_token_is_rejected() {
        assert!(matches!(
            CloudflareProvider::new("", None, None),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_provider_name() {
        let provider = CloudflareProvider::new("token", None, None).unwrap();
        assert_eq!(provider.provider_name(), "cloudflare");
    }

    #[test]
    fn test_credentials_not_exposed_in_debug() {
        let provider = CloudflareProvider::new(
            "secret_token_12345",
            Some("ops@example.com".to_string()),
            None,
        )
        .unwrap();

        let debug_str = format!("{:?}", provider);
        assert!(!debug_str.contains("secret_token"));
        assert!(!debug_str.contains("ops@example.com"));
        assert!(debug_str.contains("CloudflareProvider"));
    }
}
