// # DNS Provider Trait
//
// Defines the record reconciler interface: look up, create and update a
// single address record via a provider API.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//     let ip = std::net::IpAddr::from([192, 0, 2, 1]);
//
//     match provider.find_record("home.example.com").await? {
//         Some(record) if record.content != ip.to_string() => {
//             provider.update_record(&record.id, &record.name, ip).await?;
//         }
//         Some(_) => {}
//         None => {
//             provider.create_record("home.example.com", ip).await?;
//         }
//     }
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use super::ip_source::normalize;

/// A DNS record as seen by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// The record ID (provider-specific)
    pub id: String,
    /// The fully qualified record name
    pub name: String,
    /// The record content (the published IP string)
    pub content: String,
    /// Record type ("A" or "AAAA")
    #[serde(rename = "type")]
    pub record_type: String,
}

impl DnsRecord {
    /// Whether the record already publishes `ip`
    ///
    /// Compares addresses, not strings: `2001:db8:0::1` matches
    /// `2001:db8::1`. Content that is not an address never matches.
    pub fn points_to(&self, ip: IpAddr) -> bool {
        self.content
            .trim()
            .parse::<IpAddr>()
            .is_ok_and(|published| normalize(published) == normalize(ip))
    }
}

/// Record type for an address
pub fn record_type_for(ip: IpAddr) -> &'static str {
    match ip {
        IpAddr::V4(_) => "A",
        IpAddr::V6(_) => "AAAA",
    }
}

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers are isolated, stateless and single-shot:
/// - One API call per operation, no retry or backoff (the poll loop owns
///   scheduling)
/// - No caching beyond a single request
/// - No decisions about whether an update is needed
///
/// Errors are returned to the poll loop, which logs them and continues on
/// the next interval.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up a record by exact name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(record))`: Exactly one record matched
    /// - `Ok(None)`: No record matched
    /// - `Err(Error::TooManyRecords)`: The name filter is not unique
    /// - `Err(Error)`: The request failed
    async fn find_record(&self, name: &str) -> Result<Option<DnsRecord>, crate::Error>;

    /// Create an address record for `ip`
    async fn create_record(&self, name: &str, ip: IpAddr) -> Result<DnsRecord, crate::Error>;

    /// Point an existing record at `ip`
    async fn update_record(&self, id: &str, name: &str, ip: IpAddr) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
