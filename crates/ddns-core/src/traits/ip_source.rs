// # IP Source Trait
//
// Defines the interface for a single "what is my IP" source.
//
// ## Implementations
//
// - HTTP(S) services: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     // One request, one candidate address
//     let ip = source.fetch().await?;
//     println!("{} says {}", source.id(), ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Transport policy of a source
///
/// Encrypted sources are harder to spoof on-path and are usually given a
/// higher voter weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Plain HTTP
    Plaintext,
    /// HTTPS
    Encrypted,
}

/// Trait for IP source implementations
///
/// A source is an untrusted observer: it reports what one external service
/// claims our address is. Trust is expressed by the voter weight, never by
/// the source itself.
///
/// # Contract
///
/// - `fetch()` performs exactly one network request with a bounded timeout
/// - No retries; the poll loop retries on its next interval
/// - Transport or status failures map to [`Error::Unreachable`]
/// - Unparseable bodies map to [`Error::MalformedResponse`]
/// - Sources are immutable once registered and hold no state between calls
///
/// [`Error::Unreachable`]: crate::Error::Unreachable
/// [`Error::MalformedResponse`]: crate::Error::MalformedResponse
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Source identity, usually the endpoint URL
    fn id(&self) -> &str;

    /// Transport policy of this source
    fn transport(&self) -> Transport;

    /// Fetch the address this source reports
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The reported address
    /// - `Err(Error)`: The source was unreachable or answered garbage
    async fn fetch(&self) -> Result<IpAddr, crate::Error>;
}

/// Canonical form used when grouping votes
///
/// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) are folded into their
/// IPv4 form so the same address cannot split into two groups.
pub fn normalize(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}
