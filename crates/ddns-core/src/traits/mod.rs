//! Core traits for the DDNS system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: One external service reporting our public address
//! - [`DnsProvider`]: Look up, create and update records via provider APIs

pub mod ip_source;
pub mod dns_provider;

pub use ip_source::{IpSource, Transport, normalize};
pub use dns_provider::{DnsProvider, DnsRecord, record_type_for};
