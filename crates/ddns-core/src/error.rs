//! Error types for the DDNS system
//!
//! This module defines all error types used throughout the crate.
//!
//! Per-source failures ([`Error::Unreachable`], [`Error::MalformedResponse`])
//! are absorbed by the consensus resolver. Round-level failures
//! ([`Error::AllSourcesUnreachable`], [`Error::NoConsensus`]) surface once per
//! round and are never fatal to the poll loop.

use std::net::IpAddr;

use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// A source could not be reached (connect failure, timeout, non-2xx status)
    #[error("IP source {source_id} unreachable: {reason}")]
    Unreachable {
        /// Source identity (endpoint URL)
        source_id: String,
        /// Human-readable failure reason
        reason: String,
    },

    /// A source answered but the body is not an IP literal
    #[error("IP source {source_id} returned a malformed response: {body:?}")]
    MalformedResponse {
        /// Source identity (endpoint URL)
        source_id: String,
        /// Truncated response body
        body: String,
    },

    /// Every registered source failed in a round
    #[error("all {attempted} IP source(s) failed to produce a vote")]
    AllSourcesUnreachable {
        /// Number of sources queried
        attempted: usize,
    },

    /// Two or more addresses share the highest total weight
    #[error("no consensus: {candidates:?} tied at weight {weight}")]
    NoConsensus {
        /// The tied weight
        weight: u32,
        /// Addresses sharing that weight
        candidates: Vec<IpAddr>,
    },

    /// A record lookup matched more than one record
    #[error("too many records returned for {name}: expected 1, got {count}")]
    TooManyRecords {
        /// Record name filter
        name: String,
        /// Number of matching records
        count: usize,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors (from provider APIs)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Record or zone not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Provider-specific error
    #[error("Provider error ({provider}): {message}")]
    Provider {
        /// Provider name
        provider: String,
        /// Error message
        message: String,
    },
}

impl Error {
    /// Create an unreachable-source error
    pub fn unreachable(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Unreachable {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Create a malformed-response error, truncating the body excerpt
    pub fn malformed(source_id: impl Into<String>, body: &str) -> Self {
        const MAX_BODY: usize = 64;
        let body = match body.char_indices().nth(MAX_BODY) {
            Some((idx, _)) => format!("{}...", &body[..idx]),
            None => body.to_string(),
        };
        Self::MalformedResponse {
            source_id: source_id.into(),
            body,
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an HTTP error
    pub fn http(msg: impl Into<String>) -> Self {
        Self::Http(msg.into())
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a provider-specific error
    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
