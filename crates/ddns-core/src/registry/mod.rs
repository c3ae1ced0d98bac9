//! Voter registry
//!
//! The registry pairs each [`IpSource`] with a static trust weight. It is
//! assembled once at startup through [`VoterRegistryBuilder`] and is
//! immutable afterwards; the resolver holds it behind an `Arc`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::VoterRegistry;
//! use std::sync::Arc;
//!
//! let mut builder = VoterRegistry::builder();
//!
//! // TLS-protected providers
//! builder.add_voter(Arc::new(https_source), 3)?;
//!
//! // Plain-text providers
//! builder.add_voter(Arc::new(http_source), 1)?;
//!
//! let registry = Arc::new(builder.build());
//! ```

use crate::error::{Error, Result};
use crate::traits::IpSource;
use std::fmt;
use std::sync::Arc;

/// A source paired with its trust weight
#[derive(Clone)]
pub struct Voter {
    source: Arc<dyn IpSource>,
    weight: u32,
}

impl Voter {
    /// The source queried for this voter
    pub fn source(&self) -> &Arc<dyn IpSource> {
        &self.source
    }

    /// Static trust weight (always >= 1)
    pub fn weight(&self) -> u32 {
        self.weight
    }
}

impl fmt::Debug for Voter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voter")
            .field("source", &self.source.id())
            .field("transport", &self.source.transport())
            .field("weight", &self.weight)
            .finish()
    }
}

/// Ordered, immutable collection of voters
#[derive(Debug, Clone, Default)]
pub struct VoterRegistry {
    voters: Vec<Voter>,
}

impl VoterRegistry {
    /// Start assembling a registry
    pub fn builder() -> VoterRegistryBuilder {
        VoterRegistryBuilder::default()
    }

    /// Registered voters, in registration order
    pub fn voters(&self) -> &[Voter] {
        &self.voters
    }

    /// Number of registered voters
    pub fn len(&self) -> usize {
        self.voters.len()
    }

    /// Whether no voter is registered
    pub fn is_empty(&self) -> bool {
        self.voters.is_empty()
    }

    /// Sum of all voter weights
    ///
    /// Never overflows: the builder rejects voters that would push it past
    /// `u32::MAX`.
    pub fn total_weight(&self) -> u32 {
        self.voters.iter().map(|v| v.weight).sum()
    }
}

/// Builder for [`VoterRegistry`]
#[derive(Debug, Default)]
pub struct VoterRegistryBuilder {
    voters: Vec<Voter>,
}

impl VoterRegistryBuilder {
    /// Append a voter
    ///
    /// Duplicate sources are legal and simply add independent influence.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidInput`] when `weight` is zero or the registry's total
    /// weight would exceed `u32::MAX`.
    pub fn add_voter(&mut self, source: Arc<dyn IpSource>, weight: u32) -> Result<&mut Self> {
        if weight == 0 {
            return Err(Error::invalid_input(format!(
                "voter weight for {} must be a positive integer",
                source.id()
            )));
        }

        let total: u32 = self.voters.iter().map(|v| v.weight).sum();
        if total.checked_add(weight).is_none() {
            return Err(Error::invalid_input(format!(
                "voter weight {} for {} overflows the registry total of {}",
                weight,
                source.id(),
                total
            )));
        }

        tracing::debug!(source = source.id(), weight, "Registered voter");
        self.voters.push(Voter { source, weight });
        Ok(self)
    }

    /// Freeze the registry
    pub fn build(self) -> VoterRegistry {
        VoterRegistry {
            voters: self.voters,
        }
    }
}
