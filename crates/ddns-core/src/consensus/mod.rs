//! Weighted-vote consensus over untrusted IP sources
//!
//! A round fans out one `fetch()` per registered voter, waits for every
//! outcome (success, failure or per-source timeout), then tallies:
//!
//! ```text
//!   voter(w=3) ──▶ 203.0.113.7 ─┐
//!   voter(w=3) ──▶ 203.0.113.7 ─┤      ┌──────────────┐
//!   voter(w=1) ──▶ 198.51.100.1 ┼────▶ │ group + sum  │──▶ 203.0.113.7 (6 of 7)
//!   voter(w=1) ──▶ timeout      ┘      └──────────────┘
//! ```
//!
//! Failed votes are excluded, not counted as a vote for "no address".
//! A tie at the top weight yields [`Error::NoConsensus`]; a round without a
//! single usable vote yields [`Error::AllSourcesUnreachable`].

use crate::error::{Error, Result};
use crate::registry::{Voter, VoterRegistry};
use crate::traits::normalize;
use futures::future::join_all;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-source timeout
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// One source's answer for one round
#[derive(Debug)]
pub struct Vote {
    /// Source identity
    pub source: String,
    /// Weight of the voter that cast it
    pub weight: u32,
    /// Reported address or the reason there is none
    pub outcome: Result<IpAddr>,
}

impl Vote {
    /// Create a vote
    pub fn new(source: impl Into<String>, weight: u32, outcome: Result<IpAddr>) -> Self {
        Self {
            source: source.into(),
            weight,
            outcome,
        }
    }
}

/// Outcome of a successful round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusResult {
    /// The winning address
    pub ip: IpAddr,
    /// Sum of weights that reported `ip`
    pub supporting_weight: u32,
    /// Sum of weights that produced any usable vote
    pub participating_weight: u32,
}

impl ConsensusResult {
    /// Record content for the reconciler
    pub fn content(&self) -> String {
        self.ip.to_string()
    }
}

/// Aggregate a round's votes
///
/// Order-independent: permuting `votes` never changes the result.
/// Votes whose weights sum past `u32::MAX` are rejected with
/// [`Error::InvalidInput`].
pub fn tally(votes: &[Vote]) -> Result<ConsensusResult> {
    let mut groups: HashMap<IpAddr, u32> = HashMap::new();
    let mut participating_weight = 0u32;
    let overflow = || Error::invalid_input("total vote weight exceeds u32::MAX");

    for vote in votes {
        if let Ok(ip) = &vote.outcome {
            let group = groups.entry(normalize(*ip)).or_insert(0);
            *group = group.checked_add(vote.weight).ok_or_else(overflow)?;
            participating_weight = participating_weight
                .checked_add(vote.weight)
                .ok_or_else(overflow)?;
        }
    }

    let Some(top) = groups.values().copied().max() else {
        return Err(Error::AllSourcesUnreachable {
            attempted: votes.len(),
        });
    };

    let mut leaders: Vec<IpAddr> = groups
        .iter()
        .filter(|(_, weight)| **weight == top)
        .map(|(ip, _)| *ip)
        .collect();

    if leaders.len() > 1 {
        leaders.sort();
        return Err(Error::NoConsensus {
            weight: top,
            candidates: leaders,
        });
    }

    Ok(ConsensusResult {
        ip: leaders[0],
        supporting_weight: top,
        participating_weight,
    })
}

/// Stateless resolver over an immutable voter registry
///
/// Each [`resolve`](Self::resolve) call is independent; nothing is carried
/// between rounds.
#[derive(Debug, Clone)]
pub struct ConsensusResolver {
    registry: Arc<VoterRegistry>,
    source_timeout: Duration,
}

impl ConsensusResolver {
    /// Create a resolver with the default per-source timeout
    pub fn new(registry: Arc<VoterRegistry>) -> Self {
        Self {
            registry,
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// Override the per-source timeout
    pub fn with_timeout(mut self, source_timeout: Duration) -> Self {
        self.source_timeout = source_timeout;
        self
    }

    /// The registry this resolver reads
    pub fn registry(&self) -> &VoterRegistry {
        &self.registry
    }

    /// Run one consensus round
    pub async fn resolve(&self) -> Result<ConsensusResult> {
        let votes = self.collect_votes().await;
        let result = tally(&votes);

        match &result {
            Ok(consensus) => debug!(
                ip = %consensus.ip,
                supporting = consensus.supporting_weight,
                participating = consensus.participating_weight,
                total = self.registry.total_weight(),
                "Consensus reached"
            ),
            Err(e) => debug!("Consensus round failed: {}", e),
        }

        result
    }

    /// Query every voter concurrently and wait for all of them
    pub async fn collect_votes(&self) -> Vec<Vote> {
        let rounds = self
            .registry
            .voters()
            .iter()
            .map(|voter| self.cast(voter));

        join_all(rounds).await
    }

    async fn cast(&self, voter: &Voter) -> Vote {
        let source = voter.source();
        let outcome = match tokio::time::timeout(self.source_timeout, source.fetch()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::unreachable(
                source.id(),
                format!("timed out after {:?}", self.source_timeout),
            )),
        };

        match &outcome {
            Ok(ip) => debug!(source = source.id(), weight = voter.weight(), %ip, "Vote received"),
            Err(e) => warn!(source = source.id(), "Vote excluded: {}", e),
        }

        Vote::new(source.id(), voter.weight(), outcome)
    }
}
