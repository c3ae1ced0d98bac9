// # ddns-core
//
// Core library for the consensus-driven DDNS updater.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping one DNS record
// pointed at the machine's public IP:
// - **IpSource**: Trait for one untrusted "what is my IP" service
// - **VoterRegistry**: Immutable list of (source, weight) pairs
// - **ConsensusResolver**: Weighted vote across all sources per round
// - **DnsProvider**: Trait for looking up, creating and updating records
// - **DdnsEngine**: Poll loop that hands resolved IPs to the provider
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Untrusted Inputs**: No single source decides the published address
// 3. **Stateless Rounds**: Each consensus round is independent
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Non-fatal Steady State**: Only startup failures stop the process

pub mod traits;
pub mod consensus;
pub mod engine;
pub mod registry;
pub mod config;
pub mod error;

// Re-export core types for convenience
pub use traits::{IpSource, DnsProvider, DnsRecord, Transport};
pub use consensus::{ConsensusResolver, ConsensusResult, Vote};
pub use engine::{DdnsEngine, EngineEvent, RoundOutcome};
pub use registry::{Voter, VoterRegistry};
pub use config::{DdnsConfig, EngineConfig, ProviderConfig};
pub use error::{Error, Result};
