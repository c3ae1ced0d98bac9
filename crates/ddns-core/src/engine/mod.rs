//! Core DDNS engine (poll loop)
//!
//! The DdnsEngine is responsible for:
//! - Running one consensus round per interval
//! - Deciding whether the published record needs to change
//! - Creating or updating the record via DnsProvider
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ ConsensusResolver │─── ConsensusResult ───┐
//! └───────────────────┘                       │
//!                                             ▼
//!                                    ┌──────────────┐
//!                                    │ DdnsEngine   │
//!                                    └──────────────┘
//!                                             │
//!                         ┌───────────────────┴───────────────┐
//!                         ▼                                   ▼
//!                 ┌──────────────┐                   ┌─────────────┐
//!                 │ DnsProvider  │                   │   Events    │
//!                 │ (reconcile)  │                   │  (notify)   │
//!                 └──────────────┘                   └─────────────┘
//! ```
//!
//! ## Round Flow
//!
//! 1. Resolve the public IP; an inconclusive round touches nothing
//! 2. If it differs from the last published IP, update the known record;
//!    a successful update ends the round
//! 3. Otherwise reconcile against the provider: look up the record, create
//!    it when missing, update it when its content differs
//!
//! Every steady-state failure is logged and retried on the next interval.
//! Only [`DdnsEngine::start`] failures are returned to the caller.

use crate::config::DdnsConfig;
use crate::consensus::ConsensusResolver;
use crate::error::Result;
use crate::traits::{DnsProvider, DnsRecord};
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Events emitted by the DdnsEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started and the record is known
    Started {
        record_name: String,
        interval: Duration,
    },

    /// A consensus round produced no trusted IP
    RoundFailed {
        error: String,
    },

    /// The resolved IP differs from the last published one
    IpChangeDetected {
        record_name: String,
        new_ip: IpAddr,
        previous_ip: Option<IpAddr>,
    },

    /// The record did not exist and was created
    RecordCreated {
        record_name: String,
        ip: IpAddr,
    },

    /// The record now points at the new IP
    RecordUpdated {
        record_name: String,
        new_ip: IpAddr,
    },

    /// The record already pointed at the resolved IP
    RecordUnchanged {
        record_name: String,
        ip: IpAddr,
    },

    /// A lookup, create or update call failed
    UpdateFailed {
        record_name: String,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// What a single round did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// No trusted IP this round; DNS was not touched
    Inconclusive,
    /// The known record was updated directly after an IP change
    Updated(IpAddr),
    /// The record was missing and has been created
    Created(IpAddr),
    /// The record was found stale during reconciliation and updated
    Reconciled(IpAddr),
    /// The record already matched
    Unchanged(IpAddr),
    /// A provider call failed; retried next interval
    Failed,
}

/// Core DDNS engine
///
/// ## Lifecycle
///
/// 1. Create with [`DdnsEngine::new()`]
/// 2. Start with [`DdnsEngine::run()`] or [`DdnsEngine::run_with_shutdown()`]
/// 3. Engine polls until a shutdown signal is received
///
/// ## State
///
/// The engine keeps the last published IP and the record handle between
/// rounds. The resolver itself is stateless.
pub struct DdnsEngine {
    /// Consensus resolver queried once per round
    resolver: ConsensusResolver,

    /// DNS provider for the managed record
    provider: Box<dyn DnsProvider>,

    /// Fully qualified record name
    record_name: String,

    /// Delay between rounds
    interval: Duration,

    /// Last known record handle
    record: Option<DnsRecord>,

    /// Last IP successfully published
    last_ip: Option<IpAddr>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl DdnsEngine {
    /// Create a new DDNS engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: Consensus resolver over the configured voters
    /// - `provider`: DNS provider implementation
    /// - `config`: DDNS configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: ConsensusResolver,
        provider: Box<dyn DnsProvider>,
        config: DdnsConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let engine = Self {
            resolver,
            provider,
            record_name: config.record_name(),
            interval: config.engine.interval(),
            record: None,
            last_ip: None,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Fully qualified name of the managed record
    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// Last IP this engine published or observed as published
    pub fn last_ip(&self) -> Option<IpAddr> {
        self.last_ip
    }

    /// Find or create the record and seed the last known IP
    ///
    /// Failures here are startup failures and are returned to the caller.
    pub async fn start(&mut self) -> Result<()> {
        let record = match self.provider.find_record(&self.record_name).await? {
            Some(record) => {
                debug!("Found record {} ({})", record.name, record.id);
                record
            }
            None => {
                let consensus = self.resolver.resolve().await?;
                let record = self
                    .provider
                    .create_record(&self.record_name, consensus.ip)
                    .await?;
                info!("Created record {} -> {}", self.record_name, consensus.ip);
                self.emit_event(EngineEvent::RecordCreated {
                    record_name: self.record_name.clone(),
                    ip: consensus.ip,
                });
                record
            }
        };
        self.record = Some(record);

        self.last_ip = match self.resolver.resolve().await {
            Ok(consensus) => Some(consensus.ip),
            Err(e) => {
                warn!("failed to derive external IP: {}", e);
                None
            }
        };

        info!(
            record = %self.record_name,
            interval = ?self.interval,
            "Starting ddns client"
        );
        self.emit_event(EngineEvent::Started {
            record_name: self.record_name.clone(),
            interval: self.interval,
        });

        Ok(())
    }

    /// Run one poll round
    pub async fn run_round(&mut self) -> RoundOutcome {
        let ip = match self.resolver.resolve().await {
            Ok(consensus) => consensus.ip,
            Err(e) => {
                warn!("Failed to derive external IP: {}", e);
                self.emit_event(EngineEvent::RoundFailed {
                    error: e.to_string(),
                });
                return RoundOutcome::Inconclusive;
            }
        };

        if self.last_ip != Some(ip) {
            info!(record = %self.record_name, %ip, "IP change detected, updating record");
            self.emit_event(EngineEvent::IpChangeDetected {
                record_name: self.record_name.clone(),
                new_ip: ip,
                previous_ip: self.last_ip,
            });

            if self.update_known_record(ip).await {
                return RoundOutcome::Updated(ip);
            }
        }

        self.reconcile(ip).await
    }

    /// Update the record handle from the previous round, if any
    async fn update_known_record(&mut self, ip: IpAddr) -> bool {
        let Some(record) = self.record.as_ref() else {
            return false;
        };

        match self
            .provider
            .update_record(&record.id, &self.record_name, ip)
            .await
        {
            Ok(()) => {
                self.mark_published(ip);
                true
            }
            Err(e) => {
                warn!(record = %self.record_name, %ip, "failed to update DNS record: {}", e);
                self.emit_event(EngineEvent::UpdateFailed {
                    record_name: self.record_name.clone(),
                    error: e.to_string(),
                });
                false
            }
        }
    }

    /// Compare the provider's view of the record with `ip` and fix it
    async fn reconcile(&mut self, ip: IpAddr) -> RoundOutcome {
        let found = match self.provider.find_record(&self.record_name).await {
            Ok(found) => found,
            Err(e) => {
                warn!(record = %self.record_name, "failed to lookup record: {}", e);
                self.emit_event(EngineEvent::UpdateFailed {
                    record_name: self.record_name.clone(),
                    error: e.to_string(),
                });
                return RoundOutcome::Failed;
            }
        };

        match found {
            None => match self.provider.create_record(&self.record_name, ip).await {
                Ok(record) => {
                    info!("Created record {} -> {}", self.record_name, ip);
                    self.record = Some(record);
                    self.last_ip = Some(ip);
                    self.emit_event(EngineEvent::RecordCreated {
                        record_name: self.record_name.clone(),
                        ip,
                    });
                    RoundOutcome::Created(ip)
                }
                Err(e) => {
                    warn!(record = %self.record_name, "failed to create record: {}", e);
                    self.emit_event(EngineEvent::UpdateFailed {
                        record_name: self.record_name.clone(),
                        error: e.to_string(),
                    });
                    RoundOutcome::Failed
                }
            },
            Some(record) if record.points_to(ip) => {
                debug!("Record {} already points to {}", self.record_name, ip);
                self.record = Some(record);
                self.emit_event(EngineEvent::RecordUnchanged {
                    record_name: self.record_name.clone(),
                    ip,
                });
                RoundOutcome::Unchanged(ip)
            }
            Some(record) => {
                info!(
                    record = %self.record_name,
                    %ip,
                    published = %record.content,
                    "IP change detected, updating record"
                );
                let id = record.id.clone();
                self.record = Some(record);
                match self.provider.update_record(&id, &self.record_name, ip).await {
                    Ok(()) => {
                        self.mark_published(ip);
                        RoundOutcome::Reconciled(ip)
                    }
                    Err(e) => {
                        warn!(record = %self.record_name, %ip, "failed to update DNS record: {}", e);
                        self.emit_event(EngineEvent::UpdateFailed {
                            record_name: self.record_name.clone(),
                            error: e.to_string(),
                        });
                        RoundOutcome::Failed
                    }
                }
            }
        }
    }

    fn mark_published(&mut self, ip: IpAddr) {
        self.last_ip = Some(ip);
        if let Some(record) = self.record.as_mut() {
            record.content = ip.to_string();
        }
        info!("Updated {} -> {}", self.record_name, ip);
        self.emit_event(EngineEvent::RecordUpdated {
            record_name: self.record_name.clone(),
            new_ip: ip,
        });
    }

    /// Run the engine until ctrl-c
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Startup failure
    pub async fn run(&mut self) -> Result<()> {
        self.run_with_shutdown(None).await
    }

    /// Run the engine until `shutdown_rx` fires (or ctrl-c when `None`)
    pub async fn run_with_shutdown(
        &mut self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.start().await?;

        let mut shutdown: Pin<Box<dyn Future<Output = ()> + Send>> = match shutdown_rx {
            Some(rx) => Box::pin(async move {
                let _ = rx.await;
            }),
            None => Box::pin(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Failed to listen for ctrl-c: {}", e);
                    std::future::pending::<()>().await;
                }
            }),
        };

        loop {
            let stop = tokio::select! {
                _ = &mut shutdown => true,
                _ = self.run_round() => false,
            };
            if stop {
                break;
            }

            let stop = tokio::select! {
                _ = &mut shutdown => true,
                _ = tokio::time::sleep(self.interval) => false,
            };
            if stop {
                break;
            }
        }

        info!("Shutdown signal received");
        self.emit_event(EngineEvent::Stopped {
            reason: "Shutdown signal".to_string(),
        });

        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // A dropped receiver just means nobody is listening
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
