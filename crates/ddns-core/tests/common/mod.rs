//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that exercise the resolver and
//! the poll loop without touching the network.

#![allow(dead_code)]

use ddns_core::config::{DdnsConfig, EngineConfig, ProviderConfig};
use ddns_core::error::{Error, Result};
use ddns_core::registry::VoterRegistry;
use ddns_core::traits::{DnsProvider, DnsRecord, IpSource, Transport, record_type_for};
use ddns_core::ConsensusResolver;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a scripted source answers
#[derive(Debug, Clone)]
pub enum Reply {
    /// A well-formed address
    Ip(IpAddr),
    /// Connection failure
    Unreachable,
    /// A body that is not an address
    Malformed(&'static str),
    /// Never answers
    Hang,
}

/// An IpSource whose answer is controlled by the test
pub struct ScriptedSource {
    id: String,
    transport: Transport,
    reply: Mutex<Reply>,
    delay: Duration,
    fetch_count: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(id: impl Into<String>, reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            transport: Transport::Plaintext,
            reply: Mutex::new(reply),
            delay: Duration::ZERO,
            fetch_count: AtomicUsize::new(0),
        })
    }

    /// A source that answers `ip`
    pub fn ip(id: &str, ip: [u8; 4]) -> Arc<Self> {
        Self::new(id, Reply::Ip(IpAddr::from(ip)))
    }

    /// A source that answers after `delay`
    pub fn delayed(id: &str, reply: Reply, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            transport: Transport::Encrypted,
            reply: Mutex::new(reply),
            delay,
            fetch_count: AtomicUsize::new(0),
        })
    }

    /// Change the answer for subsequent rounds
    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    /// Number of fetch() calls so far
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IpSource for ScriptedSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn transport(&self) -> Transport {
        self.transport
    }

    async fn fetch(&self) -> Result<IpAddr> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self.reply.lock().unwrap().clone();
        match reply {
            Reply::Ip(ip) => Ok(ip),
            Reply::Unreachable => Err(Error::unreachable(&self.id, "connection refused")),
            Reply::Malformed(body) => Err(Error::malformed(&self.id, body)),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Build a resolver over `(source, weight)` pairs in the given order
pub fn resolver(voters: &[(Arc<ScriptedSource>, u32)]) -> ConsensusResolver {
    let mut builder = VoterRegistry::builder();
    for (source, weight) in voters {
        builder
            .add_voter(source.clone() as Arc<dyn IpSource>, *weight)
            .expect("positive weight");
    }
    ConsensusResolver::new(Arc::new(builder.build())).with_timeout(Duration::from_secs(2))
}

#[derive(Default)]
struct ProviderState {
    records: Mutex<Vec<DnsRecord>>,
    next_id: AtomicUsize,
    find_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    fail_find: AtomicBool,
    fail_create: AtomicBool,
    fail_update: AtomicBool,
}

/// An in-memory DnsProvider that tracks calls
///
/// Clones share state, so a test can keep one handle and give the engine
/// another.
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    state: Arc<ProviderState>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record as if it already existed at the provider
    pub fn with_record(self, name: &str, content: &str) -> Self {
        self.insert(name, content);
        self
    }

    /// Insert a record, returning its id
    pub fn insert(&self, name: &str, content: &str) -> String {
        let id = format!("rec-{}", self.state.next_id.fetch_add(1, Ordering::SeqCst));
        self.state.records.lock().unwrap().push(DnsRecord {
            id: id.clone(),
            name: name.to_string(),
            content: content.to_string(),
            record_type: "A".to_string(),
        });
        id
    }

    /// Remove every record (simulates an out-of-band deletion)
    pub fn clear(&self) {
        self.state.records.lock().unwrap().clear();
    }

    /// Current content of `name`, if exactly one record exists
    pub fn content_of(&self, name: &str) -> Option<String> {
        let records = self.state.records.lock().unwrap();
        let matching: Vec<_> = records.iter().filter(|r| r.name == name).collect();
        match matching.as_slice() {
            [record] => Some(record.content.clone()),
            _ => None,
        }
    }

    pub fn find_calls(&self) -> usize {
        self.state.find_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> usize {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.state.update_calls.load(Ordering::SeqCst)
    }

    pub fn fail_find(&self, fail: bool) {
        self.state.fail_find.store(fail, Ordering::SeqCst);
    }

    pub fn fail_create(&self, fail: bool) {
        self.state.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_update(&self, fail: bool) {
        self.state.fail_update.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn find_record(&self, name: &str) -> Result<Option<DnsRecord>> {
        self.state.find_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_find.load(Ordering::SeqCst) {
            return Err(Error::http("lookup unavailable"));
        }

        let records = self.state.records.lock().unwrap();
        let matching: Vec<_> = records.iter().filter(|r| r.name == name).cloned().collect();
        match matching.len() {
            0 => Ok(None),
            1 => Ok(matching.into_iter().next()),
            count => Err(Error::TooManyRecords {
                name: name.to_string(),
                count,
            }),
        }
    }

    async fn create_record(&self, name: &str, ip: IpAddr) -> Result<DnsRecord> {
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_create.load(Ordering::SeqCst) {
            return Err(Error::http("create unavailable"));
        }

        let id = self.insert(name, &ip.to_string());
        Ok(DnsRecord {
            id,
            name: name.to_string(),
            content: ip.to_string(),
            record_type: record_type_for(ip).to_string(),
        })
    }

    async fn update_record(&self, id: &str, _name: &str, ip: IpAddr) -> Result<()> {
        self.state.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_update.load(Ordering::SeqCst) {
            return Err(Error::http("update unavailable"));
        }

        let mut records = self.state.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::not_found(format!("record {}", id)))?;
        record.content = ip.to_string();
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Helper to create a minimal DdnsConfig for testing
pub fn minimal_config(record: &str) -> DdnsConfig {
    let mut config = DdnsConfig::new(
        ProviderConfig::Cloudflare {
            api_token: "test-token".to_string(),
            email: None,
        },
        "example.com",
        record,
    );
    config.engine = EngineConfig {
        interval_ms: 60_000,
        event_channel_capacity: 100,
    };
    config
}
