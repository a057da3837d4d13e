//! Memoized host reachability for network roots.

use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use treecensus_core::network_host;

/// A single reachability check against a host.
pub trait HostProbe: Send + Sync {
    /// Returns `true` if the host answered.
    fn probe(&self, host: &str) -> bool;
}

/// Probes a host by opening one TCP connection with a short timeout.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    /// Create a probe against `port` with the given connect timeout.
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl HostProbe for TcpProbe {
    fn probe(&self, host: &str) -> bool {
        let addr = match (host, self.port).to_socket_addrs() {
            Ok(mut addrs) => match addrs.next() {
                Some(addr) => addr,
                None => return false,
            },
            Err(err) => {
                debug!("Name resolution failed for {host}: {err}");
                return false;
            }
        };
        TcpStream::connect_timeout(&addr, self.timeout).is_ok()
    }
}

/// Thread-safe memo of "is host X reachable" for one run.
///
/// The first caller for a host performs the probe and stores the result;
/// later callers read it. Two workers asking for the same new host at the
/// same moment may both probe it. The probe is idempotent within a run, so
/// the duplicate only costs latency, and the first stored value wins.
/// Entries never expire.
pub struct ReachabilityCache {
    probe: Box<dyn HostProbe>,
    hosts: DashMap<String, bool>,
    probes: AtomicUsize,
}

impl ReachabilityCache {
    /// Create an empty cache around a probe.
    pub fn new(probe: impl HostProbe + 'static) -> Self {
        Self {
            probe: Box::new(probe),
            hosts: DashMap::new(),
            probes: AtomicUsize::new(0),
        }
    }

    /// Check a host, probing it on first use.
    pub fn is_reachable(&self, host: &str) -> bool {
        let key = host.to_ascii_lowercase();
        if let Some(cached) = self.hosts.get(&key) {
            return *cached;
        }

        self.probes.fetch_add(1, Ordering::Relaxed);
        let reachable = self.probe.probe(host);
        debug!("Probed {host}: reachable={reachable}");

        *self.hosts.entry(key).or_insert(reachable)
    }

    /// Check the host behind a path. Local paths are always reachable and
    /// never touch the cache.
    pub fn is_path_reachable(&self, path: &str) -> bool {
        match network_host(path) {
            Some(host) => self.is_reachable(host),
            None => true,
        }
    }

    /// Number of real probes performed so far.
    pub fn probes_performed(&self) -> usize {
        self.probes.load(Ordering::Relaxed)
    }

    /// Number of hosts cached.
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Check if no host has been probed.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl std::fmt::Debug for ReachabilityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReachabilityCache")
            .field("hosts", &self.hosts)
            .field("probes", &self.probes)
            .finish()
    }
}
