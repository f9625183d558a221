use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LeaseError;
use crate::table::AllocationTable;
use crate::types::{FallbackSpec, LeaseRecord};

/// Binds reverse proxies for `Proxy` fallback entries. Implemented by
/// `goblin-proxy`; injected here so this crate never depends on an HTTP
/// client or server.
#[async_trait]
pub trait ProxySupervisor: Send + Sync + 'static {
    /// Starts one reverse-proxy listener per port in `ports`, each bound to
    /// `lease_ip:port` and forwarding to `hostname:port`. Every listener
    /// shuts down when `stop` is cancelled. Errors from an individual
    /// listener are logged by the implementation, not returned here.
    async fn bind(&self, lease_ip: Ipv4Addr, hostname: &str, ports: &[u16], stop: CancellationToken);
}

/// A `ProxySupervisor` that does nothing, for configurations or tests that
/// never register a `Proxy` fallback.
pub struct NoProxySupervisor;

#[async_trait]
impl ProxySupervisor for NoProxySupervisor {
    async fn bind(&self, _lease_ip: Ipv4Addr, hostname: &str, _ports: &[u16], _stop: CancellationToken) {
        warn!(%hostname, "proxy fallback configured but no proxy supervisor wired in");
    }
}

/// Owns the allocation table and drives every lease state transition.
#[derive(Clone)]
pub struct LeaseManager {
    table: Arc<Mutex<AllocationTable>>,
    proxy: Arc<dyn ProxySupervisor>,
    shutdown: CancellationToken,
}

impl LeaseManager {
    /// `shutdown` is the process-wide root token. Every lease observer this
    /// manager spawns is ultimately driven by a descendant of it, so a
    /// single `shutdown.cancel()` releases every outstanding lease.
    pub fn new(pool: Vec<Ipv4Addr>, proxy: Arc<dyn ProxySupervisor>, shutdown: CancellationToken) -> Self {
        LeaseManager {
            table: Arc::new(Mutex::new(AllocationTable::new(pool))),
            proxy,
            shutdown,
        }
    }

    /// Allocates a fresh IP for `subdomain`, bound to `lifetime_token`.
    /// Fails with `SubdomainInUse` if a live record already owns the
    /// subdomain, or `NoAvailableIPs` if the pool is exhausted.
    pub async fn acquire(
        &self,
        subdomain: &str,
        lifetime_token: CancellationToken,
    ) -> Result<Ipv4Addr, LeaseError> {
        self.install_and_observe(subdomain, lifetime_token, None)
            .await
    }

    async fn install_and_observe(
        &self,
        subdomain: &str,
        lifetime_token: CancellationToken,
        stop: Option<CancellationToken>,
    ) -> Result<Ipv4Addr, LeaseError> {
        let ip = {
            let mut table = self.table.lock().await;
            if table.live(subdomain).is_some() {
                return Err(LeaseError::SubdomainInUse);
            }
            let ip = table.select_ip().ok_or(LeaseError::NoAvailableIPs)?;

            let mut record = LeaseRecord::new(ip, subdomain);
            record.stop = stop.clone();
            table.install(record);
            ip
        };

        info!(%subdomain, %ip, "lease acquired");
        self.spawn_observer(ip, lifetime_token, stop);
        Ok(ip)
    }

    fn spawn_observer(&self, ip: Ipv4Addr, lifetime_token: CancellationToken, stop: Option<CancellationToken>) {
        let table = self.table.clone();
        tokio::spawn(async move {
            lifetime_token.cancelled().await;
            let now = chrono::Utc::now();
            {
                let mut table = table.lock().await;
                table.withdraw(ip, now);
            }
            if let Some(stop) = stop {
                stop.cancel();
            }
            debug!(%ip, "lease withdrawn");
        });
    }

    /// Idempotent; replaces any existing fallback spec for `subdomain`.
    /// Does not touch live leases.
    pub async fn register_fallback(&self, subdomain: &str, spec: FallbackSpec) {
        let mut table = self.table.lock().await;
        table.fallback.insert(subdomain.to_string(), spec);
    }

    /// Pure lookup used by the DNS responder: returns the live record's IP
    /// if one exists, otherwise consults the fallback table.
    pub async fn resolve(&self, subdomain: &str) -> Result<Ipv4Addr, LeaseError> {
        let (live_ip, fallback) = {
            let table = self.table.lock().await;
            let live_ip = table.live(subdomain).map(|r| r.ip);
            let fallback = table.fallback.get(subdomain).cloned();
            (live_ip, fallback)
        };

        if let Some(ip) = live_ip {
            return Ok(ip);
        }

        match fallback {
            Some(FallbackSpec::Resolve(host)) => self.resolve_host(&host).await,
            Some(FallbackSpec::Proxy { hostname, ports }) => {
                self.resolve_proxy(subdomain, &hostname, &ports).await
            }
            None => Err(LeaseError::NoRecord),
        }
    }

    async fn resolve_host(&self, host: &str) -> Result<Ipv4Addr, LeaseError> {
        if let Ok(ip) = Ipv4Addr::from_str(host) {
            return Ok(ip);
        }

        let target = format!("{host}:0");
        let addrs = tokio::net::lookup_host(&target)
            .await
            .map_err(|_| LeaseError::NoRecord)?;
        let result = addrs
            .filter_map(|addr: SocketAddr| match addr.ip() {
                std::net::IpAddr::V4(v4) => Some(v4),
                std::net::IpAddr::V6(_) => None,
            })
            .next()
            .ok_or(LeaseError::NoRecord);
        result
    }

    async fn resolve_proxy(
        &self,
        subdomain: &str,
        hostname: &str,
        ports: &[u16],
    ) -> Result<Ipv4Addr, LeaseError> {
        {
            let table = self.table.lock().await;
            if let Some(record) = table.live(subdomain) {
                return Ok(record.ip);
            }
        }

        let fallback_token = self.shutdown.child_token();
        let ip = match self
            .install_and_observe(subdomain, fallback_token.clone(), Some(fallback_token.clone()))
            .await
        {
            Ok(ip) => ip,
            Err(LeaseError::SubdomainInUse) => {
                // Lost the race: another call installed the record between
                // our live-check above and `install_and_observe`'s own.
                // `resolve` never surfaces `SubdomainInUse` (only `acquire`
                // does), so hand back the winner's IP instead.
                let table = self.table.lock().await;
                return table.live(subdomain).map(|r| r.ip).ok_or(LeaseError::NoRecord);
            }
            Err(e) => return Err(e),
        };

        self.proxy
            .bind(ip, hostname, ports, fallback_token)
            .await;

        Ok(ip)
    }
}
