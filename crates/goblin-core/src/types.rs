use std::net::Ipv4Addr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// A single allocated alias IP bound to a subdomain.
///
/// `stop`, when present, is the fallback-scoped token that also tears down
/// the reverse-proxy servers backing a `Proxy` fallback; it is invoked
/// after `withdrawn_at` is stamped. Plain leases (acquired straight from
/// the HTTP control surface) never have one.
#[derive(Debug, Clone)]
pub struct LeaseRecord {
    pub ip: Ipv4Addr,
    pub subdomain: String,
    pub withdrawn_at: Option<DateTime<Utc>>,
    pub stop: Option<CancellationToken>,
}

impl LeaseRecord {
    pub fn new(ip: Ipv4Addr, subdomain: impl Into<String>) -> Self {
        LeaseRecord {
            ip,
            subdomain: subdomain.into(),
            withdrawn_at: None,
            stop: None,
        }
    }

    pub fn is_live(&self) -> bool {
        self.withdrawn_at.is_none()
    }
}

/// One entry from the fallback routes file, for subdomains with no active
/// lease. Plain strings decode as `Resolve`; objects decode as `Proxy`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FallbackSpec {
    Proxy { hostname: String, ports: Vec<u16> },
    Resolve(String),
}
