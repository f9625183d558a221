use std::collections::HashMap;
use std::net::Ipv4Addr;

use crate::types::{FallbackSpec, LeaseRecord};

/// The process-wide allocation state: two indices over the same set of
/// records plus the fallback routes. Every operation that touches more
/// than one field must happen under the single lock the manager wraps
/// this in — never lock `by_ip` and `by_subdomain` separately.
#[derive(Debug, Default)]
pub struct AllocationTable {
    pub by_ip: HashMap<Ipv4Addr, LeaseRecord>,
    pub by_subdomain: HashMap<String, LeaseRecord>,
    pub fallback: HashMap<String, FallbackSpec>,
    pub pool: Vec<Ipv4Addr>,
}

impl AllocationTable {
    pub fn new(pool: Vec<Ipv4Addr>) -> Self {
        AllocationTable {
            by_ip: HashMap::new(),
            by_subdomain: HashMap::new(),
            fallback: HashMap::new(),
            pool,
        }
    }

    pub fn live(&self, subdomain: &str) -> Option<&LeaseRecord> {
        self.by_subdomain
            .get(subdomain)
            .filter(|r| r.is_live())
    }

    /// Picks a free or oldest-withdrawn IP per the selection policy: first
    /// unassigned address in pool order, else the withdrawn record with the
    /// smallest `withdrawn_at`.
    pub fn select_ip(&self) -> Option<Ipv4Addr> {
        for ip in &self.pool {
            if !self.by_ip.contains_key(ip) {
                return Some(*ip);
            }
        }

        self.by_ip
            .values()
            .filter(|r| !r.is_live())
            .min_by_key(|r| r.withdrawn_at)
            .map(|r| r.ip)
    }

    /// Installs `record` into both indices, overwriting whatever
    /// withdrawn record previously held the IP or subdomain.
    pub fn install(&mut self, record: LeaseRecord) {
        self.by_ip.insert(record.ip, record.clone());
        self.by_subdomain.insert(record.subdomain.clone(), record);
    }

    /// Stamps `withdrawn_at` on the record at `ip`, if one exists and is
    /// still live, propagating the same timestamp into `by_subdomain`.
    pub fn withdraw(&mut self, ip: Ipv4Addr, at: chrono::DateTime<chrono::Utc>) {
        if let Some(record) = self.by_ip.get_mut(&ip) {
            if record.is_live() {
                record.withdrawn_at = Some(at);
                let subdomain = record.subdomain.clone();
                if let Some(by_sub) = self.by_subdomain.get_mut(&subdomain) {
                    by_sub.withdrawn_at = Some(at);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, n)
    }

    #[test]
    fn select_ip_prefers_unassigned() {
        let table = AllocationTable::new(vec![addr(1), addr(2)]);
        assert_eq!(table.select_ip(), Some(addr(1)));
    }

    #[test]
    fn select_ip_falls_back_to_oldest_withdrawn() {
        let mut table = AllocationTable::new(vec![addr(1), addr(2)]);
        let mut a = LeaseRecord::new(addr(1), "a");
        let mut b = LeaseRecord::new(addr(2), "b");
        table.install(a.clone());
        table.install(b.clone());

        a.withdrawn_at = Some(chrono::Utc::now());
        table.by_ip.insert(addr(1), a);
        std::thread::sleep(std::time::Duration::from_millis(5));
        b.withdrawn_at = Some(chrono::Utc::now());
        table.by_ip.insert(addr(2), b);

        assert_eq!(table.select_ip(), Some(addr(1)));
    }

    #[test]
    fn withdraw_propagates_to_both_indices() {
        let mut table = AllocationTable::new(vec![addr(1)]);
        table.install(LeaseRecord::new(addr(1), "a"));
        let now = chrono::Utc::now();
        table.withdraw(addr(1), now);
        assert_eq!(table.by_ip[&addr(1)].withdrawn_at, Some(now));
        assert_eq!(table.by_subdomain["a"].withdrawn_at, Some(now));
    }
}
