use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use pnet::ipnetwork::IpNetwork;

use crate::config::AliasPoolConfig;
use crate::error::StartupError;

/// Enumerates every IPv4 address currently bound to the configured
/// interface that falls inside the configured CIDR. The result seeds the
/// lease manager's allocation pool at startup.
///
/// A real developer machine needs aliases added out-of-band (`ifconfig lo0
/// alias 10.0.0.1/8` on macOS, `ip addr add ... dev lo` on Linux); this
/// function only discovers what's already there.
pub fn discover(cfg: &AliasPoolConfig) -> Result<Vec<Ipv4Addr>, StartupError> {
    let cidr = Ipv4Net::from_str(&cfg.cidr)
        .map_err(|e| StartupError::Config(format!("invalid alias_pool.cidr {}: {e}", cfg.cidr)))?;

    let iface = pnet::datalink::interfaces()
        .into_iter()
        .find(|i| i.name == cfg.interface);

    let iface = match iface {
        Some(iface) => iface,
        None => {
            return Err(StartupError::user_fixable(
                format!("no such network interface: {}", cfg.interface),
                format!(
                    "create the loopback alias interface, e.g. on macOS:\n  \
                     sudo ifconfig {} alias {} up\nor on Linux:\n  \
                     sudo ip addr add {} dev {}",
                    cfg.interface, cidr, cidr, cfg.interface
                ),
            ));
        }
    };

    let mut ips: Vec<Ipv4Addr> = iface
        .ips
        .into_iter()
        .filter_map(|ip| match ip {
            IpNetwork::V4(net) => Some(net.ip()),
            _ => None,
        })
        .filter(|ip| cidr.contains(ip))
        .collect();

    if ips.is_empty() {
        return Err(StartupError::user_fixable(
            format!(
                "no addresses in {} bound to interface {}",
                cfg.cidr, cfg.interface
            ),
            format!(
                "add at least one alias address in {} to {}, e.g.:\n  \
                 sudo ifconfig {} alias 10.0.0.1 up",
                cfg.cidr, cfg.interface, cfg.interface
            ),
        ));
    }

    ips.sort();
    Ok(ips)
}
