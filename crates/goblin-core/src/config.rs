use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StartupError;

fn default_domain() -> String {
    "goblin".to_string()
}

fn default_http_listen() -> SocketAddr {
    "127.0.0.1:8080".parse().unwrap()
}

fn default_dns_listen() -> SocketAddr {
    "127.0.0.1:5053".parse().unwrap()
}

#[cfg(target_os = "macos")]
fn default_interface() -> String {
    "lo0".to_string()
}

#[cfg(not(target_os = "macos"))]
fn default_interface() -> String {
    "lo".to_string()
}

fn default_cidr() -> String {
    "10.0.0.0/8".to_string()
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_listen")]
    pub listen: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            listen: default_http_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default = "default_dns_listen")]
    pub listen: SocketAddr,
}

impl Default for DnsConfig {
    fn default() -> Self {
        DnsConfig {
            listen: default_dns_listen(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasPoolConfig {
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_cidr")]
    pub cidr: String,
}

impl Default for AliasPoolConfig {
    fn default() -> Self {
        AliasPoolConfig {
            interface: default_interface(),
            cidr: default_cidr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            format: default_format(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub alias_pool: AliasPoolConfig,
    #[serde(default)]
    pub fallback_routes_file: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            domain: default_domain(),
            http: HttpConfig::default(),
            dns: DnsConfig::default(),
            alias_pool: AliasPoolConfig::default(),
            fallback_routes_file: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StartupError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| StartupError::Config(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.domain, "goblin");
        assert_eq!(cfg.http.listen, default_http_listen());
        assert_eq!(cfg.dns.listen, default_dns_listen());
        assert_eq!(cfg.alias_pool.cidr, "10.0.0.0/8");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.logging.format, "text");
        assert!(cfg.fallback_routes_file.is_none());
    }

    #[test]
    fn overrides_from_toml() {
        let toml = r#"
            domain = "example"
            fallback_routes_file = "/etc/goblin/fallback.json"

            [http]
            listen = "0.0.0.0:9090"

            [alias_pool]
            interface = "lo"
            cidr = "10.99.0.0/16"

            [logging]
            level = "debug"
            format = "json"
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert_eq!(cfg.domain, "example");
        assert_eq!(cfg.http.listen, "0.0.0.0:9090".parse().unwrap());
        assert_eq!(cfg.alias_pool.interface, "lo");
        assert_eq!(cfg.alias_pool.cidr, "10.99.0.0/16");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.logging.format, "json");
        assert_eq!(
            cfg.fallback_routes_file,
            Some(PathBuf::from("/etc/goblin/fallback.json"))
        );
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goblin.toml");
        std::fs::write(&path, "domain = \"test\"\n").unwrap();
        let cfg = Config::from_file(&path).unwrap();
        assert_eq!(cfg.domain, "test");
    }

    #[test]
    fn from_file_missing_is_io_error() {
        let err = Config::from_file("/nonexistent/path/goblin.toml").unwrap_err();
        assert!(matches!(err, StartupError::Io(_)));
    }
}
