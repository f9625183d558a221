use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::StartupError;

/// Checks that `/etc/resolver/<domain>` exists and contains exactly
/// `nameserver <host>\nport <port>\n`, matching `dns_listen`. macOS (and
/// compatible resolvers) read this file to route queries for `domain` to
/// Goblin instead of the system resolver.
pub fn check_resolver_file(domain: &str, dns_listen: SocketAddr) -> Result<(), StartupError> {
    let path = resolver_file_path(domain);
    let expected = expected_contents(dns_listen);

    let actual = std::fs::read_to_string(&path).map_err(|_| {
        StartupError::user_fixable(
            format!("missing resolver file at {}", path.display()),
            format!(
                "a custom DNS resolver is required to forward DNS requests to this server.\n\
                 create a file at {} with this content:\n\n{expected}",
                path.display()
            ),
        )
    })?;

    if actual.trim_end() != expected.trim_end() {
        return Err(StartupError::user_fixable(
            format!("resolver file at {} does not match", path.display()),
            format!(
                "the resolver file at {} does not match the expected content.\n\
                 replace it with:\n\n{expected}",
                path.display()
            ),
        ));
    }

    Ok(())
}

fn resolver_file_path(domain: &str) -> PathBuf {
    PathBuf::from("/etc/resolver").join(domain)
}

fn expected_contents(dns_listen: SocketAddr) -> String {
    format!("nameserver {}\nport {}\n", dns_listen.ip(), dns_listen.port())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_contents_format() {
        let addr: SocketAddr = "127.0.0.1:5053".parse().unwrap();
        assert_eq!(expected_contents(addr), "nameserver 127.0.0.1\nport 5053\n");
    }

    #[test]
    fn missing_file_is_user_fixable() {
        // /etc/resolver/goblin-nonexistent-test-domain should never exist
        let err = check_resolver_file(
            "goblin-nonexistent-test-domain",
            "127.0.0.1:5053".parse().unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, StartupError::UserFixable { .. }));
        assert!(err.instructions().unwrap().contains("/etc/resolver"));
    }
}
