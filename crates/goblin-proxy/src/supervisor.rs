use std::net::{Ipv4Addr, SocketAddr};

use async_trait::async_trait;
use axum::routing::any;
use axum::Router;
use goblin_core::ProxySupervisor;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::proxy::{forward, Upstream};

/// Binds one axum listener per `Proxy` fallback port, each forwarding to
/// the configured upstream host. This is the concrete implementation the
/// binary wires into `goblin-core`'s `LeaseManager`.
pub struct HttpProxySupervisor {
    client: reqwest::Client,
}

impl HttpProxySupervisor {
    pub fn new() -> Self {
        HttpProxySupervisor {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpProxySupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProxySupervisor for HttpProxySupervisor {
    async fn bind(&self, lease_ip: Ipv4Addr, hostname: &str, ports: &[u16], stop: CancellationToken) {
        for &port in ports {
            let upstream = Upstream {
                client: self.client.clone(),
                host: hostname.to_string(),
                port,
            };
            let listen_addr = SocketAddr::from((lease_ip, port));
            let stop = stop.clone();
            let hostname = hostname.to_string();

            tokio::spawn(async move {
                let app = Router::new().fallback(any(forward)).with_state(upstream);

                let listener = match tokio::net::TcpListener::bind(listen_addr).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        error!(%listen_addr, error = %e, "failed to bind proxy listener");
                        return;
                    }
                };
                info!(%listen_addr, upstream = %hostname, port, "reverse proxy listening");

                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move { stop.cancelled().await })
                    .await;

                if let Err(e) = result {
                    warn!(%listen_addr, error = %e, "reverse proxy server error");
                }
            });
        }
    }
}
