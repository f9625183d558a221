use std::net::SocketAddr;
use std::sync::Arc;

use goblin_core::LeaseManager;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::handler::handle_query;

pub struct DnsServer {
    listen_addr: SocketAddr,
    domain: String,
    manager: LeaseManager,
}

impl DnsServer {
    pub fn new(listen_addr: SocketAddr, domain: impl Into<String>, manager: LeaseManager) -> Self {
        DnsServer {
            listen_addr,
            domain: domain.into(),
            manager,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let socket = Arc::new(UdpSocket::bind(self.listen_addr).await?);
        info!(addr = %self.listen_addr, domain = %self.domain, "dns responder listening");

        let domain = Arc::new(self.domain);
        let manager = self.manager;
        let mut buf = vec![0u8; 512];

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buf) => {
                    let (len, src) = match result {
                        Ok(v) => v,
                        Err(e) => {
                            error!(error = %e, "dns socket recv error");
                            continue;
                        }
                    };
                    let data = buf[..len].to_vec();
                    let socket = socket.clone();
                    let domain = domain.clone();
                    let manager = manager.clone();
                    tokio::spawn(async move {
                        if let Some(reply) = handle_query(&data, &domain, &manager).await {
                            if let Err(e) = socket.send_to(&reply, src).await {
                                warn!(%src, error = %e, "failed to send dns reply");
                            }
                        }
                    });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("dns responder stopped");
        Ok(())
    }
}
