pub mod rest;

use std::net::SocketAddr;

use goblin_core::LeaseManager;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub manager: LeaseManager,
    /// Root shutdown token. Every `/allocate` lease derives a child of this
    /// so shutdown both stamps `withdrawn_at` on held leases and ends their
    /// parked response bodies, letting graceful shutdown actually complete.
    pub shutdown: CancellationToken,
}

pub struct ApiServer {
    listen_addr: SocketAddr,
    manager: LeaseManager,
    shutdown: CancellationToken,
}

impl ApiServer {
    pub fn new(listen_addr: SocketAddr, manager: LeaseManager, shutdown: CancellationToken) -> Self {
        ApiServer {
            listen_addr,
            manager,
            shutdown,
        }
    }

    pub async fn run(self, shutdown_rx: watch::Receiver<bool>) -> anyhow::Result<()> {
        let state = AppState {
            manager: self.manager,
            shutdown: self.shutdown,
        };

        let app = rest::router().with_state(state);

        let listener = tokio::net::TcpListener::bind(self.listen_addr).await?;
        info!(addr = %self.listen_addr, "http control surface listening");

        let mut shutdown_rx = shutdown_rx;
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.changed().await;
            })
            .await?;

        Ok(())
    }
}
