use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use goblin_api::ApiServer;
use goblin_core::{Config, LeaseManager, StartupError};
use goblin_dns::DnsServer;
use goblin_proxy::HttpProxySupervisor;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "goblin", about = "Local DNS aliasing and port-sharing for developer machines")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/goblin/goblin.toml")]
    config: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if let Some(instructions) = e.instructions() {
                eprintln!("{instructions}");
            } else {
                eprintln!("goblin: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let config = Config::from_file(&cli.config)?;

    init_logging(&config.logging);

    info!(domain = %config.domain, "starting goblin");

    goblin_core::preflight::check_resolver_file(&config.domain, config.dns.listen)?;
    let pool = goblin_core::alias_pool::discover(&config.alias_pool)?;
    info!(count = pool.len(), "alias pool discovered");

    // Root of every lease's lifetime token. Cancelling it on shutdown
    // stamps `withdrawn_at` on every outstanding lease (plain or proxy
    // fallback) and ends any parked `/allocate` response body, so held
    // connections actually close instead of stalling graceful shutdown.
    let shutdown_token = CancellationToken::new();

    let proxy_supervisor = Arc::new(HttpProxySupervisor::new());
    let manager = LeaseManager::new(pool, proxy_supervisor, shutdown_token.clone());

    if let Some(ref path) = config.fallback_routes_file {
        let routes = goblin_core::fallback::load(path)?;
        for (subdomain, spec) in routes {
            manager.register_fallback(&subdomain, spec).await;
        }
        info!(path = %path.display(), "fallback routes loaded");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let dns_server = DnsServer::new(config.dns.listen, config.domain.clone(), manager.clone());
    let dns_rx = shutdown_rx.clone();
    let mut dns_task = tokio::spawn(async move { dns_server.run(dns_rx).await });

    let api_server = ApiServer::new(config.http.listen, manager.clone(), shutdown_token.clone());
    let api_rx = shutdown_rx.clone();
    let mut api_task = tokio::spawn(async move { api_server.run(api_rx).await });

    // A listener exiting on its own (e.g. a bind failure) before shutdown is
    // requested is fatal: the other listener is stopped and its error
    // propagates out so `main` exits non-zero.
    tokio::select! {
        result = &mut dns_task => {
            shutdown_token.cancel();
            return Err(fatal_listener_error("dns responder", result));
        }
        result = &mut api_task => {
            shutdown_token.cancel();
            return Err(fatal_listener_error("http control surface", result));
        }
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(StartupError::Io)?;
            info!("shutdown signal received, stopping services...");
        }
    }

    shutdown_token.cancel();
    let _ = shutdown_tx.send(true);
    let _ = dns_task.await;
    let _ = api_task.await;

    info!("goblin stopped");
    Ok(())
}

fn fatal_listener_error(
    name: &str,
    result: Result<anyhow::Result<()>, tokio::task::JoinError>,
) -> StartupError {
    let message = match result {
        Ok(Ok(())) => format!("{name} stopped unexpectedly"),
        Ok(Err(e)) => format!("{name} error: {e}"),
        Err(e) => format!("{name} task panicked: {e}"),
    };
    error!("{message}");
    StartupError::Config(message)
}

fn init_logging(config: &goblin_core::config::LoggingConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format.as_str() {
        "json" => {
            tracing_subscriber::fmt().with_env_filter(filter).json().init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
