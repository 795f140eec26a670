use std::sync::Arc;

use chrono::Utc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod exporter;
pub mod health;
pub mod http_probe;
pub mod monitor;
pub mod server;
pub mod snapshot;

use config::load_config;
use http_probe::prelude::*;
use http_probe::report;
use server::AppState;
use snapshot::SnapshotStore;

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_logging();

    let program_start_time = Utc::now();
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", report(&e));
            std::process::exit(2);
        }
    };

    log::info!("Starting monitoring for URL: {}", config.target_url);
    log::info!("Check interval: {:?}", config.check_interval);
    log::info!("Server port: {}", config.port);
    log::info!(
        "Request timeout: {:?} (connect: {:?})",
        config.request_timeout,
        config.connect_timeout
    );
    for (scheme, proxy) in [("http", &config.proxy.http), ("https", &config.proxy.https)] {
        if let Some(proxy) = proxy {
            let host = proxy.host_str().unwrap_or_default();
            match proxy.port_or_known_default() {
                Some(port) => log::info!("Using proxy for {scheme} targets: {host}:{port}"),
                None => log::info!("Using proxy for {scheme} targets: {host}"),
            }
        }
    }

    let prober = match Prober::new(config.probe_settings()) {
        Ok(prober) => prober,
        Err(e) => {
            log::error!("Failed to set up TLS: {}", report(&e));
            std::process::exit(1);
        }
    };

    let listen = config.listen_addr();
    let listener = match TcpListener::bind(listen).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Server error: failed to bind {listen}: {e}");
            std::process::exit(1);
        }
    };
    log::info!("Starting server on {listen}");

    let store = Arc::new(SnapshotStore::new(program_start_time));
    let shutdown = CancellationToken::new();

    let monitor = tokio::spawn(monitor::run(
        prober,
        store.clone(),
        config.check_interval,
        shutdown.clone(),
    ));

    let state = AppState {
        store,
        target_url: Arc::from(config.target_url.as_str()),
        check_interval: config.check_interval,
    };
    let server = tokio::spawn(server::serve(
        listener,
        state,
        shutdown.clone(),
        config.shutdown_grace,
    ));

    shutdown_signal().await;
    shutdown.cancel();

    if let Err(e) = server.await {
        log::error!("Server task failed: {e}");
    }
    // a probe may still be running; it is bounded by the request timeout
    match tokio::time::timeout(config.shutdown_grace, monitor).await {
        Ok(Err(e)) => log::error!("Monitor task failed: {e}"),
        Err(_) => log::warn!("Monitor did not stop within {:?}", config.shutdown_grace),
        Ok(Ok(())) => {}
    }

    log::info!("Server stopped gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("Signal received, shutting down");
}
