//! GymBid headless client: tracks a node-backed wallet and keeps the
//! auction directory, profile and balances current.

use gymbid_client::metrics::METRICS;
use gymbid_client::{AppState, Config, HttpProvider, TracingNotifier, WalletProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting GymBid client");

    let config = Config::load().unwrap_or_else(|e| {
        // Fall back only when no config exists; malformed values fail hard.
        let err_str = e.to_string();
        if err_str.contains("not found") || err_str.contains("missing field") {
            warn!(error = %e, "No config file found, using defaults");
            Config::default()
        } else {
            error!(error = %e, "FATAL: Config error, fix GYMBID_* env vars or gymbid.toml");
            std::process::exit(1);
        }
    });

    info!(
        rpc = %config.rpc_url,
        auction = %config.auction_address,
        coin = %config.coin_address,
        profiles = %config.profiles_address,
        "Configuration loaded"
    );

    let provider = Arc::new(HttpProvider::new(&config.rpc_url)?);
    let event_poll = Duration::from_millis(config.event_poll_ms);
    let state = Arc::new(AppState::new(
        config,
        Some(provider.clone() as Arc<dyn WalletProvider>),
        Arc::new(TracingNotifier),
    ));

    state.start().await?;
    let snapshot = state.session.snapshot();
    info!(
        account = ?snapshot.account,
        chain_id = ?snapshot.chain_id,
        auctions = state.directory.len(),
        "Client ready"
    );

    let cancel = CancellationToken::new();

    let poller = {
        let provider = provider.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { provider.watch_changes(event_poll, cancel).await })
    };
    let events = {
        let state = Arc::clone(&state);
        let cancel = cancel.clone();
        tokio::spawn(async move { state.run_wallet_events(cancel).await })
    };
    let refresher = {
        let state = Arc::clone(&state);
        let cancel = cancel.clone();
        tokio::spawn(async move { state.run_refresher(cancel).await })
    };

    shutdown_signal().await;

    // --- Graceful shutdown: stop background loops ---
    cancel.cancel();
    for (name, task) in [("poller", poller), ("events", events), ("refresher", refresher)] {
        if let Err(e) = task.await {
            error!(task = name, error = %e, "Background task failed");
        }
    }

    info!(
        metrics = %METRICS.render(state.directory.len(), state.tx_log.len()),
        "GymBid client shut down gracefully"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
