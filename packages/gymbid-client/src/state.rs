//! Composition root: builds every component with explicit dependencies and
//! routes wallet notifications to them.

use crate::auctions::{AuctionDirectory, BidPipeline, LifecyclePipeline};
use crate::config::Config;
use crate::context::Context;
use crate::exchange::ExchangePipeline;
use crate::gateway::{Chain, ContractGateway};
use crate::metrics::METRICS;
use crate::notify::{NoticeKind, Notifier};
use crate::profiles::ProfileDirectory;
use crate::tx_log::TxLog;
use crate::wallet::{SessionChange, WalletEvent, WalletProvider, WalletSession};
use alloy_primitives::Address;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared application state.
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<WalletSession>,
    pub chain: Arc<dyn Chain>,
    pub notifier: Arc<dyn Notifier>,
    pub tx_log: Arc<TxLog>,
    pub directory: Arc<AuctionDirectory>,
    pub bids: BidPipeline,
    pub lifecycle: LifecyclePipeline,
    pub exchange: ExchangePipeline,
    pub profiles: ProfileDirectory,
    pub start_time: Instant,
    reloads: AtomicU64,
}

impl AppState {
    /// Wire the JSON-RPC gateway to `provider`. `None` means no wallet.
    pub fn new(
        config: Config,
        provider: Option<Arc<dyn WalletProvider>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let session = Arc::new(WalletSession::new(provider));
        let chain: Arc<dyn Chain> = Arc::new(ContractGateway::new(session.clone(), &config));
        Self::with_chain(config, session, chain, notifier)
    }

    /// Wire an arbitrary chain implementation.
    pub fn with_chain(
        config: Config,
        session: Arc<WalletSession>,
        chain: Arc<dyn Chain>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let config = Arc::new(config);
        let ctx = Context {
            config: config.clone(),
            session: session.clone(),
            chain: chain.clone(),
            notifier: notifier.clone(),
            tx_log: Arc::new(TxLog::new(config.tx_log_capacity)),
        };
        let directory = Arc::new(AuctionDirectory::new(ctx.clone()));

        Self {
            bids: BidPipeline::new(ctx.clone(), directory.clone()),
            lifecycle: LifecyclePipeline::new(ctx.clone(), directory.clone()),
            exchange: ExchangePipeline::new(ctx.clone()),
            profiles: ProfileDirectory::new(ctx.clone()),
            tx_log: ctx.tx_log,
            directory,
            config,
            session,
            chain,
            notifier,
            start_time: Instant::now(),
            reloads: AtomicU64::new(0),
        }
    }

    /// Adopt an existing wallet authorization and load dependent state.
    ///
    /// A missing wallet is reported once here and returned; other probe
    /// failures are logged and leave the session disconnected.
    pub async fn start(&self) -> Result<(), crate::Error> {
        match self.session.probe().await {
            Ok(Some(account)) => info!(account = %account, "Session restored"),
            Ok(None) => info!("No existing wallet authorization"),
            Err(crate::Error::MissingWallet) => {
                warn!("No wallet provider available");
                self.notifier
                    .notify(&crate::Error::MissingWallet.to_string(), NoticeKind::Error);
                return Err(crate::Error::MissingWallet);
            }
            Err(e) => warn!(error = %e, "Error checking wallet connection"),
        }
        self.refresh_dependents().await;
        Ok(())
    }

    /// Prompt the wallet, then load dependent state for the new account.
    pub async fn connect(&self) -> Result<Address, crate::Error> {
        match self.session.connect().await {
            Ok(account) => {
                self.notifier.notify("Wallet connected", NoticeKind::Success);
                self.refresh_dependents().await;
                Ok(account)
            }
            Err(e) => {
                self.notifier.notify(&e.to_string(), NoticeKind::Error);
                Err(e)
            }
        }
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
        self.clear_dependents();
        self.notifier.notify("Wallet disconnected", NoticeKind::Info);
    }

    /// Number of full reloads since construction.
    pub fn reload_count(&self) -> u64 {
        self.reloads.load(Ordering::Relaxed)
    }

    // --- Wallet notifications ---

    pub async fn handle_wallet_event(&self, event: WalletEvent) -> SessionChange {
        METRICS.wallet_events.fetch_add(1, Ordering::Relaxed);
        let change = match &event {
            WalletEvent::AccountsChanged(accounts) => self.session.on_accounts_changed(accounts),
            WalletEvent::ChainChanged(chain_id) => self.session.on_chain_changed(*chain_id),
        };
        debug!(event = ?event, change = ?change, "Wallet event");

        match change {
            SessionChange::Unchanged => {}
            SessionChange::Disconnected => self.clear_dependents(),
            SessionChange::AccountChanged(_) => self.refresh_dependents().await,
            SessionChange::ReloadRequired => self.reload().await,
        }
        change
    }

    /// Drop every piece of derived state and rebuild it from the wallet and
    /// chain. In-flight pipelines are not waited for.
    pub async fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::Relaxed);
        METRICS.reloads.fetch_add(1, Ordering::Relaxed);
        info!("Reloading all wallet-dependent state");

        self.clear_dependents();
        if let Err(e) = self.session.probe().await {
            warn!(error = %e, "Wallet probe during reload failed");
        }
        self.refresh_dependents().await;
    }

    /// Refresh directories and balances for the current session.
    pub async fn refresh_dependents(&self) {
        if !self.session.snapshot().is_connected() {
            self.clear_dependents();
            return;
        }
        // Failures are already logged and reported by each component.
        let _ = self.directory.refresh().await;
        self.profiles.refresh_current().await;
        self.exchange.refresh_balances().await;
        let _ = self.exchange.load_rates().await;
    }

    fn clear_dependents(&self) {
        self.directory.clear();
        self.profiles.clear();
        self.exchange.clear();
    }

    // --- Background loops ---

    /// Apply wallet notifications until cancelled or the provider goes away.
    pub async fn run_wallet_events(&self, cancel: CancellationToken) {
        let mut events = match self.session.provider() {
            Ok(provider) => provider.subscribe(),
            Err(_) => return,
        };
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Wallet event loop shutting down");
                    return;
                }
                event = events.recv() => match event {
                    Ok(event) => {
                        self.handle_wallet_event(event).await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Wallet events dropped, reloading");
                        self.reload().await;
                    }
                    Err(RecvError::Closed) => {
                        info!("Wallet event stream closed");
                        return;
                    }
                },
            }
        }
    }

    /// Periodic refresh, logging a metrics line after each pass.
    pub async fn run_refresher(&self, cancel: CancellationToken) {
        let interval = Duration::from_secs(self.config.refresh_interval_secs);
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {},
                _ = cancel.cancelled() => {
                    info!("Refresher shutting down");
                    return;
                }
            }

            self.refresh_dependents().await;
            info!(
                uptime_secs = self.start_time.elapsed().as_secs(),
                metrics = %METRICS.render(self.directory.len(), self.tx_log.len()),
                "Refresh pass complete"
            );
        }
    }
}
