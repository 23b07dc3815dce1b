//! Process-wide counters (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Transactions ---
    pub tx_submitted: AtomicU64,
    pub tx_confirmed: AtomicU64,
    pub tx_failed: AtomicU64,
    pub estimate_failures: AtomicU64,
    pub preflight_rejections: AtomicU64,

    // --- Directory ---
    pub refreshes: AtomicU64,
    pub refresh_failures: AtomicU64,
    pub refresh_item_failures: AtomicU64,

    // --- Wallet ---
    pub wallet_events: AtomicU64,
    pub reloads: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            tx_submitted: AtomicU64::new(0),
            tx_confirmed: AtomicU64::new(0),
            tx_failed: AtomicU64::new(0),
            estimate_failures: AtomicU64::new(0),
            preflight_rejections: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
            refresh_item_failures: AtomicU64::new(0),
            wallet_events: AtomicU64::new(0),
            reloads: AtomicU64::new(0),
        }
    }

    /// Bump the counter matching a pipeline failure.
    pub fn record_failure(&self, err: &crate::Error) {
        let counter = match err {
            crate::Error::Preflight(_) | crate::Error::MissingWallet => &self.preflight_rejections,
            crate::Error::Estimation(_) => &self.estimate_failures,
            crate::Error::Submission { .. } => &self.tx_failed,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// One-line `key=value` snapshot for periodic log output.
    pub fn render(&self, auctions: usize, tx_log_len: usize) -> String {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        format!(
            "auctions={auctions} tx_log={tx_log_len} \
tx_submitted={} tx_confirmed={} tx_failed={} estimate_failures={} preflight_rejections={} \
refreshes={} refresh_failures={} refresh_item_failures={} wallet_events={} reloads={}",
            load(&self.tx_submitted),
            load(&self.tx_confirmed),
            load(&self.tx_failed),
            load(&self.estimate_failures),
            load(&self.preflight_rejections),
            load(&self.refreshes),
            load(&self.refresh_failures),
            load(&self.refresh_item_failures),
            load(&self.wallet_events),
            load(&self.reloads),
        )
    }
}
