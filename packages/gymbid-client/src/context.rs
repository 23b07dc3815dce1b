//! Dependencies shared by every pipeline, injected at construction.

use crate::config::Config;
use crate::gateway::Chain;
use crate::metrics::METRICS;
use crate::notify::{NoticeKind, Notifier};
use crate::tx_log::{TransactionTicket, TxKind, TxLog, TxStatus};
use crate::wallet::WalletSession;
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct Context {
    pub config: Arc<Config>,
    pub session: Arc<WalletSession>,
    pub chain: Arc<dyn Chain>,
    pub notifier: Arc<dyn Notifier>,
    pub tx_log: Arc<TxLog>,
}

impl Context {
    pub fn notify(&self, message: &str, kind: NoticeKind) {
        self.notifier.notify(message, kind);
    }

    /// Log a confirmed transaction and tell the user.
    pub(crate) fn record_success(&self, ticket: TransactionTicket, message: &str) {
        self.tx_log.record(ticket);
        self.notify(message, NoticeKind::Success);
    }

    /// Report a failed flow once. Submitted-but-failed transactions are
    /// logged with their hash; nothing is logged for pre-submission failures.
    pub(crate) fn report_failure(&self, kind: TxKind, err: &crate::Error) {
        METRICS.record_failure(err);
        if let Some(hash) = err.tx_hash() {
            self.tx_log
                .record(TransactionTicket::new(hash, TxStatus::Failed, kind));
        }
        warn!(kind = ?kind, error = %err, "Transaction flow failed");
        self.notify(&err.to_string(), NoticeKind::Error);
    }
}
