//! In-memory transaction ledger, most recent first.

use alloy_primitives::{Address, B256};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Buy,
    Sell,
    Transfer,
    Register,
    Bid,
    Stop,
    Create,
    Approve,
}

/// A submitted transaction. Written once, after its outcome is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionTicket {
    pub hash: B256,
    pub status: TxStatus,
    #[serde(rename = "type")]
    pub kind: TxKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<Address>,
}

impl TransactionTicket {
    pub fn new(hash: B256, status: TxStatus, kind: TxKind) -> Self {
        Self {
            hash,
            status,
            kind,
            amount: None,
            recipient: None,
        }
    }

    pub fn with_amount(mut self, amount: impl Into<String>) -> Self {
        self.amount = Some(amount.into());
        self
    }

    pub fn with_recipient(mut self, recipient: Address) -> Self {
        self.recipient = Some(recipient);
        self
    }
}

/// Bounded ledger. Oldest entries fall off the back.
pub struct TxLog {
    entries: Mutex<VecDeque<TransactionTicket>>,
    capacity: usize,
}

impl TxLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, ticket: TransactionTicket) {
        debug!(hash = %ticket.hash, kind = ?ticket.kind, status = ?ticket.status, "Recording transaction");
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push_front(ticket);
        entries.truncate(self.capacity);
    }

    /// Snapshot, most recent first.
    pub fn entries(&self) -> Vec<TransactionTicket> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
