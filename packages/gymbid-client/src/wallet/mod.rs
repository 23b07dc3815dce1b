//! Wallet provider interface and session tracking.
//!
//! [`WalletProvider`] is the EIP-1193 surface the client consumes: a single
//! `request(method, params)` entry point plus account/chain change
//! notifications. [`WalletSession`] is the only owner of connection state.

mod http;
mod session;

pub use http::HttpProvider;
pub use session::{ConnectionState, SessionChange, SessionSnapshot, Signer, WalletSession};

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tokio::sync::broadcast;

/// EIP-1193 code for a user-declined request.
pub const USER_REJECTED_CODE: i64 = 4001;
/// Internal JSON-RPC error; wallets use it for denied account access.
pub const INTERNAL_ERROR_CODE: i64 = -32603;
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Notification pushed by the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<Address>),
    ChainChanged(u64),
}

/// JSON-RPC / EIP-1193 error object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ProviderError {
    /// Error raised locally when the transport itself fails.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            code: INTERNAL_ERROR_CODE,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED_CODE
    }

    /// Most specific human-readable reason: `data.message` when the node
    /// provides one, otherwise the top-level message.
    pub fn reason(&self) -> String {
        self.data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .map(|m| format!("Contract error: {m}"))
            .unwrap_or_else(|| self.message.clone())
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for crate::Error {
    fn from(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            crate::Error::UserRejected
        } else {
            crate::Error::Rpc(err.to_string())
        }
    }
}

/// Injected wallet handle. Substituted by a scripted double in tests.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Raw EIP-1193 request.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Subscribe to account/chain change notifications.
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

/// Parse an `eth_accounts` / `eth_requestAccounts` result.
pub(crate) fn parse_accounts(value: Value) -> Result<Vec<Address>, crate::Error> {
    serde_json::from_value(value).map_err(|e| crate::Error::Rpc(format!("invalid accounts: {e}")))
}

/// Parse a hex quantity (`"0x1a"`) as `u64`.
pub(crate) fn parse_quantity(value: &Value) -> Result<u64, crate::Error> {
    let raw = value
        .as_str()
        .ok_or_else(|| crate::Error::Rpc(format!("expected hex quantity, got {value}")))?;
    let digits = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(digits, 16)
        .map_err(|e| crate::Error::Rpc(format!("invalid quantity {raw}: {e}")))
}
