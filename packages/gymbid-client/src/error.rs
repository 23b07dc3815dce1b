//! Error types for the client.

use alloy_primitives::B256;
use std::fmt;

/// Client error type.
///
/// `Display` renders the message shown to the user, so pipelines can hand
/// `err.to_string()` straight to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The user declined the wallet prompt.
    UserRejected,
    /// No wallet provider is available. Fatal to the whole session.
    MissingWallet,
    /// Local validation failed before any network call.
    Preflight(String),
    /// Dry-run predicted a revert; nothing was submitted.
    Estimation(String),
    /// Transaction was sent (or sending failed) and did not confirm.
    Submission {
        hash: Option<B256>,
        reason: String,
    },
    /// Transport or decoding failure talking to the node.
    Rpc(String),
    /// Configuration error.
    Config(String),
}

impl Error {
    pub fn preflight(msg: impl Into<String>) -> Self {
        Error::Preflight(msg.into())
    }

    /// Hash of the submitted transaction, when one exists.
    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            Error::Submission { hash, .. } => *hash,
            _ => None,
        }
    }

    /// Replace a raw `execution reverted` estimate with a domain hint.
    pub(crate) fn with_revert_hint(self, hint: &str) -> Self {
        match self {
            Error::Estimation(msg) if msg.contains("execution reverted") => {
                Error::Estimation(format!("Contract error: {hint}"))
            }
            Error::Submission { hash, reason } if reason.contains("execution reverted") => {
                Error::Submission {
                    hash,
                    reason: format!("Contract error: {hint}"),
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UserRejected => write!(f, "Transaction rejected by user"),
            Error::MissingWallet => write!(f, "No wallet provider found. Please install MetaMask."),
            Error::Preflight(msg) => write!(f, "{msg}"),
            Error::Estimation(msg) => write!(f, "{msg}"),
            Error::Submission { reason, .. } => write!(f, "{reason}"),
            Error::Rpc(msg) => write!(f, "rpc error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}
