//! Wallet session: connection state, account and chain id.

use super::{
    parse_accounts, parse_quantity, WalletProvider, INTERNAL_ERROR_CODE, METHOD_NOT_FOUND_CODE,
};
use alloy_primitives::Address;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Published view of the session. Dependents read this, never mutate it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    pub connection: ConnectionState,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected && self.account.is_some()
    }
}

/// What a wallet notification did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    Unchanged,
    Disconnected,
    AccountChanged(Address),
    /// Chain switched: every dependent must reload from scratch.
    ReloadRequired,
}

/// Binding to the account that signs outgoing transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signer {
    account: Address,
}

impl Signer {
    pub fn address(&self) -> Address {
        self.account
    }
}

/// Owns the provider handle and the connection state machine
/// `Disconnected -> Connecting -> Connected`.
pub struct WalletSession {
    provider: Option<Arc<dyn WalletProvider>>,
    state: watch::Sender<SessionSnapshot>,
}

impl WalletSession {
    /// `None` models a browser with no wallet installed.
    pub fn new(provider: Option<Arc<dyn WalletProvider>>) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self { provider, state }
    }

    pub fn has_provider(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider(&self) -> Result<Arc<dyn WalletProvider>, crate::Error> {
        self.provider.clone().ok_or(crate::Error::MissingWallet)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }

    /// Signing binding for the connected account.
    pub fn signer(&self) -> Result<Signer, crate::Error> {
        if self.provider.is_none() {
            return Err(crate::Error::MissingWallet);
        }
        let snapshot = self.state.borrow();
        match snapshot.account {
            Some(account) if snapshot.connection == ConnectionState::Connected => {
                Ok(Signer { account })
            }
            _ => Err(crate::Error::preflight("Please connect your wallet first")),
        }
    }

    // --- Transitions ---

    /// Adopt an existing authorization without prompting.
    ///
    /// Goes straight to `Connected` (never visibly `Connecting`). An empty
    /// account list leaves the session disconnected.
    pub async fn probe(&self) -> Result<Option<Address>, crate::Error> {
        let provider = self.provider()?;
        let accounts = parse_accounts(provider.request("eth_accounts", json!([])).await?)?;

        let Some(account) = accounts.first().copied() else {
            self.state.send_replace(SessionSnapshot::default());
            return Ok(None);
        };

        let chain_id = fetch_chain_id(provider.as_ref()).await?;
        self.state.send_replace(SessionSnapshot {
            account: Some(account),
            chain_id: Some(chain_id),
            connection: ConnectionState::Connected,
        });
        info!(account = %account, chain_id, "Adopted existing wallet authorization");
        Ok(Some(account))
    }

    /// Prompt the wallet for account access.
    ///
    /// Concurrent calls are not deduplicated; callers gate on
    /// [`ConnectionState::Connecting`].
    pub async fn connect(&self) -> Result<Address, crate::Error> {
        let provider = self.provider()?;
        self.state
            .send_modify(|s| s.connection = ConnectionState::Connecting);

        match request_accounts(provider.as_ref()).await {
            Ok((account, chain_id)) => {
                self.state.send_replace(SessionSnapshot {
                    account: Some(account),
                    chain_id: Some(chain_id),
                    connection: ConnectionState::Connected,
                });
                info!(account = %account, chain_id, "Wallet connected");
                Ok(account)
            }
            Err(e) => {
                self.state.send_modify(|s| {
                    s.connection = if s.account.is_some() {
                        ConnectionState::Connected
                    } else {
                        ConnectionState::Disconnected
                    };
                });
                warn!(error = %e, "Wallet connection failed");
                Err(e)
            }
        }
    }

    /// Local-only disconnect; wallet-side permission is left intact.
    pub fn disconnect(&self) {
        self.state.send_replace(SessionSnapshot::default());
        info!("Wallet disconnected");
    }

    pub fn on_accounts_changed(&self, accounts: &[Address]) -> SessionChange {
        let current = self.state.borrow().account;
        match accounts.first().copied() {
            None if current.is_none() => SessionChange::Unchanged,
            None => {
                self.disconnect();
                SessionChange::Disconnected
            }
            Some(account) if Some(account) == current => SessionChange::Unchanged,
            Some(account) => {
                self.state.send_modify(|s| {
                    s.account = Some(account);
                    s.connection = ConnectionState::Connected;
                });
                info!(account = %account, "Wallet account changed");
                SessionChange::AccountChanged(account)
            }
        }
    }

    /// Any chain switch forces a full reload; no attempt is made to map
    /// contract addresses across chains.
    pub fn on_chain_changed(&self, chain_id: u64) -> SessionChange {
        self.state.send_modify(|s| s.chain_id = Some(chain_id));
        info!(chain_id, "Wallet chain changed, full reload required");
        SessionChange::ReloadRequired
    }
}

async fn fetch_chain_id(provider: &dyn WalletProvider) -> Result<u64, crate::Error> {
    let raw = provider.request("eth_chainId", json!([])).await?;
    parse_quantity(&raw)
}

async fn request_accounts(provider: &dyn WalletProvider) -> Result<(Address, u64), crate::Error> {
    let raw = match provider.request("eth_requestAccounts", json!([])).await {
        Ok(v) => v,
        // Plain nodes have no permission prompt; their unlocked accounts are the grant.
        Err(e) if e.code == METHOD_NOT_FOUND_CODE => {
            provider.request("eth_accounts", json!([])).await?
        }
        Err(e) if e.code == INTERNAL_ERROR_CODE => {
            return Err(crate::Error::Rpc(
                "Access to your Ethereum account was denied".into(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    let account = parse_accounts(raw)?
        .first()
        .copied()
        .ok_or(crate::Error::UserRejected)?;
    let chain_id = fetch_chain_id(provider).await?;
    Ok((account, chain_id))
}
