//! Per-address user profiles. Absence is a value, not an error.

use crate::context::Context;
use crate::gateway::{self, ContractCall, TxCall};
use crate::notify::NoticeKind;
use crate::tx_log::{TransactionTicket, TxKind, TxStatus};
use alloy_primitives::{Address, B256};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub wallet_address: Address,
}

pub struct ProfileDirectory {
    ctx: Context,
    current: Mutex<Option<UserProfile>>,
}

impl ProfileDirectory {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            current: Mutex::new(None),
        }
    }

    /// Profile of the session account as of the last refresh.
    pub fn current(&self) -> Option<UserProfile> {
        self.current.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub async fn lookup(&self, address: Address) -> Result<Option<UserProfile>, crate::Error> {
        self.ctx.chain.user_profile(address).await
    }

    /// Re-read the session account's profile. Read failures leave no profile.
    pub async fn refresh_current(&self) -> Option<UserProfile> {
        let profile = match self.ctx.session.snapshot().account {
            Some(account) => match self.lookup(account).await {
                Ok(p) => p,
                Err(e) => {
                    warn!(account = %account, error = %e, "Error loading profile");
                    None
                }
            },
            None => None,
        };
        *self.current.lock().unwrap_or_else(|e| e.into_inner()) = profile.clone();
        profile
    }

    /// Look up a profile by typed-in address. Unknown or unreadable
    /// profiles yield `None`; only a malformed address is an error.
    pub async fn login_with_address(
        &self,
        raw: &str,
    ) -> Result<Option<UserProfile>, crate::Error> {
        let address: Address = raw
            .trim()
            .parse()
            .map_err(|_| crate::Error::preflight("Invalid Ethereum address"))?;
        match self.lookup(address).await {
            Ok(profile) => Ok(profile),
            Err(e) => {
                warn!(address = %address, error = %e, "Error during login");
                Ok(None)
            }
        }
    }

    /// Register a profile, then re-read it from chain.
    pub async fn register(&self, username: &str, email: &str) -> Result<B256, crate::Error> {
        match self.try_register(username, email).await {
            Ok(hash) => {
                self.ctx.record_success(
                    TransactionTicket::new(hash, TxStatus::Success, TxKind::Register),
                    "Profile registered successfully!",
                );
                Ok(hash)
            }
            Err(e) => {
                self.ctx.report_failure(TxKind::Register, &e);
                Err(e)
            }
        }
    }

    async fn try_register(&self, username: &str, email: &str) -> Result<B256, crate::Error> {
        let signer = self.ctx.session.signer()?;
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(crate::Error::preflight("Username is required"));
        }
        if email.is_empty() {
            return Err(crate::Error::preflight("Email is required"));
        }
        if !is_plausible_email(email) {
            return Err(crate::Error::preflight("Please enter a valid email address"));
        }

        let tx = TxCall::new(
            self.ctx.chain.profiles_address(),
            ContractCall::RegisterProfile {
                username: username.to_string(),
                email: email.to_string(),
            },
        );
        self.ctx.notify("Registering profile...", NoticeKind::Loading);
        let hash = gateway::execute(
            self.ctx.chain.as_ref(),
            signer.address(),
            &tx,
            Some(self.ctx.config.gas_limit),
        )
        .await?;

        let profile = self.refresh_current().await;
        info!(account = %signer.address(), found = profile.is_some(), "Profile re-read after registration");
        Ok(hash)
    }
}

/// `local@domain.tld` with no whitespace and a dot inside the domain.
fn is_plausible_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
