//! Contract gateway: the only place calls leave the process.
//!
//! Reads go through one typed trait per contract ([`AuctionReader`],
//! [`NftReader`], [`CoinReader`], [`ProfileReader`]); every state-changing
//! call is a typed [`TxCall`] pushed through a [`Transactor`]. Pipelines
//! depend on `dyn Chain`, so tests substitute an in-memory chain.

pub mod abi;
mod client;

pub use client::ContractGateway;

use crate::metrics::METRICS;
use crate::profiles::UserProfile;
use abi::{IAuction, IERC721, IGymCoin, IUserProfiles};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::sync::atomic::Ordering;
use tracing::{debug, info};

/// `auctionItems(seller)` decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuctionItem {
    pub auction_id: U256,
    pub token_address: Address,
    pub token_id: U256,
    pub end_time: u64,
    pub highest_bid: U256,
    pub highest_bidder: Address,
    pub is_sold: bool,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighestBid {
    pub bidder: Address,
    pub amount: U256,
}

/// One `StartAuction(seller, auctionId)` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionStarted {
    pub seller: Address,
    pub auction_id: U256,
}

/// State-changing contract functions, one variant per function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractCall {
    StartAuction {
        price: U256,
        token: Address,
        token_id: U256,
    },
    Bid {
        seller: Address,
    },
    Stop {
        seller: Address,
    },
    Approve {
        spender: Address,
        token_id: U256,
    },
    BuyCoin {
        amount: U256,
    },
    SellCoin {
        amount: U256,
    },
    Transfer {
        recipient: Address,
        amount: U256,
    },
    RegisterProfile {
        username: String,
        email: String,
    },
}

impl ContractCall {
    pub fn name(&self) -> &'static str {
        match self {
            ContractCall::StartAuction { .. } => "startAuction",
            ContractCall::Bid { .. } => "bidInAuction",
            ContractCall::Stop { .. } => "stopAuction",
            ContractCall::Approve { .. } => "approve",
            ContractCall::BuyCoin { .. } => "buyCoin",
            ContractCall::SellCoin { .. } => "sellCoin",
            ContractCall::Transfer { .. } => "transfer",
            ContractCall::RegisterProfile { .. } => "registerProfile",
        }
    }

    /// ABI-encoded calldata.
    pub fn calldata(&self) -> Bytes {
        let data = match self {
            ContractCall::StartAuction {
                price,
                token,
                token_id,
            } => IAuction::startAuctionCall {
                startPrice: *price,
                sellingNFT: *token,
                sellingNFTId: *token_id,
            }
            .abi_encode(),
            ContractCall::Bid { seller } => {
                IAuction::bidInAuctionCall { seller: *seller }.abi_encode()
            }
            ContractCall::Stop { seller } => {
                IAuction::stopAuctionCall { seller: *seller }.abi_encode()
            }
            ContractCall::Approve { spender, token_id } => IERC721::approveCall {
                to: *spender,
                tokenId: *token_id,
            }
            .abi_encode(),
            ContractCall::BuyCoin { amount } => IGymCoin::buyCoinCall { amount: *amount }.abi_encode(),
            ContractCall::SellCoin { amount } => {
                IGymCoin::sellCoinCall { amount: *amount }.abi_encode()
            }
            ContractCall::Transfer { recipient, amount } => IGymCoin::transferCall {
                recipient: *recipient,
                amount: *amount,
            }
            .abi_encode(),
            ContractCall::RegisterProfile { username, email } => {
                IUserProfiles::registerProfileCall {
                    username: username.clone(),
                    email: email.clone(),
                }
                .abi_encode()
            }
        };
        Bytes::from(data)
    }
}

/// A prepared transaction: target, attached value and the typed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxCall {
    pub to: Address,
    pub value: U256,
    pub call: ContractCall,
}

impl TxCall {
    pub fn new(to: Address, call: ContractCall) -> Self {
        Self {
            to,
            value: U256::ZERO,
            call,
        }
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

// --- Typed read interfaces ---

#[async_trait]
pub trait AuctionReader: Send + Sync {
    fn auction_address(&self) -> Address;

    /// All `StartAuction` logs, block 0 to latest, in log order.
    async fn auction_started_events(&self) -> Result<Vec<AuctionStarted>, crate::Error>;

    async fn auction_item(&self, seller: Address) -> Result<AuctionItem, crate::Error>;

    async fn highest_bid(&self, seller: Address) -> Result<HighestBid, crate::Error>;

    async fn time_remaining(&self, seller: Address) -> Result<u64, crate::Error>;
}

#[async_trait]
pub trait NftReader: Send + Sync {
    /// Deployed bytecode at `address`; empty for externally owned accounts.
    async fn code_at(&self, address: Address) -> Result<Bytes, crate::Error>;

    async fn owner_of(&self, nft: Address, token_id: U256) -> Result<Address, crate::Error>;

    async fn get_approved(&self, nft: Address, token_id: U256) -> Result<Address, crate::Error>;
}

#[async_trait]
pub trait CoinReader: Send + Sync {
    fn coin_address(&self) -> Address;

    async fn coin_balance(&self, owner: Address) -> Result<U256, crate::Error>;

    async fn ether_balance(&self, owner: Address) -> Result<U256, crate::Error>;

    async fn buy_rate(&self) -> Result<U256, crate::Error>;

    async fn sell_rate(&self) -> Result<U256, crate::Error>;
}

#[async_trait]
pub trait ProfileReader: Send + Sync {
    fn profiles_address(&self) -> Address;

    /// `None` when the address never registered.
    async fn user_profile(&self, owner: Address) -> Result<Option<UserProfile>, crate::Error>;
}

/// Signer-bound write path.
#[async_trait]
pub trait Transactor: Send + Sync {
    /// Dry-run. Fails with [`crate::Error::Estimation`] when a revert is predicted.
    async fn estimate_gas(&self, from: Address, tx: &TxCall) -> Result<u64, crate::Error>;

    /// Submit through the wallet. `gas_limit` pins an explicit ceiling.
    async fn send_transaction(
        &self,
        from: Address,
        tx: &TxCall,
        gas_limit: Option<u64>,
    ) -> Result<B256, crate::Error>;

    /// Wait for one confirmation. A revert is a [`crate::Error::Submission`].
    async fn wait_for_confirmation(&self, hash: B256) -> Result<(), crate::Error>;
}

/// Everything a pipeline may touch.
pub trait Chain: AuctionReader + NftReader + CoinReader + ProfileReader + Transactor {}

impl<T> Chain for T where T: AuctionReader + NftReader + CoinReader + ProfileReader + Transactor {}

/// Estimate, submit with `gas_limit`, then wait for confirmation.
///
/// Nothing is submitted when the estimate fails, and nothing is retried.
pub(crate) async fn execute(
    chain: &dyn Chain,
    from: Address,
    tx: &TxCall,
    gas_limit: Option<u64>,
) -> Result<B256, crate::Error> {
    let estimate = chain.estimate_gas(from, tx).await?;
    debug!(call = tx.call.name(), estimate, gas_limit, "Estimate succeeded");

    let hash = chain.send_transaction(from, tx, gas_limit).await?;
    METRICS.tx_submitted.fetch_add(1, Ordering::Relaxed);
    info!(call = tx.call.name(), tx_hash = %hash, "Transaction submitted");

    chain.wait_for_confirmation(hash).await?;
    METRICS.tx_confirmed.fetch_add(1, Ordering::Relaxed);
    info!(call = tx.call.name(), tx_hash = %hash, "Transaction confirmed");
    Ok(hash)
}
