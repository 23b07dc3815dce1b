//! # GymBid Client
//!
//! Wallet session tracking and transaction orchestration for the GymBid NFT
//! auction, GymCoin and user-profile contracts.
//!
//! ## Quick Start
//! ```bash
//! ETH_RPC_URL=http://127.0.0.1:8545 cargo run --bin gymbid
//! ```
//!
//! ## Components
//! - [`WalletSession`] - connection state and the signing account
//! - [`ContractGateway`] - typed contract reads and transactions
//! - [`AuctionDirectory`] - auctions rebuilt from `StartAuction` logs
//! - [`BidPipeline`], [`LifecyclePipeline`] - bids, auction creation and stop
//! - [`ExchangePipeline`] - GymCoin buy, sell and transfer
//! - [`ProfileDirectory`] - user profiles
//! - [`AppState`] - composition root

pub mod auctions;
pub mod config;
mod context;
mod error;
pub mod exchange;
pub mod gateway;
pub mod metrics;
pub mod notify;
pub mod profiles;
mod state;
pub mod tx_log;
pub mod units;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use auctions::{AuctionDirectory, AuctionRecord, BidPipeline, BidStage, LifecyclePipeline};
pub use config::Config;
pub use error::Error;
pub use exchange::ExchangePipeline;
pub use gateway::ContractGateway;
pub use notify::{NoticeKind, Notifier, TracingNotifier};
pub use profiles::{ProfileDirectory, UserProfile};
pub use state::AppState;
pub use tx_log::{TransactionTicket, TxLog};
pub use wallet::{HttpProvider, WalletEvent, WalletProvider, WalletSession};
