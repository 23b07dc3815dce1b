//! Auction creation and termination. Every step short-circuits.

use super::AuctionDirectory;
use crate::context::Context;
use crate::gateway::{self, ContractCall, TxCall};
use crate::notify::NoticeKind;
use crate::tx_log::{TransactionTicket, TxKind, TxStatus};
use crate::units::{format_amount, parse_amount};
use alloy_primitives::{Address, B256, U256};
use std::sync::Arc;
use tracing::{info, warn};

/// Lowest accepted start price, 0.01 ether.
pub const MIN_START_PRICE: u64 = 10_000_000_000_000_000;

const CREATE_REVERT_HINT: &str = "Make sure you own the NFT and have approved the auction contract";
const STOP_REVERT_HINT: &str = "Cannot stop auction at this time";

pub struct LifecyclePipeline {
    ctx: Context,
    directory: Arc<AuctionDirectory>,
}

impl LifecyclePipeline {
    pub fn new(ctx: Context, directory: Arc<AuctionDirectory>) -> Self {
        Self { ctx, directory }
    }

    /// List `token_id` of `nft` for auction at `start_price` ether.
    ///
    /// Approves the auction contract first when it is not already the
    /// approved operator for the token.
    pub async fn create_auction(
        &self,
        nft: &str,
        token_id: &str,
        start_price: &str,
    ) -> Result<B256, crate::Error> {
        match self.try_create(nft, token_id, start_price).await {
            Ok((hash, price)) => {
                self.ctx.record_success(
                    TransactionTicket::new(hash, TxStatus::Success, TxKind::Create)
                        .with_amount(format_amount(price)),
                    "Auction created successfully!",
                );
                self.refresh_after(hash).await;
                Ok(hash)
            }
            Err(e) => {
                self.ctx.report_failure(TxKind::Create, &e);
                Err(e)
            }
        }
    }

    async fn try_create(
        &self,
        nft: &str,
        token_id: &str,
        start_price: &str,
    ) -> Result<(B256, U256), crate::Error> {
        let caller = self.ctx.session.signer()?.address();
        let chain = &self.ctx.chain;

        let price = parse_amount(start_price)?;
        if price < U256::from(MIN_START_PRICE) {
            return Err(crate::Error::preflight("Start price must be at least 0.01 ETH"));
        }
        let token_id = U256::from_str_radix(token_id.trim(), 10)
            .map_err(|_| crate::Error::preflight("Please enter a valid token ID"))?;
        let nft: Address = nft
            .trim()
            .parse()
            .map_err(|_| crate::Error::preflight("Invalid NFT contract address"))?;

        if chain.auction_item(caller).await?.is_active {
            return Err(crate::Error::preflight("You already have an active auction"));
        }

        self.ctx.notify("Validating NFT contract...", NoticeKind::Loading);
        if chain.code_at(nft).await?.is_empty() {
            return Err(crate::Error::preflight("Address is not a contract"));
        }

        if chain.owner_of(nft, token_id).await? != caller {
            return Err(crate::Error::preflight("You do not own this NFT"));
        }

        let auction = chain.auction_address();
        if chain.get_approved(nft, token_id).await? != auction {
            self.approve(caller, nft, token_id, auction).await?;
        }

        self.ctx.notify("Creating auction...", NoticeKind::Loading);
        let tx = TxCall::new(
            auction,
            ContractCall::StartAuction {
                price,
                token: nft,
                token_id,
            },
        );
        let hash = gateway::execute(chain.as_ref(), caller, &tx, Some(self.ctx.config.gas_limit))
            .await
            .map_err(|e| e.with_revert_hint(CREATE_REVERT_HINT))?;
        info!(seller = %caller, nft = %nft, token_id = %token_id, "Auction created");
        Ok((hash, price))
    }

    async fn approve(
        &self,
        caller: Address,
        nft: Address,
        token_id: U256,
        auction: Address,
    ) -> Result<(), crate::Error> {
        self.ctx.notify("Approving NFT transfer...", NoticeKind::Loading);
        let tx = TxCall::new(
            nft,
            ContractCall::Approve {
                spender: auction,
                token_id,
            },
        );
        let gas_limit = Some(self.ctx.config.gas_limit);
        match gateway::execute(self.ctx.chain.as_ref(), caller, &tx, gas_limit).await {
            Ok(hash) => {
                self.ctx.record_success(
                    TransactionTicket::new(hash, TxStatus::Success, TxKind::Approve),
                    "NFT approved successfully",
                );
                Ok(())
            }
            Err(e) => {
                if let Some(hash) = e.tx_hash() {
                    self.ctx
                        .tx_log
                        .record(TransactionTicket::new(hash, TxStatus::Failed, TxKind::Approve));
                }
                warn!(nft = %nft, token_id = %token_id, error = %e, "Approval error");
                // Reported under the creation flow; keep the hash off the create ticket.
                Err(match e {
                    crate::Error::Submission { reason, .. } => crate::Error::Submission {
                        hash: None,
                        reason,
                    },
                    other => other,
                })
            }
        }
    }

    /// End `seller`'s auction. Only the seller may stop it.
    pub async fn stop_auction(&self, seller: Address) -> Result<B256, crate::Error> {
        match self.try_stop(seller).await {
            Ok(hash) => {
                self.ctx.record_success(
                    TransactionTicket::new(hash, TxStatus::Success, TxKind::Stop),
                    "Auction ended successfully!",
                );
                self.refresh_after(hash).await;
                Ok(hash)
            }
            Err(e) => {
                self.ctx.report_failure(TxKind::Stop, &e);
                Err(e)
            }
        }
    }

    async fn try_stop(&self, seller: Address) -> Result<B256, crate::Error> {
        let caller = self.ctx.session.signer()?.address();
        if caller != seller {
            return Err(crate::Error::preflight(
                "Only the auction owner can stop the auction",
            ));
        }

        let item = self.ctx.chain.auction_item(seller).await?;
        if !item.is_active {
            return Err(crate::Error::preflight("Auction is not active"));
        }

        self.ctx.notify("Stopping auction...", NoticeKind::Loading);
        let tx = TxCall::new(self.ctx.chain.auction_address(), ContractCall::Stop { seller });
        let hash = gateway::execute(
            self.ctx.chain.as_ref(),
            caller,
            &tx,
            Some(self.ctx.config.gas_limit),
        )
        .await
        .map_err(|e| e.with_revert_hint(STOP_REVERT_HINT))?;
        info!(seller = %seller, tx_hash = %hash, "Auction stopped");
        Ok(hash)
    }

    async fn refresh_after(&self, hash: B256) {
        if let Err(e) = self.directory.refresh().await {
            warn!(tx_hash = %hash, error = %e, "Directory refresh after confirmation failed");
        }
    }
}
