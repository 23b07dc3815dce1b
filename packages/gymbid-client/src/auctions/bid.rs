//! Bid submission: `Idle -> Validating -> Estimating -> Submitted -> Confirmed | Failed`.

use super::AuctionDirectory;
use crate::context::Context;
use crate::gateway::{ContractCall, TxCall};
use crate::metrics::METRICS;
use crate::notify::NoticeKind;
use crate::tx_log::{TransactionTicket, TxKind, TxStatus};
use crate::units::{format_amount, parse_amount};
use alloy_primitives::{Address, B256, U256};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BidStage {
    #[default]
    Idle,
    Validating,
    Estimating,
    Submitted,
    Confirmed,
    Failed,
}

pub struct BidPipeline {
    ctx: Context,
    directory: Arc<AuctionDirectory>,
    stage: watch::Sender<BidStage>,
}

impl BidPipeline {
    pub fn new(ctx: Context, directory: Arc<AuctionDirectory>) -> Self {
        let (stage, _) = watch::channel(BidStage::Idle);
        Self {
            ctx,
            directory,
            stage,
        }
    }

    /// Stage the last bid ended in. Validation failures leave it at
    /// `Validating`; anything after that ends in `Failed`.
    pub fn stage(&self) -> BidStage {
        *self.stage.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<BidStage> {
        self.stage.subscribe()
    }

    /// Place a bid of `amount` ether on `seller`'s auction.
    ///
    /// The directory refresh after confirmation is best-effort; its failure
    /// does not undo `Confirmed`.
    pub async fn place_bid(&self, seller: Address, amount: &str) -> Result<B256, crate::Error> {
        self.stage.send_replace(BidStage::Validating);

        let result = self.run(seller, amount).await;
        match &result {
            Ok((hash, value)) => {
                self.stage.send_replace(BidStage::Confirmed);
                self.ctx.record_success(
                    TransactionTicket::new(*hash, TxStatus::Success, TxKind::Bid)
                        .with_amount(format_amount(*value)),
                    "Bid placed successfully!",
                );
                if let Err(e) = self.directory.refresh().await {
                    warn!(error = %e, "Directory refresh after bid failed");
                }
            }
            Err(e) => {
                if self.stage() != BidStage::Validating {
                    self.stage.send_replace(BidStage::Failed);
                }
                self.ctx.report_failure(TxKind::Bid, e);
            }
        }
        result.map(|(hash, _)| hash)
    }

    async fn run(&self, seller: Address, amount: &str) -> Result<(B256, U256), crate::Error> {
        let signer = self.ctx.session.signer()?;
        let value = parse_amount(amount)?;
        self.validate(seller, signer.address(), value).await?;

        let tx = TxCall::new(self.ctx.chain.auction_address(), ContractCall::Bid { seller })
            .with_value(value);

        self.stage.send_replace(BidStage::Estimating);
        self.ctx.notify("Placing bid...", NoticeKind::Loading);
        self.ctx.chain.estimate_gas(signer.address(), &tx).await?;

        let hash = self
            .ctx
            .chain
            .send_transaction(signer.address(), &tx, self.ctx.config.bid_gas_limit)
            .await?;
        METRICS.tx_submitted.fetch_add(1, Ordering::Relaxed);
        self.stage.send_replace(BidStage::Submitted);
        info!(seller = %seller, tx_hash = %hash, "Bid submitted");

        self.ctx.notify("Confirming transaction...", NoticeKind::Loading);
        self.ctx.chain.wait_for_confirmation(hash).await?;
        METRICS.tx_confirmed.fetch_add(1, Ordering::Relaxed);
        Ok((hash, value))
    }

    /// Checks against the directory record, or a fresh read when the
    /// auction is not listed yet.
    async fn validate(&self, seller: Address, bidder: Address, value: U256) -> Result<(), crate::Error> {
        let (is_active, highest) = match self.directory.get(seller) {
            Some(record) => (record.is_active, record.highest_bid),
            None => {
                let item = self.ctx.chain.auction_item(seller).await?;
                (item.is_active, item.highest_bid)
            }
        };

        if !is_active {
            return Err(crate::Error::preflight("Auction is not active"));
        }
        if seller == bidder {
            return Err(crate::Error::preflight("You cannot bid on your own auction"));
        }
        if value <= highest {
            return Err(crate::Error::preflight(format!(
                "Bid must exceed current bid ({} ETH)",
                format_amount(highest)
            )));
        }
        Ok(())
    }
}
