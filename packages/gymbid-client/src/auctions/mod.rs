//! Auction directory and the pipelines that act on auctions.
//!
//! [`AuctionDirectory`] is rebuilt from the chain on every refresh: the
//! `StartAuction` log supplies the sellers, per-seller reads supply the
//! details. Records are never patched in place.

pub mod bid;
pub mod countdown;
pub mod lifecycle;

pub use bid::{BidPipeline, BidStage};
pub use countdown::{Clock, Countdown, CountdownLabel, SystemClock};
pub use lifecycle::LifecyclePipeline;

use crate::context::Context;
use crate::metrics::METRICS;
use crate::notify::NoticeKind;
use crate::units::format_amount;
use alloy_primitives::{Address, U256};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuctionRecord {
    pub auction_id: U256,
    pub seller: Address,
    pub token_address: Address,
    pub token_id: U256,
    /// Unix seconds.
    pub end_time: u64,
    pub highest_bid: U256,
    pub highest_bidder: Option<Address>,
    pub is_active: bool,
    pub is_sold: bool,
    /// Seconds left as reported by the contract at refresh time.
    pub time_remaining: u64,
}

impl AuctionRecord {
    pub fn title(&self) -> String {
        format!("NFT Auction #{}", self.auction_id)
    }

    pub fn description(&self) -> String {
        format!(
            "NFT Contract: {}\nToken ID: {}",
            self.token_address, self.token_id
        )
    }

    /// Highest bid in ether, e.g. `"0.1"`.
    pub fn highest_bid_display(&self) -> String {
        format_amount(self.highest_bid)
    }

    /// Smallest bid the form suggests: current highest plus 0.01 ether.
    pub fn suggested_bid(&self) -> U256 {
        self.highest_bid + U256::from(10_000_000_000_000_000u64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Ended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Directory order: first `StartAuction` log first.
    #[default]
    Listed,
    EndingSoon,
    RecentlyAdded,
    PriceHigh,
    PriceLow,
}

pub struct AuctionDirectory {
    ctx: Context,
    records: Mutex<Vec<AuctionRecord>>,
    /// Serializes refreshes so the last one started is the last one stored.
    gate: tokio::sync::Mutex<()>,
}

impl AuctionDirectory {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            records: Mutex::new(Vec::new()),
            gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn snapshot(&self) -> Vec<AuctionRecord> {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get(&self, seller: Address) -> Option<AuctionRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|r| r.seller == seller)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Filtered and sorted copy of the current records.
    pub fn view(&self, filter: StatusFilter, order: SortOrder) -> Vec<AuctionRecord> {
        let mut records: Vec<_> = self
            .snapshot()
            .into_iter()
            .filter(|r| match filter {
                StatusFilter::All => true,
                StatusFilter::Active => r.is_active,
                StatusFilter::Ended => !r.is_active,
            })
            .collect();
        match order {
            SortOrder::Listed => {}
            SortOrder::EndingSoon => records.sort_by_key(|r| r.end_time),
            SortOrder::RecentlyAdded => records.sort_by(|a, b| b.auction_id.cmp(&a.auction_id)),
            SortOrder::PriceHigh => records.sort_by(|a, b| b.highest_bid.cmp(&a.highest_bid)),
            SortOrder::PriceLow => records.sort_by_key(|r| r.highest_bid),
        }
        records
    }

    /// Rebuild the directory from the chain and return the record count.
    ///
    /// Without a connected session the directory is cleared. A failed log
    /// query empties the directory and notifies once; a failed per-seller
    /// read only drops that seller.
    pub async fn refresh(&self) -> Result<usize, crate::Error> {
        let _gate = self.gate.lock().await;

        if !self.ctx.session.snapshot().is_connected() {
            self.clear();
            debug!("No connected wallet, auction directory cleared");
            return Ok(0);
        }
        METRICS.refreshes.fetch_add(1, Ordering::Relaxed);

        let events = match self.ctx.chain.auction_started_events().await {
            Ok(events) => events,
            Err(e) => {
                METRICS.refresh_failures.fetch_add(1, Ordering::Relaxed);
                self.clear();
                error!(error = %e, "Error fetching auctions");
                self.ctx.notify("Failed to fetch auctions", NoticeKind::Error);
                return Err(e);
            }
        };

        let mut seen = HashSet::new();
        let sellers: Vec<Address> = events
            .iter()
            .map(|ev| ev.seller)
            .filter(|seller| seen.insert(*seller))
            .collect();

        let mut records = Vec::with_capacity(sellers.len());
        for seller in sellers {
            match self.fetch_record(seller).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => {
                    METRICS.refresh_item_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(seller = %seller, error = %e, "Error fetching auction details");
                }
            }
        }

        let count = records.len();
        *self.records.lock().unwrap_or_else(|e| e.into_inner()) = records;
        info!(auctions = count, events = events.len(), "Auction directory refreshed");
        Ok(count)
    }

    async fn fetch_record(&self, seller: Address) -> Result<Option<AuctionRecord>, crate::Error> {
        let chain = &self.ctx.chain;
        let item = chain.auction_item(seller).await?;
        if !item.is_active && !item.is_sold {
            return Ok(None);
        }
        if item.is_active && item.is_sold {
            warn!(seller = %seller, "Auction reports both active and sold, skipping");
            return Ok(None);
        }

        let highest = chain.highest_bid(seller).await?;
        let time_remaining = chain.time_remaining(seller).await?;

        Ok(Some(AuctionRecord {
            auction_id: item.auction_id,
            seller,
            token_address: item.token_address,
            token_id: item.token_id,
            end_time: item.end_time,
            highest_bid: highest.amount,
            highest_bidder: (highest.bidder != Address::ZERO).then_some(highest.bidder),
            is_active: item.is_active,
            is_sold: item.is_sold,
            time_remaining,
        }))
    }
}
