//! JSON-RPC backed gateway, bound to the session's wallet provider.

use super::abi::{IAuction, IERC721, IGymCoin, IUserProfiles};
use super::{
    AuctionItem, AuctionReader, AuctionStarted, CoinReader, HighestBid, NftReader, ProfileReader,
    Transactor, TxCall,
};
use crate::config::Config;
use crate::profiles::UserProfile;
use crate::wallet::{parse_quantity, ProviderError, WalletSession};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Deserialize)]
struct RpcLog {
    topics: Vec<B256>,
    data: Bytes,
}

#[derive(Deserialize)]
struct RpcReceipt {
    #[serde(default)]
    status: Option<String>,
}

/// Read handles use the provider directly; write handles take the signing
/// account from the session at call time.
pub struct ContractGateway {
    session: Arc<WalletSession>,
    auction: Address,
    coin: Address,
    profiles: Address,
    poll_interval: Duration,
    confirmation_timeout: Duration,
}

impl ContractGateway {
    pub fn new(session: Arc<WalletSession>, config: &Config) -> Self {
        Self {
            session,
            auction: config.auction_address,
            coin: config.coin_address,
            profiles: config.profiles_address,
            poll_interval: Duration::from_millis(config.confirmation_poll_ms),
            confirmation_timeout: Duration::from_secs(config.confirmation_timeout_secs),
        }
    }

    /// `eth_call` a typed view function.
    async fn call<C: SolCall + Send + Sync>(
        &self,
        to: Address,
        call: C,
    ) -> Result<C::Return, crate::Error> {
        let provider = self.session.provider()?;
        let params = json!([{ "to": to, "data": Bytes::from(call.abi_encode()) }, "latest"]);
        let raw = provider.request("eth_call", params).await?;
        let data: Bytes = serde_json::from_value(raw)
            .map_err(|e| crate::Error::Rpc(format!("{}: invalid return data: {e}", C::SIGNATURE)))?;
        C::abi_decode_returns(&data, true)
            .map_err(|e| crate::Error::Rpc(format!("{}: {e}", C::SIGNATURE)))
    }

    fn tx_object(from: Address, tx: &TxCall, gas_limit: Option<u64>) -> Value {
        let mut obj = json!({
            "from": from,
            "to": tx.to,
            "data": tx.call.calldata(),
            "value": tx.value,
        });
        if let Some(gas) = gas_limit {
            obj["gas"] = Value::String(format!("{gas:#x}"));
        }
        obj
    }
}

fn estimation_error(err: ProviderError) -> crate::Error {
    if err.is_user_rejection() {
        crate::Error::UserRejected
    } else {
        crate::Error::Estimation(err.reason())
    }
}

fn submission_error(hash: Option<B256>, err: ProviderError) -> crate::Error {
    if err.is_user_rejection() {
        crate::Error::UserRejected
    } else {
        crate::Error::Submission {
            hash,
            reason: err.reason(),
        }
    }
}

#[async_trait]
impl AuctionReader for ContractGateway {
    fn auction_address(&self) -> Address {
        self.auction
    }

    async fn auction_started_events(&self) -> Result<Vec<AuctionStarted>, crate::Error> {
        let provider = self.session.provider()?;
        let filter = json!([{
            "address": self.auction,
            "fromBlock": "0x0",
            "toBlock": "latest",
            "topics": [IAuction::StartAuction::SIGNATURE_HASH],
        }]);
        let raw = provider.request("eth_getLogs", filter).await?;
        let logs: Vec<RpcLog> = serde_json::from_value(raw)
            .map_err(|e| crate::Error::Rpc(format!("invalid logs: {e}")))?;

        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            match IAuction::StartAuction::decode_raw_log(log.topics.iter().copied(), &log.data, true)
            {
                Ok(ev) => events.push(AuctionStarted {
                    seller: ev.seller,
                    auction_id: ev.auctionId,
                }),
                Err(e) => warn!(error = %e, "Skipping malformed StartAuction log"),
            }
        }
        debug!(count = events.len(), "Fetched StartAuction logs");
        Ok(events)
    }

    async fn auction_item(&self, seller: Address) -> Result<AuctionItem, crate::Error> {
        let r = self
            .call(self.auction, IAuction::auctionItemsCall { seller })
            .await?;
        Ok(AuctionItem {
            auction_id: r.auctionID,
            token_address: r.tokenAddress,
            token_id: r.tokenId,
            end_time: r.endTime.saturating_to::<u64>(),
            highest_bid: r.highestBid,
            highest_bidder: r.highestBidder,
            is_sold: r.isSold,
            is_active: r.isActive,
        })
    }

    async fn highest_bid(&self, seller: Address) -> Result<HighestBid, crate::Error> {
        let r = self
            .call(self.auction, IAuction::getHighestBidCall { seller })
            .await?;
        Ok(HighestBid {
            bidder: r.bidder,
            amount: r.amount,
        })
    }

    async fn time_remaining(&self, seller: Address) -> Result<u64, crate::Error> {
        let r = self
            .call(self.auction, IAuction::timeRemainingCall { seller })
            .await?;
        Ok(r.remaining.saturating_to::<u64>())
    }
}

#[async_trait]
impl NftReader for ContractGateway {
    async fn code_at(&self, address: Address) -> Result<Bytes, crate::Error> {
        let provider = self.session.provider()?;
        let raw = provider
            .request("eth_getCode", json!([address, "latest"]))
            .await?;
        serde_json::from_value(raw).map_err(|e| crate::Error::Rpc(format!("invalid code: {e}")))
    }

    async fn owner_of(&self, nft: Address, token_id: U256) -> Result<Address, crate::Error> {
        let r = self
            .call(nft, IERC721::ownerOfCall { tokenId: token_id })
            .await?;
        Ok(r.owner)
    }

    async fn get_approved(&self, nft: Address, token_id: U256) -> Result<Address, crate::Error> {
        let r = self
            .call(nft, IERC721::getApprovedCall { tokenId: token_id })
            .await?;
        Ok(r.operator)
    }
}

#[async_trait]
impl CoinReader for ContractGateway {
    fn coin_address(&self) -> Address {
        self.coin
    }

    async fn coin_balance(&self, owner: Address) -> Result<U256, crate::Error> {
        let r = self
            .call(self.coin, IGymCoin::balanceOfCall { account: owner })
            .await?;
        Ok(r.balance)
    }

    async fn ether_balance(&self, owner: Address) -> Result<U256, crate::Error> {
        let provider = self.session.provider()?;
        let raw = provider
            .request("eth_getBalance", json!([owner, "latest"]))
            .await?;
        serde_json::from_value(raw)
            .map_err(|e| crate::Error::Rpc(format!("invalid balance: {e}")))
    }

    async fn buy_rate(&self) -> Result<U256, crate::Error> {
        Ok(self.call(self.coin, IGymCoin::buyRateCall {}).await?.rate)
    }

    async fn sell_rate(&self) -> Result<U256, crate::Error> {
        Ok(self.call(self.coin, IGymCoin::sellRateCall {}).await?.rate)
    }
}

#[async_trait]
impl ProfileReader for ContractGateway {
    fn profiles_address(&self) -> Address {
        self.profiles
    }

    async fn user_profile(&self, owner: Address) -> Result<Option<UserProfile>, crate::Error> {
        match self
            .call(self.profiles, IUserProfiles::getUserProfileCall { user: owner })
            .await
        {
            Ok(r) if r.username.is_empty() => Ok(None),
            Ok(r) => Ok(Some(UserProfile {
                username: r.username,
                email: r.email,
                wallet_address: r.walletAddress,
            })),
            // The contract reverts for unknown users.
            Err(crate::Error::Rpc(msg)) if msg.contains("revert") => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl Transactor for ContractGateway {
    async fn estimate_gas(&self, from: Address, tx: &TxCall) -> Result<u64, crate::Error> {
        let provider = self.session.provider()?;
        let raw = provider
            .request("eth_estimateGas", json!([Self::tx_object(from, tx, None)]))
            .await
            .map_err(estimation_error)?;
        parse_quantity(&raw)
    }

    async fn send_transaction(
        &self,
        from: Address,
        tx: &TxCall,
        gas_limit: Option<u64>,
    ) -> Result<B256, crate::Error> {
        let provider = self.session.provider()?;
        let raw = provider
            .request(
                "eth_sendTransaction",
                json!([Self::tx_object(from, tx, gas_limit)]),
            )
            .await
            .map_err(|e| submission_error(None, e))?;
        serde_json::from_value(raw).map_err(|e| crate::Error::Submission {
            hash: None,
            reason: format!("invalid transaction hash: {e}"),
        })
    }

    async fn wait_for_confirmation(&self, hash: B256) -> Result<(), crate::Error> {
        let provider = self.session.provider()?;
        let deadline = tokio::time::Instant::now() + self.confirmation_timeout;

        loop {
            let raw = provider
                .request("eth_getTransactionReceipt", json!([hash]))
                .await
                .map_err(|e| submission_error(Some(hash), e))?;

            if !raw.is_null() {
                let receipt: RpcReceipt =
                    serde_json::from_value(raw).map_err(|e| crate::Error::Submission {
                        hash: Some(hash),
                        reason: format!("invalid receipt: {e}"),
                    })?;
                // Pre-Byzantium receipts carry no status; inclusion is success.
                return match receipt.status.as_deref() {
                    None | Some("0x1") => Ok(()),
                    Some(_) => Err(crate::Error::Submission {
                        hash: Some(hash),
                        reason: "Transaction reverted".into(),
                    }),
                };
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(crate::Error::Submission {
                    hash: Some(hash),
                    reason: "Timed out waiting for confirmation".into(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
