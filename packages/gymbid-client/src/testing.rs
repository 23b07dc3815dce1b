//! Test doubles shared by the unit tests: a scripted EIP-1193 wallet, an
//! in-memory chain and a notifier that records what it was told.

use crate::config::Config;
use crate::gateway::{
    AuctionItem, AuctionReader, AuctionStarted, CoinReader, ContractCall, HighestBid, NftReader,
    ProfileReader, Transactor, TxCall,
};
use crate::notify::{NoticeKind, Notifier};
use crate::profiles::UserProfile;
use crate::state::AppState;
use crate::wallet::{
    ProviderError, WalletEvent, WalletProvider, WalletSession, METHOD_NOT_FOUND_CODE,
    USER_REJECTED_CODE,
};
use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};

pub(crate) fn addr(n: u8) -> Address {
    Address::with_last_byte(n)
}

/// Active item with a far-future end time.
pub(crate) fn active_item(id: u64, highest_bid: U256) -> AuctionItem {
    AuctionItem {
        auction_id: U256::from(id),
        token_address: addr(0x50),
        token_id: U256::from(1),
        end_time: 2_000_000_000,
        highest_bid,
        highest_bidder: Address::ZERO,
        is_sold: false,
        is_active: true,
    }
}

// --- Wallet ---

#[derive(Default)]
struct WalletScript {
    accounts: Vec<Address>,
    chain_id: u64,
    reject: bool,
    responses: HashMap<String, Result<Value, ProviderError>>,
    requests: Vec<(String, Value)>,
}

/// Scripted wallet. Account and chain methods answer from state; anything
/// else answers from [`MockWallet::respond`] / [`MockWallet::fail`].
pub(crate) struct MockWallet {
    script: Mutex<WalletScript>,
    events: broadcast::Sender<WalletEvent>,
}

impl MockWallet {
    pub(crate) fn new(accounts: Vec<Address>, chain_id: u64) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            script: Mutex::new(WalletScript {
                accounts,
                chain_id,
                ..Default::default()
            }),
            events,
        })
    }

    /// Make `eth_requestAccounts` fail with a user rejection.
    pub(crate) fn set_reject(&self, reject: bool) {
        self.script.lock().unwrap().reject = reject;
    }

    pub(crate) fn respond(&self, method: &str, value: Value) {
        self.script
            .lock()
            .unwrap()
            .responses
            .insert(method.to_string(), Ok(value));
    }

    pub(crate) fn fail(&self, method: &str, code: i64, message: &str) {
        self.script.lock().unwrap().responses.insert(
            method.to_string(),
            Err(ProviderError {
                code,
                message: message.to_string(),
                data: None,
            }),
        );
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.script
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub(crate) fn last_params(&self, method: &str) -> Option<Value> {
        self.script
            .lock()
            .unwrap()
            .requests
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
    }

    pub(crate) fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut script = self.script.lock().unwrap();
        script.requests.push((method.to_string(), params));
        match method {
            "eth_requestAccounts" if script.reject => Err(ProviderError {
                code: USER_REJECTED_CODE,
                message: "User rejected the request.".into(),
                data: None,
            }),
            "eth_accounts" | "eth_requestAccounts" => Ok(json!(script.accounts)),
            "eth_chainId" => Ok(json!(format!("{:#x}", script.chain_id))),
            _ => script.responses.get(method).cloned().unwrap_or_else(|| {
                Err(ProviderError {
                    code: METHOD_NOT_FOUND_CODE,
                    message: format!("method {method} not scripted"),
                    data: None,
                })
            }),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

// --- Chain ---

#[derive(Debug, Clone)]
pub(crate) struct SentTx {
    pub from: Address,
    pub tx: TxCall,
    pub gas_limit: Option<u64>,
}

#[derive(Default)]
struct Ledger {
    events: Vec<AuctionStarted>,
    items: HashMap<Address, AuctionItem>,
    bids: HashMap<Address, HighestBid>,
    failing_items: HashSet<Address>,
    fail_events: bool,
    estimate_error: Option<String>,
    revert_next: bool,
    owners: HashMap<(Address, U256), Address>,
    approvals: HashMap<(Address, U256), Address>,
    coin: HashMap<Address, U256>,
    ether: HashMap<Address, U256>,
    rates: (U256, U256),
    profiles: HashMap<Address, UserProfile>,
    sent: Vec<SentTx>,
    calls: Vec<String>,
}

/// In-memory contracts. Confirmed transactions apply their effects, so a
/// refresh after a pipeline run sees the new state.
pub(crate) struct MockChain {
    ledger: Mutex<Ledger>,
    auction: Address,
    coin: Address,
    profiles: Address,
    held: watch::Sender<bool>,
}

impl MockChain {
    pub(crate) fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            ledger: Mutex::new(Ledger::default()),
            auction: addr(0xA0),
            coin: addr(0xC0),
            profiles: addr(0xD0),
            held,
        }
    }

    fn ledger(&self, call: &str) -> std::sync::MutexGuard<'_, Ledger> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.calls.push(call.to_string());
        ledger
    }

    /// Names of every async read/write made so far, in order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.ledger.lock().unwrap().calls.clone()
    }

    pub(crate) fn sent(&self) -> Vec<SentTx> {
        self.ledger.lock().unwrap().sent.clone()
    }

    /// Emit a `StartAuction` log for `seller` and store its item.
    pub(crate) fn add_auction(&self, seller: Address, item: AuctionItem) {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.events.push(AuctionStarted {
            seller,
            auction_id: item.auction_id,
        });
        ledger.bids.insert(
            seller,
            HighestBid {
                bidder: item.highest_bidder,
                amount: item.highest_bid,
            },
        );
        ledger.items.insert(seller, item);
    }

    pub(crate) fn set_highest_bid(&self, seller: Address, bidder: Address, amount: U256) {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.bids.insert(seller, HighestBid { bidder, amount });
        if let Some(item) = ledger.items.get_mut(&seller) {
            item.highest_bid = amount;
            item.highest_bidder = bidder;
        }
    }

    pub(crate) fn fail_item_reads(&self, seller: Address) {
        self.ledger.lock().unwrap().failing_items.insert(seller);
    }

    pub(crate) fn fail_event_query(&self, fail: bool) {
        self.ledger.lock().unwrap().fail_events = fail;
    }

    pub(crate) fn fail_estimates(&self, reason: &str) {
        self.ledger.lock().unwrap().estimate_error = Some(reason.to_string());
    }

    pub(crate) fn revert_next_confirmation(&self) {
        self.ledger.lock().unwrap().revert_next = true;
    }

    /// Park every `wait_for_confirmation` until [`Self::release_confirmations`].
    pub(crate) fn hold_confirmations(&self) {
        self.held.send_replace(true);
    }

    pub(crate) fn release_confirmations(&self) {
        self.held.send_replace(false);
    }

    pub(crate) fn mint(&self, nft: Address, token_id: U256, owner: Address) {
        self.ledger
            .lock()
            .unwrap()
            .owners
            .insert((nft, token_id), owner);
    }

    pub(crate) fn set_approved(&self, nft: Address, token_id: U256, operator: Address) {
        self.ledger
            .lock()
            .unwrap()
            .approvals
            .insert((nft, token_id), operator);
    }

    pub(crate) fn set_coin_balance(&self, owner: Address, amount: U256) {
        self.ledger.lock().unwrap().coin.insert(owner, amount);
    }

    pub(crate) fn set_ether_balance(&self, owner: Address, amount: U256) {
        self.ledger.lock().unwrap().ether.insert(owner, amount);
    }

    pub(crate) fn set_rates(&self, buy: U256, sell: U256) {
        self.ledger.lock().unwrap().rates = (buy, sell);
    }

    pub(crate) fn set_profile(&self, owner: Address, username: &str, email: &str) {
        self.ledger.lock().unwrap().profiles.insert(
            owner,
            UserProfile {
                username: username.to_string(),
                email: email.to_string(),
                wallet_address: owner,
            },
        );
    }

    fn apply(&self, ledger: &mut Ledger, sent: &SentTx) {
        let from = sent.from;
        match &sent.tx.call {
            ContractCall::StartAuction {
                price,
                token,
                token_id,
            } => {
                let id = ledger.events.len() as u64 + 1;
                ledger.owners.insert((*token, *token_id), self.auction);
                ledger.events.push(AuctionStarted {
                    seller: from,
                    auction_id: U256::from(id),
                });
                ledger.bids.insert(
                    from,
                    HighestBid {
                        bidder: Address::ZERO,
                        amount: *price,
                    },
                );
                ledger.items.insert(
                    from,
                    AuctionItem {
                        auction_id: U256::from(id),
                        token_address: *token,
                        token_id: *token_id,
                        end_time: 2_000_000_000,
                        highest_bid: *price,
                        highest_bidder: Address::ZERO,
                        is_sold: false,
                        is_active: true,
                    },
                );
            }
            ContractCall::Bid { seller } => {
                ledger.bids.insert(
                    *seller,
                    HighestBid {
                        bidder: from,
                        amount: sent.tx.value,
                    },
                );
                if let Some(item) = ledger.items.get_mut(seller) {
                    item.highest_bid = sent.tx.value;
                    item.highest_bidder = from;
                }
            }
            ContractCall::Stop { seller } => {
                let sold = ledger
                    .bids
                    .get(seller)
                    .is_some_and(|b| b.bidder != Address::ZERO);
                if let Some(item) = ledger.items.get_mut(seller) {
                    item.is_active = false;
                    item.is_sold = sold;
                }
            }
            ContractCall::Approve { spender, token_id } => {
                ledger.approvals.insert((sent.tx.to, *token_id), *spender);
            }
            ContractCall::BuyCoin { amount } => {
                *ledger.coin.entry(from).or_default() += *amount;
                let ether = ledger.ether.entry(from).or_default();
                *ether = ether.saturating_sub(sent.tx.value);
            }
            ContractCall::SellCoin { amount } => {
                let coin = ledger.coin.entry(from).or_default();
                *coin = coin.saturating_sub(*amount);
            }
            ContractCall::Transfer { recipient, amount } => {
                let coin = ledger.coin.entry(from).or_default();
                *coin = coin.saturating_sub(*amount);
                *ledger.coin.entry(*recipient).or_default() += *amount;
            }
            ContractCall::RegisterProfile { username, email } => {
                ledger.profiles.insert(
                    from,
                    UserProfile {
                        username: username.clone(),
                        email: email.clone(),
                        wallet_address: from,
                    },
                );
            }
        }
    }
}

fn tx_hash(index: usize) -> B256 {
    B256::with_last_byte(index as u8 + 1)
}

#[async_trait]
impl AuctionReader for MockChain {
    fn auction_address(&self) -> Address {
        self.auction
    }

    async fn auction_started_events(&self) -> Result<Vec<AuctionStarted>, crate::Error> {
        let ledger = self.ledger("auction_started_events");
        if ledger.fail_events {
            return Err(crate::Error::Rpc("log query failed".into()));
        }
        Ok(ledger.events.clone())
    }

    async fn auction_item(&self, seller: Address) -> Result<AuctionItem, crate::Error> {
        let ledger = self.ledger("auction_item");
        if ledger.failing_items.contains(&seller) {
            return Err(crate::Error::Rpc("call failed".into()));
        }
        Ok(ledger.items.get(&seller).cloned().unwrap_or_default())
    }

    async fn highest_bid(&self, seller: Address) -> Result<HighestBid, crate::Error> {
        let ledger = self.ledger("highest_bid");
        Ok(ledger.bids.get(&seller).copied().unwrap_or_default())
    }

    async fn time_remaining(&self, seller: Address) -> Result<u64, crate::Error> {
        let ledger = self.ledger("time_remaining");
        Ok(ledger
            .items
            .get(&seller)
            .filter(|item| item.is_active)
            .map_or(0, |_| 3600))
    }
}

#[async_trait]
impl NftReader for MockChain {
    async fn code_at(&self, address: Address) -> Result<Bytes, crate::Error> {
        let ledger = self.ledger("code_at");
        let deployed = [self.auction, self.coin, self.profiles].contains(&address)
            || ledger.owners.keys().any(|(nft, _)| *nft == address);
        Ok(if deployed {
            Bytes::from_static(&[0x60, 0x80])
        } else {
            Bytes::new()
        })
    }

    async fn owner_of(&self, nft: Address, token_id: U256) -> Result<Address, crate::Error> {
        let ledger = self.ledger("owner_of");
        ledger
            .owners
            .get(&(nft, token_id))
            .copied()
            .ok_or_else(|| crate::Error::Rpc("execution reverted: invalid token ID".into()))
    }

    async fn get_approved(&self, nft: Address, token_id: U256) -> Result<Address, crate::Error> {
        let ledger = self.ledger("get_approved");
        Ok(ledger
            .approvals
            .get(&(nft, token_id))
            .copied()
            .unwrap_or_default())
    }
}

#[async_trait]
impl CoinReader for MockChain {
    fn coin_address(&self) -> Address {
        self.coin
    }

    async fn coin_balance(&self, owner: Address) -> Result<U256, crate::Error> {
        let ledger = self.ledger("coin_balance");
        Ok(ledger.coin.get(&owner).copied().unwrap_or_default())
    }

    async fn ether_balance(&self, owner: Address) -> Result<U256, crate::Error> {
        let ledger = self.ledger("ether_balance");
        Ok(ledger.ether.get(&owner).copied().unwrap_or_default())
    }

    async fn buy_rate(&self) -> Result<U256, crate::Error> {
        Ok(self.ledger("buy_rate").rates.0)
    }

    async fn sell_rate(&self) -> Result<U256, crate::Error> {
        Ok(self.ledger("sell_rate").rates.1)
    }
}

#[async_trait]
impl ProfileReader for MockChain {
    fn profiles_address(&self) -> Address {
        self.profiles
    }

    async fn user_profile(&self, owner: Address) -> Result<Option<UserProfile>, crate::Error> {
        let ledger = self.ledger("user_profile");
        Ok(ledger.profiles.get(&owner).cloned())
    }
}

#[async_trait]
impl Transactor for MockChain {
    async fn estimate_gas(&self, _from: Address, _tx: &TxCall) -> Result<u64, crate::Error> {
        let ledger = self.ledger("estimate_gas");
        match &ledger.estimate_error {
            Some(reason) => Err(crate::Error::Estimation(reason.clone())),
            None => Ok(21_000),
        }
    }

    async fn send_transaction(
        &self,
        from: Address,
        tx: &TxCall,
        gas_limit: Option<u64>,
    ) -> Result<B256, crate::Error> {
        let mut ledger = self.ledger("send_transaction");
        ledger.sent.push(SentTx {
            from,
            tx: tx.clone(),
            gas_limit,
        });
        Ok(tx_hash(ledger.sent.len() - 1))
    }

    async fn wait_for_confirmation(&self, hash: B256) -> Result<(), crate::Error> {
        drop(self.ledger("wait_for_confirmation"));
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !*held).await;

        let mut ledger = self.ledger.lock().unwrap();
        if std::mem::take(&mut ledger.revert_next) {
            return Err(crate::Error::Submission {
                hash: Some(hash),
                reason: "Transaction reverted".into(),
            });
        }
        let sent = (0..ledger.sent.len())
            .find(|i| tx_hash(*i) == hash)
            .map(|i| ledger.sent[i].clone());
        if let Some(sent) = sent {
            self.apply(&mut ledger, &sent);
        }
        Ok(())
    }
}

// --- Notifier ---

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<(String, NoticeKind)>>,
}

impl RecordingNotifier {
    pub(crate) fn errors(&self) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, kind)| *kind == NoticeKind::Error)
            .map(|(message, _)| message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        self.notices
            .lock()
            .unwrap()
            .push((message.to_string(), kind));
    }
}

// --- Harness ---

/// `AppState` over a [`MockWallet`] and a [`MockChain`].
pub(crate) struct Harness {
    pub state: AppState,
    pub wallet: Arc<MockWallet>,
    pub chain: Arc<MockChain>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn build(account: Address, config: Config) -> Self {
        let wallet = MockWallet::new(vec![account], 1);
        let chain = Arc::new(MockChain::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Arc::new(WalletSession::new(Some(
            wallet.clone() as Arc<dyn WalletProvider>
        )));
        let state = AppState::with_chain(config, session, chain.clone(), notifier.clone());
        Self {
            state,
            wallet,
            chain,
            notifier,
        }
    }

    /// Session connected as `account`; no chain reads made yet.
    pub(crate) async fn connected(account: Address) -> Self {
        Self::with_config(account, Config::default()).await
    }

    pub(crate) async fn with_config(account: Address, config: Config) -> Self {
        let h = Self::build(account, config);
        h.state.session.connect().await.unwrap();
        h
    }

    /// Wallet present but never connected.
    pub(crate) async fn disconnected() -> Self {
        Self::build(addr(1), Config::default())
    }
}
