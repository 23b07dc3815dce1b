//! JSON-RPC over HTTP wallet provider for headless use.
//!
//! A node with unlocked accounts plays the wallet: it answers
//! `eth_accounts`, signs `eth_sendTransaction`, and has no push channel, so
//! account/chain changes are synthesized by [`HttpProvider::watch_changes`].

use super::{parse_accounts, parse_quantity, ProviderError, WalletEvent, WalletProvider};
use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ProviderError>,
}

pub struct HttpProvider {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    events: broadcast::Sender<WalletEvent>,
}

impl HttpProvider {
    pub fn new(url: &str) -> Result<Self, crate::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| crate::Error::Config(format!("HTTP client build failed: {e}")))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        info!(url, "HTTP wallet provider initialized");
        Ok(Self {
            http,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            events,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Poll accounts and chain id, emitting change events until `cancel`.
    pub async fn watch_changes(&self, interval: Duration, cancel: CancellationToken) {
        let mut last_accounts: Option<Vec<Address>> = None;
        let mut last_chain: Option<u64> = None;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {},
                _ = cancel.cancelled() => {
                    info!("Wallet change poller shutting down");
                    return;
                }
            }

            match self.poll_state().await {
                Ok((accounts, chain_id)) => {
                    if last_chain.is_some_and(|c| c != chain_id) {
                        let _ = self.events.send(WalletEvent::ChainChanged(chain_id));
                    }
                    if last_accounts.as_ref().is_some_and(|a| *a != accounts) {
                        let _ = self.events.send(WalletEvent::AccountsChanged(accounts.clone()));
                    }
                    last_chain = Some(chain_id);
                    last_accounts = Some(accounts);
                }
                Err(e) => warn!(error = %e, "Wallet state poll failed"),
            }
        }
    }

    async fn poll_state(&self) -> Result<(Vec<Address>, u64), crate::Error> {
        let accounts = parse_accounts(self.request("eth_accounts", json!([])).await?)?;
        let chain_id = parse_quantity(&self.request("eth_chainId", json!([])).await?)?;
        Ok((accounts, chain_id))
    }
}

#[async_trait]
impl WalletProvider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(id, method, "JSON-RPC request");

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("{method} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ProviderError::transport(format!(
                "{method} failed: HTTP {status}"
            )));
        }

        let envelope: RpcResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::transport(format!("{method}: invalid response: {e}")))?;

        match envelope.error {
            Some(err) => Err(err),
            None => Ok(envelope.result.unwrap_or(Value::Null)),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}
