//! GymCoin buy/sell/transfer and the session account's balances.

use crate::context::Context;
use crate::gateway::{self, ContractCall, TxCall};
use crate::notify::NoticeKind;
use crate::tx_log::{TransactionTicket, TxKind, TxStatus};
use crate::units::{format_amount, parse_amount, whole_units};
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balances {
    /// GymCoin base units (18 decimals).
    pub coin: U256,
    /// Wei.
    pub ether: U256,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Rates {
    pub buy_rate: U256,
    pub sell_rate: U256,
}

pub struct ExchangePipeline {
    ctx: Context,
    balances: Mutex<Balances>,
    rates: Mutex<Option<Rates>>,
}

impl ExchangePipeline {
    pub fn new(ctx: Context) -> Self {
        Self {
            ctx,
            balances: Mutex::new(Balances::default()),
            rates: Mutex::new(None),
        }
    }

    pub fn balances(&self) -> Balances {
        *self.balances.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn rates(&self) -> Option<Rates> {
        *self.rates.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn clear(&self) {
        *self.balances.lock().unwrap_or_else(|e| e.into_inner()) = Balances::default();
    }

    /// Re-read both balances of the session account.
    ///
    /// Each read is independent; a failed one keeps its previous value.
    pub async fn refresh_balances(&self) -> Balances {
        let Some(account) = self.ctx.session.snapshot().account else {
            self.clear();
            return Balances::default();
        };

        let coin = self.ctx.chain.coin_balance(account).await;
        let ether = self.ctx.chain.ether_balance(account).await;

        let mut balances = self.balances.lock().unwrap_or_else(|e| e.into_inner());
        match coin {
            Ok(v) => balances.coin = v,
            Err(e) => warn!(account = %account, error = %e, "Error loading GC balance"),
        }
        match ether {
            Ok(v) => balances.ether = v,
            Err(e) => warn!(account = %account, error = %e, "Error loading ETH balance"),
        }
        *balances
    }

    pub async fn load_rates(&self) -> Result<Rates, crate::Error> {
        let buy_rate = self.ctx.chain.buy_rate().await;
        let sell_rate = self.ctx.chain.sell_rate().await;
        match (buy_rate, sell_rate) {
            (Ok(buy_rate), Ok(sell_rate)) => {
                let rates = Rates {
                    buy_rate,
                    sell_rate,
                };
                *self.rates.lock().unwrap_or_else(|e| e.into_inner()) = Some(rates);
                Ok(rates)
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Error loading rates");
                Err(e)
            }
        }
    }

    // --- Trades ---

    /// Buy GymCoin, paying `amount` ether.
    pub async fn buy(&self, amount: &str) -> Result<B256, crate::Error> {
        let result = self.try_buy(amount).await;
        self.finish(TxKind::Buy, result, |value| {
            format!("Successfully bought {} GC", format_amount(value))
        })
        .await
    }

    async fn try_buy(&self, amount: &str) -> Result<(B256, U256, Option<Address>), crate::Error> {
        let from = self.ctx.session.signer()?.address();
        let value = self.checked_amount(amount)?;
        let ether = self.ctx.chain.ether_balance(from).await?;
        if value > ether {
            return Err(crate::Error::preflight("Insufficient ETH balance"));
        }

        let tx = TxCall::new(self.ctx.chain.coin_address(), ContractCall::BuyCoin { amount: value })
            .with_value(value);
        self.ctx.notify("Buying GymCoin...", NoticeKind::Loading);
        let hash = self.execute(from, &tx).await?;
        Ok((hash, value, None))
    }

    /// Sell `amount` GymCoin back to the contract.
    pub async fn sell(&self, amount: &str) -> Result<B256, crate::Error> {
        let result = self.try_sell(amount).await;
        self.finish(TxKind::Sell, result, |value| {
            format!("Successfully sold {} GC", format_amount(value))
        })
        .await
    }

    async fn try_sell(&self, amount: &str) -> Result<(B256, U256, Option<Address>), crate::Error> {
        let from = self.ctx.session.signer()?.address();
        let units = self.checked_amount(amount)?;
        self.ensure_coin_balance(units)?;

        let tx = TxCall::new(self.ctx.chain.coin_address(), ContractCall::SellCoin { amount: units });
        self.ctx.notify("Selling GymCoin...", NoticeKind::Loading);
        let hash = self.execute(from, &tx).await?;
        Ok((hash, units, None))
    }

    /// Send `amount` GymCoin to `recipient`.
    pub async fn transfer(&self, recipient: &str, amount: &str) -> Result<B256, crate::Error> {
        let result = self.try_transfer(recipient, amount).await;
        self.finish(TxKind::Transfer, result, |value| {
            format!("Successfully transferred {} GC", format_amount(value))
        })
        .await
    }

    async fn try_transfer(
        &self,
        recipient: &str,
        amount: &str,
    ) -> Result<(B256, U256, Option<Address>), crate::Error> {
        let from = self.ctx.session.signer()?.address();
        let recipient: Address = recipient
            .trim()
            .parse()
            .map_err(|_| crate::Error::preflight("Please enter a valid Ethereum address"))?;
        let units = self.checked_amount(amount)?;
        self.ensure_coin_balance(units)?;

        let tx = TxCall::new(
            self.ctx.chain.coin_address(),
            ContractCall::Transfer {
                recipient,
                amount: units,
            },
        );
        self.ctx.notify("Transferring GymCoin...", NoticeKind::Loading);
        let hash = self.execute(from, &tx).await?;
        Ok((hash, units, Some(recipient)))
    }

    // --- Shared steps ---

    /// Parse a trade amount: positive and within the supply cap.
    fn checked_amount(&self, amount: &str) -> Result<U256, crate::Error> {
        let units = parse_amount(amount)?;
        if units.is_zero() {
            return Err(crate::Error::preflight("Please enter a valid amount"));
        }
        if units > whole_units(self.ctx.config.coin_supply_cap) {
            return Err(crate::Error::preflight(format!(
                "Cannot exceed total supply of {} GC",
                group_thousands(self.ctx.config.coin_supply_cap)
            )));
        }
        Ok(units)
    }

    /// Checked against the last refreshed balance; no network call.
    fn ensure_coin_balance(&self, units: U256) -> Result<(), crate::Error> {
        if units > self.balances().coin {
            return Err(crate::Error::preflight("Insufficient GymCoin balance"));
        }
        Ok(())
    }

    async fn execute(&self, from: Address, tx: &TxCall) -> Result<B256, crate::Error> {
        gateway::execute(self.ctx.chain.as_ref(), from, tx, Some(self.ctx.config.gas_limit)).await
    }

    async fn finish(
        &self,
        kind: TxKind,
        result: Result<(B256, U256, Option<Address>), crate::Error>,
        message: impl FnOnce(U256) -> String,
    ) -> Result<B256, crate::Error> {
        match result {
            Ok((hash, amount, recipient)) => {
                let mut ticket = TransactionTicket::new(hash, TxStatus::Success, kind)
                    .with_amount(format_amount(amount));
                if let Some(recipient) = recipient {
                    ticket = ticket.with_recipient(recipient);
                }
                self.ctx.record_success(ticket, &message(amount));
                let balances = self.refresh_balances().await;
                info!(kind = ?kind, tx_hash = %hash, coin = %balances.coin, "Exchange confirmed");
                Ok(hash)
            }
            Err(e) => {
                self.ctx.report_failure(kind, &e);
                Err(e)
            }
        }
    }
}

/// `10000` -> `"10,000"`.
fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{addr, Harness};

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands(10_000), "10,000");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1_234_567), "1,234,567");
    }

    #[tokio::test]
    async fn test_sell_more_than_balance_rejected_locally() {
        let h = Harness::connected(addr(1)).await;
        h.chain.set_coin_balance(addr(1), whole_units(5));
        h.state.exchange.refresh_balances().await;
        let calls_before = h.chain.calls().len();

        let err = h.state.exchange.sell("6").await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient GymCoin balance");
        assert_eq!(h.chain.calls().len(), calls_before);
        assert_eq!(h.notifier.errors(), vec!["Insufficient GymCoin balance"]);
    }

    #[tokio::test]
    async fn test_buy_respects_supply_cap_and_ether() {
        let h = Harness::connected(addr(1)).await;
        h.chain.set_ether_balance(addr(1), whole_units(1));

        let err = h.state.exchange.buy("10001").await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot exceed total supply of 10,000 GC");
        let err = h.state.exchange.buy("0").await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid amount");
        let err = h.state.exchange.buy("2").await.unwrap_err();
        assert_eq!(err.to_string(), "Insufficient ETH balance");
        assert!(h.chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_buy_pays_value_and_refreshes_balance() {
        let h = Harness::connected(addr(1)).await;
        h.chain.set_ether_balance(addr(1), whole_units(3));

        h.state.exchange.buy("1").await.unwrap();
        let sent = h.chain.sent();
        assert_eq!(sent[0].tx.value, whole_units(1));
        assert_eq!(sent[0].gas_limit, Some(300_000));
        assert_eq!(
            sent[0].tx.call,
            ContractCall::BuyCoin {
                amount: whole_units(1)
            }
        );
        assert_eq!(h.state.exchange.balances().coin, whole_units(1));
        assert_eq!(h.state.tx_log.entries()[0].kind, TxKind::Buy);
    }

    #[tokio::test]
    async fn test_transfer_logs_recipient() {
        let h = Harness::connected(addr(1)).await;
        h.chain.set_coin_balance(addr(1), whole_units(10));
        h.state.exchange.refresh_balances().await;

        h.state
            .exchange
            .transfer(&addr(4).to_string(), "2.5")
            .await
            .unwrap();
        let ticket = &h.state.tx_log.entries()[0];
        assert_eq!(ticket.recipient, Some(addr(4)));
        assert_eq!(ticket.amount.as_deref(), Some("2.5"));
        assert_eq!(
            h.state.exchange.balances().coin,
            whole_units(10) - U256::from(2_500_000_000_000_000_000u64)
        );
    }

    #[tokio::test]
    async fn test_transfer_rejects_bad_recipient() {
        let h = Harness::connected(addr(1)).await;
        let err = h.state.exchange.transfer("bob", "1").await.unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid Ethereum address");
        assert!(h.chain.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_respects_supply_cap() {
        let h = Harness::connected(addr(1)).await;
        h.chain.set_coin_balance(addr(1), whole_units(20_000));
        h.state.exchange.refresh_balances().await;

        let err = h
            .state
            .exchange
            .transfer(&addr(4).to_string(), "15000")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot exceed total supply of 10,000 GC");
        assert!(h.chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_load_rates() {
        let h = Harness::connected(addr(1)).await;
        h.chain.set_rates(U256::from(100), U256::from(90));
        let rates = h.state.exchange.load_rates().await.unwrap();
        assert_eq!(rates.buy_rate, U256::from(100));
        assert_eq!(h.state.exchange.rates(), Some(rates));
    }

    #[tokio::test]
    async fn test_trades_require_connection() {
        let h = Harness::disconnected().await;
        assert!(h.state.exchange.sell("1").await.is_err());
        assert!(h.state.exchange.buy("1").await.is_err());
        assert!(h.chain.calls().is_empty());
    }
}
