//! Client configuration.

use alloy_primitives::Address;
use serde::Deserialize;

/// Configuration for the GymBid client.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// JSON-RPC endpoint of the wallet/node. Empty means no wallet.
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::auction_address")]
    pub auction_address: Address,

    #[serde(default = "defaults::coin_address")]
    pub coin_address: Address,

    #[serde(default = "defaults::profiles_address")]
    pub profiles_address: Address,

    /// Gas ceiling for create/stop/approve/exchange/register transactions.
    #[serde(default = "defaults::gas_limit")]
    pub gas_limit: u64,

    /// Optional gas ceiling for bids. `None` lets the wallet decide.
    #[serde(default)]
    pub bid_gas_limit: Option<u64>,

    #[serde(default = "defaults::confirmation_poll_ms")]
    pub confirmation_poll_ms: u64,

    #[serde(default = "defaults::confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,

    /// How often the HTTP provider polls for account/chain changes.
    #[serde(default = "defaults::event_poll_ms")]
    pub event_poll_ms: u64,

    /// Periodic directory refresh in the headless binary.
    #[serde(default = "defaults::refresh_interval_secs")]
    pub refresh_interval_secs: u64,

    #[serde(default = "defaults::tx_log_capacity")]
    pub tx_log_capacity: usize,

    /// GymCoin total supply in whole coins; upper bound for any single trade.
    #[serde(default = "defaults::coin_supply_cap")]
    pub coin_supply_cap: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            auction_address: defaults::auction_address(),
            coin_address: defaults::coin_address(),
            profiles_address: defaults::profiles_address(),
            gas_limit: defaults::gas_limit(),
            bid_gas_limit: None,
            confirmation_poll_ms: defaults::confirmation_poll_ms(),
            confirmation_timeout_secs: defaults::confirmation_timeout_secs(),
            event_poll_ms: defaults::event_poll_ms(),
            refresh_interval_secs: defaults::refresh_interval_secs(),
            tx_log_capacity: defaults::tx_log_capacity(),
            coin_supply_cap: defaults::coin_supply_cap(),
        }
    }
}

impl Config {
    /// Load from optional `gymbid.toml` plus `GYMBID_*` env vars.
    ///
    /// A missing file falls back to defaults; malformed values are an error.
    pub fn load() -> Result<Self, crate::Error> {
        config::Config::builder()
            .add_source(config::File::with_name("gymbid").required(false))
            .add_source(config::Environment::with_prefix("GYMBID"))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(e.to_string()))
    }
}

mod defaults {
    use alloy_primitives::{address, Address};

    pub fn rpc_url() -> String {
        std::env::var("ETH_RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".into())
    }

    pub fn auction_address() -> Address {
        address!("0x5823017D5C311897E851CBeBd6aBBAB435cC67f2")
    }

    pub fn coin_address() -> Address {
        address!("0xBFe502F7dC638Daec7fB1519a01F3cFC153Ba9dB")
    }

    pub fn profiles_address() -> Address {
        address!("0xB4c079f32c0443ff1Ab5091484BFDc9b495132A7")
    }

    pub fn gas_limit() -> u64 {
        300_000
    }

    pub fn confirmation_poll_ms() -> u64 {
        1_000
    }

    pub fn confirmation_timeout_secs() -> u64 {
        120
    }

    pub fn event_poll_ms() -> u64 {
        2_000
    }

    pub fn refresh_interval_secs() -> u64 {
        15
    }

    pub fn tx_log_capacity() -> usize {
        50
    }

    pub fn coin_supply_cap() -> u64 {
        10_000
    }
}
