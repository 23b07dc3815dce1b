//! Decimal amount parsing and display (18-decimal units).

use alloy_primitives::utils::{format_ether, parse_ether};
use alloy_primitives::U256;

/// One whole coin/ether in base units.
pub const ONE_UNIT: u64 = 1_000_000_000_000_000_000;

/// Parse a user-entered decimal amount into base units.
pub fn parse_amount(raw: &str) -> Result<U256, crate::Error> {
    let raw = raw.trim();
    // `parse_ether` returns the absolute value of negative input.
    if raw.is_empty() || raw.starts_with('-') {
        return Err(crate::Error::preflight("Please enter a valid amount"));
    }
    parse_ether(raw).map_err(|_| crate::Error::preflight("Please enter a valid amount"))
}

/// Whole units to base units.
pub fn whole_units(n: u64) -> U256 {
    U256::from(n) * U256::from(ONE_UNIT)
}

/// Base units as a short decimal: `100000000000000000` -> `"0.1"`.
pub fn format_amount(amount: U256) -> String {
    let full = format_ether(amount);
    if !full.contains('.') {
        return full;
    }
    full.trim_end_matches('0').trim_end_matches('.').to_string()
}
