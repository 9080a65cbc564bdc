//! Value types exchanged between the router, ledger and disburser.

use std::fmt::{Display, Formatter};

use alloy_primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::amount::format_units;
use crate::timestamp::UnixTimestamp;

/// Stable identifier of a chat user. Used only as a ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterIdentity(pub i64);

impl Display for RequesterIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RequesterIdentity {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// Which asset the faucet hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// The chain's native coin, sent as transaction value.
    NativeCoin,
    /// An ERC-20 token, sent through `transfer(recipient, amount)`.
    FungibleToken,
}

impl Display for AssetKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NativeCoin => f.write_str("native_coin"),
            Self::FungibleToken => f.write_str("fungible_token"),
        }
    }
}

/// An immutable request to move `amount` base units of `kind` to `destination`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisbursementRequest {
    /// Recipient of the grant.
    pub destination: Address,
    /// Amount in the asset's base units.
    pub amount: U256,
    /// Asset to send.
    pub kind: AssetKind,
}

/// Result of a successful broadcast. Returned to the caller, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Hash of the broadcast transaction.
    pub transaction_hash: TxHash,
    /// When the transaction was handed to the node.
    pub submitted_at: UnixTimestamp,
}

/// The fixed grant handed out per claim, with enough metadata to render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    /// Asset kind.
    pub kind: AssetKind,
    /// Amount in base units.
    pub amount: U256,
    /// Decimals of the asset, used for display.
    pub decimals: u8,
    /// Ticker symbol, used for display.
    pub symbol: String,
}

impl Grant {
    /// Formats an arbitrary base-unit amount of this grant's asset,
    /// e.g. `"0.5 ETH"`.
    #[must_use]
    pub fn display_amount(&self, value: U256) -> String {
        format!("{} {}", format_units(value, self.decimals), self.symbol)
    }
}

impl Display for Grant {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display_amount(self.amount))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_display() {
        let grant = Grant {
            kind: AssetKind::FungibleToken,
            amount: U256::from(500_000_000_000u64),
            decimals: 9,
            symbol: "TTK".into(),
        };
        assert_eq!(grant.to_string(), "500 TTK");
        assert_eq!(
            grant.display_amount(U256::from(1_250_000_000u64)),
            "1.25 TTK"
        );
    }

    #[test]
    fn test_asset_kind_serde() {
        let kind: AssetKind = serde_json::from_str("\"fungible_token\"").unwrap();
        assert_eq!(kind, AssetKind::FungibleToken);
        assert_eq!(
            serde_json::to_string(&AssetKind::NativeCoin).unwrap(),
            "\"native_coin\""
        );
    }
}
