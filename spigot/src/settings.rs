//! Faucet settings and their validation.
//!
//! [`FaucetSection`] is the raw `[faucet]` table as read from configuration.
//! [`FaucetSection::validate`] turns it into [`FaucetSettings`], whose fields
//! are all checked. Any problem is a [`SettingsError`], which the binary
//! treats as fatal at startup.

use std::num::NonZeroU32;
use std::time::Duration;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::amount::{AmountError, parse_units};
use crate::asset::{AssetKind, Grant};
use crate::disburser::{DisburserConfig, NATIVE_TRANSFER_GAS, TOKEN_TRANSFER_GAS};
use crate::gate::parse_address;
use crate::ledger::ClaimLedger;
use crate::router::RouterConfig;
use crate::signer::SignerAccount;

/// Decimals of every EVM native coin.
pub const NATIVE_DECIMALS: u8 = 18;

/// Invalid faucet configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// No signer key configured, or an unexpanded `$VAR` reference.
    #[error("signer_private_key is not set")]
    MissingSignerKey,
    /// The signer key does not parse.
    #[error("signer_private_key is not a valid private key")]
    InvalidSignerKey,
    /// `claim_limit` is zero.
    #[error("claim_limit must be at least 1")]
    InvalidClaimLimit,
    /// `claim_window_secs` is zero.
    #[error("claim_window_secs must be greater than zero")]
    InvalidWindow,
    /// `rpc_timeout_secs` is zero, which would leave chain calls unbounded.
    #[error("rpc_timeout_secs must be greater than zero")]
    InvalidRpcTimeout,
    /// The grant amount does not parse.
    #[error("amount: {0}")]
    InvalidAmount(#[from] AmountError),
    /// A contract address is malformed.
    #[error("{field} is not a valid address: {value:?}")]
    InvalidContract {
        /// Name of the offending option.
        field: &'static str,
        /// The configured value.
        value: String,
    },
    /// Token grants need a token contract.
    #[error("asset = \"fungible_token\" requires token_contract")]
    MissingTokenContract,
    /// A gas limit is zero.
    #[error("{0} must be greater than zero")]
    InvalidGasLimit(&'static str),
}

/// The `[faucet]` configuration table.
///
/// The camel-case aliases (`claimLimit`, `limitDuration`, `coinAmount`,
/// `chainId`) are accepted for compatibility with older deployments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaucetSection {
    /// Hex private key of the faucet account. Supports `$VAR` expansion.
    #[serde(default)]
    pub signer_private_key: String,

    /// EIP-155 chain id.
    #[serde(alias = "chainId")]
    pub chain_id: u64,

    /// Asset handed out (default: `native_coin`).
    #[serde(default = "default_asset")]
    pub asset: AssetKind,

    /// Grant per claim, as a decimal string in whole units (e.g. `"0.5"`).
    #[serde(alias = "coinAmount")]
    pub amount: String,

    /// Asset decimals. Native coins default to 18; tokens are read from the
    /// contract when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decimals: Option<u8>,

    /// Ticker shown in replies. Defaults to the network's native symbol for
    /// coins.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,

    /// Claims allowed per identity per window (default: 1).
    #[serde(default = "default_claim_limit", alias = "claimLimit")]
    pub claim_limit: u32,

    /// Rolling window length in seconds (default: 86400).
    #[serde(default = "default_claim_window_secs", alias = "limitDuration")]
    pub claim_window_secs: u64,

    /// ERC-20 contract for token grants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_contract: Option<String>,

    /// NFT contract whose holders may claim tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_contract: Option<String>,

    /// NFT club symbol used in membership replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nft_symbol: Option<String>,

    /// Extra text sent to non-members explaining how to join.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub membership_hint: Option<String>,

    /// Gas limit for native transfers (default: 21000).
    #[serde(default = "default_native_gas_limit")]
    pub native_gas_limit: u64,

    /// Gas limit for token transfers (default: 100000).
    #[serde(default = "default_token_gas_limit")]
    pub token_gas_limit: u64,

    /// Timeout for each RPC read in seconds (default: 15).
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,

    /// How long to wait for a receipt after broadcast, in seconds. `0`
    /// returns as soon as the node accepts the transaction (default: 0).
    #[serde(default)]
    pub receipt_timeout_secs: u64,
}

const fn default_asset() -> AssetKind {
    AssetKind::NativeCoin
}

const fn default_claim_limit() -> u32 {
    1
}

const fn default_claim_window_secs() -> u64 {
    86_400
}

const fn default_native_gas_limit() -> u64 {
    NATIVE_TRANSFER_GAS
}

const fn default_token_gas_limit() -> u64 {
    TOKEN_TRANSFER_GAS
}

const fn default_rpc_timeout_secs() -> u64 {
    15
}

fn contract_address(field: &'static str, value: Option<&str>) -> Result<Option<Address>, SettingsError> {
    value
        .map(|v| {
            parse_address(v).map_err(|_| SettingsError::InvalidContract {
                field,
                value: v.to_owned(),
            })
        })
        .transpose()
}

impl FaucetSection {
    /// Parsed `token_contract`, needed before validation to read decimals.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidContract`] if it is malformed.
    pub fn token_contract_address(&self) -> Result<Option<Address>, SettingsError> {
        contract_address("token_contract", self.token_contract.as_deref())
    }

    /// Decimals known without asking the chain.
    #[must_use]
    pub fn declared_decimals(&self) -> Option<u8> {
        match (self.decimals, self.asset) {
            (Some(decimals), _) => Some(decimals),
            (None, AssetKind::NativeCoin) => Some(NATIVE_DECIMALS),
            (None, AssetKind::FungibleToken) => None,
        }
    }

    /// Validates the section.
    ///
    /// `decimals` is the asset's resolved decimals; `default_symbol` is used
    /// when no `symbol` is configured.
    ///
    /// # Errors
    ///
    /// Returns the first [`SettingsError`] found.
    pub fn validate(self, decimals: u8, default_symbol: &str) -> Result<FaucetSettings, SettingsError> {
        let key = self.signer_private_key.trim();
        if key.is_empty() || key.starts_with('$') {
            return Err(SettingsError::MissingSignerKey);
        }
        let signer =
            SignerAccount::from_private_key(key).map_err(|_| SettingsError::InvalidSignerKey)?;

        let claim_limit = NonZeroU32::new(self.claim_limit).ok_or(SettingsError::InvalidClaimLimit)?;
        if self.claim_window_secs == 0 {
            return Err(SettingsError::InvalidWindow);
        }
        if self.rpc_timeout_secs == 0 {
            return Err(SettingsError::InvalidRpcTimeout);
        }
        if self.native_gas_limit == 0 {
            return Err(SettingsError::InvalidGasLimit("native_gas_limit"));
        }
        if self.token_gas_limit == 0 {
            return Err(SettingsError::InvalidGasLimit("token_gas_limit"));
        }

        let token_contract = self.token_contract_address()?;
        let nft_contract = contract_address("nft_contract", self.nft_contract.as_deref())?;
        if self.asset == AssetKind::FungibleToken && token_contract.is_none() {
            return Err(SettingsError::MissingTokenContract);
        }

        let amount = parse_units(&self.amount, decimals)?;
        let grant = Grant {
            kind: self.asset,
            amount,
            decimals,
            symbol: self.symbol.unwrap_or_else(|| default_symbol.to_owned()),
        };

        Ok(FaucetSettings {
            signer,
            chain_id: self.chain_id,
            grant,
            claim_limit,
            claim_window: Duration::from_secs(self.claim_window_secs),
            token_contract,
            nft_contract,
            nft_symbol: self.nft_symbol,
            membership_hint: self.membership_hint,
            native_gas_limit: self.native_gas_limit,
            token_gas_limit: self.token_gas_limit,
            rpc_timeout: Duration::from_secs(self.rpc_timeout_secs),
            receipt_timeout: Duration::from_secs(self.receipt_timeout_secs),
        })
    }
}

/// Validated faucet settings.
#[derive(Debug, Clone)]
pub struct FaucetSettings {
    /// The faucet account.
    pub signer: SignerAccount,
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Grant per claim.
    pub grant: Grant,
    /// Claims per identity per window.
    pub claim_limit: NonZeroU32,
    /// Rolling window length.
    pub claim_window: Duration,
    /// ERC-20 contract, if configured.
    pub token_contract: Option<Address>,
    /// NFT gate contract, if configured.
    pub nft_contract: Option<Address>,
    /// NFT club symbol.
    pub nft_symbol: Option<String>,
    /// How to join the club.
    pub membership_hint: Option<String>,
    /// Gas limit for native transfers.
    pub native_gas_limit: u64,
    /// Gas limit for token transfers.
    pub token_gas_limit: u64,
    /// Timeout for each RPC read.
    pub rpc_timeout: Duration,
    /// Receipt wait after broadcast; zero disables waiting.
    pub receipt_timeout: Duration,
}

impl FaucetSettings {
    /// Parameters for the [`Disburser`](crate::disburser::Disburser).
    ///
    /// Sends are bounded by twice the RPC timeout plus the receipt wait, so
    /// the client's own receipt wait ends first and a broadcast hash is kept.
    #[must_use]
    pub fn disburser_config(&self) -> DisburserConfig {
        DisburserConfig {
            chain_id: self.chain_id,
            token_contract: self.token_contract,
            native_gas_limit: self.native_gas_limit,
            token_gas_limit: self.token_gas_limit,
            rpc_timeout: self.rpc_timeout,
            send_timeout: self.rpc_timeout * 2 + self.receipt_timeout,
        }
    }

    /// Parameters for the [`RequestRouter`](crate::router::RequestRouter).
    #[must_use]
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            grant: self.grant.clone(),
            nft_symbol: self.nft_symbol.clone(),
            membership_hint: self.membership_hint.clone(),
        }
    }

    /// A fresh, empty ledger with the configured limit and window.
    #[must_use]
    pub fn ledger(&self) -> ClaimLedger {
        ClaimLedger::new(self.claim_limit, self.claim_window)
    }
}
