//! Claim eligibility checks.
//!
//! [`EligibilityGate::check`] answers whether an address may receive a grant
//! right now. It is read-only: a failed membership query is reported as a
//! [`GateError`] and never confused with ineligibility.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
#[cfg(feature = "telemetry")]
use tracing::instrument;

use crate::asset::AssetKind;
use crate::chain::{ChainClient, ChainError, token_balance, with_timeout};

/// Input text that is not a 20-byte hex address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("not a valid address")]
pub struct InvalidAddress;

/// Parses a chain address from user input.
///
/// Accepts 40 hex digits with an optional `0x` prefix. All-lowercase and
/// all-uppercase input is taken as-is; mixed-case input must carry a valid
/// EIP-55 checksum.
///
/// # Errors
///
/// Returns [`InvalidAddress`] if the input does not satisfy these rules.
pub fn parse_address(input: &str) -> Result<Address, InvalidAddress> {
    let input = input.trim();
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    if digits.len() != 40 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(InvalidAddress);
    }
    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper {
        Address::parse_checksummed(format!("0x{digits}"), None).map_err(|_| InvalidAddress)
    } else {
        Address::from_str(digits).map_err(|_| InvalidAddress)
    }
}

/// Why an address may not claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IneligibleReason {
    /// Malformed address, or the zero address.
    BadAddress,
    /// Token claims require holding at least one NFT from the configured club.
    NotMember,
    /// The faucet does not pay itself.
    FaucetAddress,
}

impl Display for IneligibleReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadAddress => f.write_str("bad_address"),
            Self::NotMember => f.write_str("not_member"),
            Self::FaucetAddress => f.write_str("faucet_address"),
        }
    }
}

/// Result of an eligibility check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// The address may claim.
    Eligible(Address),
    /// The address may not claim.
    Ineligible(IneligibleReason),
}

/// A recoverable failure while checking eligibility.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The membership query could not be completed.
    #[error("membership check failed: {0}")]
    Chain(#[from] ChainError),
}

/// Decides whether a destination address may receive a grant.
#[derive(Debug)]
pub struct EligibilityGate<C> {
    client: Arc<C>,
    faucet_address: Address,
    nft_contract: Option<Address>,
    rpc_timeout: Duration,
}

impl<C: ChainClient> EligibilityGate<C> {
    /// Creates a gate. When `nft_contract` is set, token claims require a
    /// non-zero `balanceOf` on it.
    pub const fn new(
        client: Arc<C>,
        faucet_address: Address,
        nft_contract: Option<Address>,
        rpc_timeout: Duration,
    ) -> Self {
        Self {
            client,
            faucet_address,
            nft_contract,
            rpc_timeout,
        }
    }

    /// The configured NFT-club contract, if any.
    #[must_use]
    pub const fn nft_contract(&self) -> Option<Address> {
        self.nft_contract
    }

    /// Checks whether `address` may claim an asset of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] if the NFT membership query fails or times out.
    #[cfg_attr(feature = "telemetry", instrument(skip(self), err))]
    pub async fn check(&self, address: &str, kind: AssetKind) -> Result<Eligibility, GateError> {
        let Ok(address) = parse_address(address) else {
            return Ok(Eligibility::Ineligible(IneligibleReason::BadAddress));
        };
        if address.is_zero() {
            return Ok(Eligibility::Ineligible(IneligibleReason::BadAddress));
        }
        if address == self.faucet_address {
            return Ok(Eligibility::Ineligible(IneligibleReason::FaucetAddress));
        }
        if kind == AssetKind::FungibleToken
            && let Some(nft) = self.nft_contract
        {
            let held = self.membership_balance(nft, address).await?;
            if held.is_zero() {
                return Ok(Eligibility::Ineligible(IneligibleReason::NotMember));
            }
        }
        Ok(Eligibility::Eligible(address))
    }

    /// Number of club NFTs held by `address`, or `None` without an NFT gate.
    ///
    /// # Errors
    ///
    /// Returns [`GateError`] if the query fails or times out.
    pub async fn nft_balance(&self, address: Address) -> Result<Option<U256>, GateError> {
        match self.nft_contract {
            Some(nft) => Ok(Some(self.membership_balance(nft, address).await?)),
            None => Ok(None),
        }
    }

    async fn membership_balance(&self, nft: Address, owner: Address) -> Result<U256, GateError> {
        let balance =
            with_timeout(self.rpc_timeout, token_balance(self.client.as_ref(), nft, owner)).await?;
        Ok(balance)
    }
}
