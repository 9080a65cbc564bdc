//! Chain access abstraction.
//!
//! The engine talks to the blockchain only through [`ChainClient`]. The
//! production implementation lives in `spigot-evm`; tests plug in in-process
//! mocks. Every call the engine makes is bounded by [`with_timeout`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash, U256};

use crate::contract;
use crate::signer::SignerAccount;

/// Fee parameters read from the node right before signing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    /// EIP-1559 dynamic fee.
    Eip1559 {
        /// Maximum total fee per gas, in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas, in wei.
        max_priority_fee_per_gas: u128,
    },
    /// Pre-London gas price.
    Legacy {
        /// Gas price, in wei.
        gas_price: u128,
    },
}

/// A fully specified transaction, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxParams {
    /// Sender; always the faucet's signer address.
    pub from: Address,
    /// Recipient for native transfers, token contract for token transfers.
    pub to: Address,
    /// Native value in wei.
    pub value: U256,
    /// Call data; empty for native transfers.
    pub input: Bytes,
    /// Sender nonce.
    pub nonce: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Fee parameters.
    pub fee: FeeParams,
    /// EIP-155 chain id.
    pub chain_id: u64,
}

/// Errors surfaced by a [`ChainClient`].
///
/// Implementations classify their transport errors into these variants so the
/// engine never sees a raw transport error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The node could not be reached or returned a transport-level error.
    #[error("RPC unavailable: {0}")]
    Unavailable(String),
    /// The call did not complete in time.
    #[error("RPC call timed out after {0:?}")]
    Timeout(Duration),
    /// The node reported that the sender cannot cover value plus gas.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    /// The node refused the transaction (bad nonce, underpriced, reverted estimate, ...).
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// The transaction was broadcast but its receipt did not arrive in time.
    #[error("transaction {tx_hash} submitted but unconfirmed: {reason}")]
    Unconfirmed {
        /// Hash of the broadcast transaction.
        tx_hash: TxHash,
        /// Why confirmation failed.
        reason: String,
    },
    /// A response could not be decoded.
    #[error("failed to decode response: {0}")]
    Decode(String),
    /// Local signing failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

impl ChainError {
    /// Whether the failure is an infrastructure hiccup worth retrying later.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Timeout(_) | Self::Unconfirmed { .. }
        )
    }

    /// The transaction hash, if the transaction is known to have been broadcast.
    #[must_use]
    pub const fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Unconfirmed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

/// Read and write access to one EVM chain.
///
/// All methods are fallible remote calls. Callers bound them with
/// [`with_timeout`].
pub trait ChainClient: Send + Sync + 'static {
    /// Native balance of `address`, in wei.
    fn get_balance(&self, address: Address) -> impl Future<Output = Result<U256, ChainError>> + Send;

    /// Next nonce for `address`, including transactions still in the mempool.
    fn get_nonce(&self, address: Address) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// Current fee estimate.
    fn estimate_fee(&self) -> impl Future<Output = Result<FeeParams, ChainError>> + Send;

    /// Signs `tx` with `signer` and broadcasts it.
    fn sign_and_send(
        &self,
        tx: TxParams,
        signer: &SignerAccount,
    ) -> impl Future<Output = Result<TxHash, ChainError>> + Send;

    /// Read-only `eth_call` against `contract`.
    fn call(
        &self,
        contract: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, ChainError>> + Send;
}

impl<T: ChainClient> ChainClient for Arc<T> {
    fn get_balance(&self, address: Address) -> impl Future<Output = Result<U256, ChainError>> + Send {
        (**self).get_balance(address)
    }

    fn get_nonce(&self, address: Address) -> impl Future<Output = Result<u64, ChainError>> + Send {
        (**self).get_nonce(address)
    }

    fn estimate_fee(&self) -> impl Future<Output = Result<FeeParams, ChainError>> + Send {
        (**self).estimate_fee()
    }

    fn sign_and_send(
        &self,
        tx: TxParams,
        signer: &SignerAccount,
    ) -> impl Future<Output = Result<TxHash, ChainError>> + Send {
        (**self).sign_and_send(tx, signer)
    }

    fn call(
        &self,
        contract: Address,
        calldata: Bytes,
    ) -> impl Future<Output = Result<Bytes, ChainError>> + Send {
        (**self).call(contract, calldata)
    }
}

/// Awaits `fut`, mapping an elapsed `limit` to [`ChainError::Timeout`].
///
/// A zero `limit` disables the timeout.
///
/// # Errors
///
/// Returns the future's own error, or [`ChainError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, fut: F) -> Result<T, ChainError>
where
    F: Future<Output = Result<T, ChainError>>,
{
    if limit.is_zero() {
        return fut.await;
    }
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ChainError::Timeout(limit))?
}

/// Reads the ERC-20 / ERC-721 `balanceOf(owner)` on `contract`.
///
/// # Errors
///
/// Returns the client's error, or [`ChainError::Decode`] if the return data is
/// not a `uint256`.
pub async fn token_balance<C: ChainClient>(
    client: &C,
    contract: Address,
    owner: Address,
) -> Result<U256, ChainError> {
    let data = client
        .call(contract, contract::balance_of_calldata(owner))
        .await?;
    contract::decode_balance(&data).map_err(|e| ChainError::Decode(e.to_string()))
}

/// Reads the ERC-20 `decimals()` of `contract`.
///
/// # Errors
///
/// Returns the client's error, or [`ChainError::Decode`] if the return data is
/// not a `uint8`.
pub async fn token_decimals<C: ChainClient>(client: &C, contract: Address) -> Result<u8, ChainError> {
    let data = client.call(contract, contract::decimals_calldata()).await?;
    contract::decode_decimals(&data).map_err(|e| ChainError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_elapses() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, ChainError>(1u64)
        };
        let result = with_timeout(Duration::from_secs(5), slow).await;
        assert_eq!(result, Err(ChainError::Timeout(Duration::from_secs(5))));
    }

    #[tokio::test]
    async fn test_with_timeout_passes_through() {
        let fast = async { Err::<u64, _>(ChainError::Rejected("nonce too low".into())) };
        let result = with_timeout(Duration::from_secs(5), fast).await;
        assert_eq!(result, Err(ChainError::Rejected("nonce too low".into())));
        let ok = with_timeout(Duration::ZERO, async { Ok::<_, ChainError>(7u64) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ChainError::Unavailable("connection refused".into()).is_transient());
        assert!(ChainError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(
            ChainError::Unconfirmed {
                tx_hash: TxHash::ZERO,
                reason: "timeout".into()
            }
            .is_transient()
        );
        assert!(!ChainError::InsufficientFunds("balance 0".into()).is_transient());
        assert!(!ChainError::Rejected("underpriced".into()).is_transient());
    }
}
