//! Building, signing and broadcasting grant transfers.
//!
//! The [`Disburser`] owns the faucet's single [`SignerAccount`] and a
//! submission lock holding the cached nonce:
//!
//! - **First send**: queries the pending nonce from the chain
//! - **Subsequent sends**: increments the cached nonce locally
//! - **On failure**: clears the cache so the next send re-queries
//!
//! Nonce read, fee read, signing and broadcast all happen under the lock, so
//! concurrent sends get strictly increasing nonces with no gap and no reuse.
//! The balance pre-check runs before the lock is taken.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, TxHash, U256};
use tokio::sync::Mutex;

use crate::asset::{AssetKind, DisbursementRequest, TransactionReceipt};
use crate::chain::{ChainClient, ChainError, TxParams, token_balance, with_timeout};
use crate::contract;
use crate::signer::SignerAccount;
use crate::timestamp::UnixTimestamp;

/// Default gas limit for native transfers.
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Default gas limit for ERC-20 `transfer` calls.
pub const TOKEN_TRANSFER_GAS: u64 = 100_000;

/// Awaits a future, optionally instrumenting it with a tracing span.
macro_rules! traced {
    ($fut:expr, $span:expr) => {{
        #[cfg(feature = "telemetry")]
        {
            use tracing::Instrument;
            $fut.instrument($span).await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            $fut.await
        }
    }};
}

/// Why a disbursement failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DisburseError {
    /// The faucet cannot cover the grant.
    #[error("faucet has insufficient funds: {0}")]
    InsufficientFunds(String),
    /// The node was unreachable or too slow. The transaction may have been
    /// broadcast if `tx_hash` is set.
    #[error("RPC unavailable: {reason}")]
    RpcUnavailable {
        /// Underlying cause.
        reason: String,
        /// Hash of the transaction, when it is known to have been broadcast.
        tx_hash: Option<TxHash>,
    },
    /// The request cannot be turned into a transaction.
    #[error("invalid disbursement parameters: {0}")]
    InvalidParameters(String),
    /// The node refused the transaction.
    #[error("transaction rejected: {0}")]
    Rejected(String),
}

impl DisburseError {
    /// Whether retrying later may succeed without operator action.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RpcUnavailable { .. })
    }
}

impl From<ChainError> for DisburseError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Unavailable(_) | ChainError::Timeout(_) | ChainError::Decode(_) => {
                Self::RpcUnavailable {
                    reason: e.to_string(),
                    tx_hash: None,
                }
            }
            ChainError::Unconfirmed { tx_hash, reason } => Self::RpcUnavailable {
                reason,
                tx_hash: Some(tx_hash),
            },
            ChainError::InsufficientFunds(reason) => Self::InsufficientFunds(reason),
            ChainError::Rejected(reason) | ChainError::Signing(reason) => Self::Rejected(reason),
        }
    }
}

/// Static parameters of a [`Disburser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisburserConfig {
    /// EIP-155 chain id the signer signs for.
    pub chain_id: u64,
    /// ERC-20 contract for token grants.
    pub token_contract: Option<Address>,
    /// Gas limit for native transfers.
    pub native_gas_limit: u64,
    /// Gas limit for token transfers.
    pub token_gas_limit: u64,
    /// Bound on each read call (balance, nonce, fee).
    pub rpc_timeout: Duration,
    /// Bound on sign-and-send, including any receipt wait done by the client.
    pub send_timeout: Duration,
}

impl DisburserConfig {
    /// Defaults for `chain_id`: standard gas limits, 15 s timeouts, no token.
    #[must_use]
    pub const fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            token_contract: None,
            native_gas_limit: NATIVE_TRANSFER_GAS,
            token_gas_limit: TOKEN_TRANSFER_GAS,
            rpc_timeout: Duration::from_secs(15),
            send_timeout: Duration::from_secs(15),
        }
    }
}

/// Sends grants from the faucet account, one transaction at a time.
#[derive(Debug)]
pub struct Disburser<C> {
    client: Arc<C>,
    signer: SignerAccount,
    config: DisburserConfig,
    /// Submission lock. `None` means the next send must query the chain.
    nonce: Mutex<Option<u64>>,
}

impl<C: ChainClient> Disburser<C> {
    /// Creates a disburser signing with `signer`.
    pub fn new(client: Arc<C>, signer: SignerAccount, config: DisburserConfig) -> Self {
        Self {
            client,
            signer,
            config,
            nonce: Mutex::new(None),
        }
    }

    /// The faucet's address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.signer.address()
    }

    /// Static configuration.
    #[must_use]
    pub const fn config(&self) -> &DisburserConfig {
        &self.config
    }

    /// Balance of `owner` in the asset of `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`DisburseError::InvalidParameters`] for token balances without
    /// a token contract, or the mapped chain error.
    pub async fn balance_of(&self, owner: Address, kind: AssetKind) -> Result<U256, DisburseError> {
        let timeout = self.config.rpc_timeout;
        let balance = match kind {
            AssetKind::NativeCoin => with_timeout(timeout, self.client.get_balance(owner)).await?,
            AssetKind::FungibleToken => {
                let token = self.token_contract()?;
                with_timeout(timeout, token_balance(self.client.as_ref(), token, owner)).await?
            }
        };
        Ok(balance)
    }

    /// Sends `request.amount` of `request.kind` to `request.destination`.
    ///
    /// On any failure after the nonce is read, the cached nonce is cleared so
    /// the next send starts from the chain's pending nonce.
    ///
    /// # Errors
    ///
    /// Returns [`DisburseError`] describing why nothing (or nothing confirmed)
    /// was sent.
    #[cfg_attr(
        feature = "telemetry",
        tracing::instrument(skip_all, fields(to = %request.destination, amount = %request.amount, kind = %request.kind), err)
    )]
    pub async fn send(&self, request: DisbursementRequest) -> Result<TransactionReceipt, DisburseError> {
        if request.amount.is_zero() {
            return Err(DisburseError::InvalidParameters(
                "grant amount is zero".into(),
            ));
        }
        let (to, value, input, gas_limit) = match request.kind {
            AssetKind::NativeCoin => (
                request.destination,
                request.amount,
                Bytes::new(),
                self.config.native_gas_limit,
            ),
            AssetKind::FungibleToken => (
                self.token_contract()?,
                U256::ZERO,
                contract::transfer_calldata(request.destination, request.amount),
                self.config.token_gas_limit,
            ),
        };

        let available = traced!(
            self.balance_of(self.address(), request.kind),
            tracing::info_span!("faucet_balance")
        )?;
        if available < request.amount {
            return Err(DisburseError::InsufficientFunds(format!(
                "balance {available} below grant {}",
                request.amount
            )));
        }

        let transaction_hash = {
            let mut slot = self.nonce.lock().await;
            match self.submit(&mut slot, to, value, input, gas_limit).await {
                Ok(hash) => hash,
                Err(e) => {
                    *slot = None;
                    #[cfg(feature = "telemetry")]
                    tracing::warn!(error = %e, "grant submission failed, nonce cache cleared");
                    return Err(e);
                }
            }
        };
        #[cfg(feature = "telemetry")]
        tracing::info!(tx = %transaction_hash, "grant submitted");

        Ok(TransactionReceipt {
            transaction_hash,
            submitted_at: UnixTimestamp::now(),
        })
    }

    async fn submit(
        &self,
        slot: &mut Option<u64>,
        to: Address,
        value: U256,
        input: Bytes,
        gas_limit: u64,
    ) -> Result<TxHash, DisburseError> {
        let from = self.address();
        let nonce = match *slot {
            Some(nonce) => nonce,
            None => {
                traced!(
                    with_timeout(self.config.rpc_timeout, self.client.get_nonce(from)),
                    tracing::info_span!("get_nonce")
                )?
            }
        };
        let fee = traced!(
            with_timeout(self.config.rpc_timeout, self.client.estimate_fee()),
            tracing::info_span!("estimate_fee")
        )?;
        let tx = TxParams {
            from,
            to,
            value,
            input,
            nonce,
            gas_limit,
            fee,
            chain_id: self.config.chain_id,
        };
        let hash = traced!(
            with_timeout(
                self.config.send_timeout,
                self.client.sign_and_send(tx, &self.signer)
            ),
            tracing::info_span!("sign_and_send", nonce)
        )?;
        *slot = Some(nonce + 1);
        Ok(hash)
    }

    fn token_contract(&self) -> Result<Address, DisburseError> {
        self.config.token_contract.ok_or_else(|| {
            DisburseError::InvalidParameters("token transfer without a token contract".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use alloy_primitives::address;

    use super::*;
    use crate::mock::{DEV_KEY, MockChain};

    const TOKEN: Address = address!("0x00000000000000000000000000000000000000cc");
    const ALICE: Address = address!("0x1111111111111111111111111111111111111111");

    fn disburser(chain: MockChain, token: Option<Address>) -> (Arc<Disburser<MockChain>>, Arc<MockChain>) {
        let client = Arc::new(chain);
        let signer = SignerAccount::from_private_key(DEV_KEY).unwrap();
        let config = DisburserConfig {
            token_contract: token,
            ..DisburserConfig::new(31_337)
        };
        let disburser = Disburser::new(Arc::clone(&client), signer, config);
        (Arc::new(disburser), client)
    }

    fn native(amount: u64) -> DisbursementRequest {
        DisbursementRequest {
            destination: ALICE,
            amount: U256::from(amount),
            kind: AssetKind::NativeCoin,
        }
    }

    #[tokio::test]
    async fn test_native_transfer_params() {
        let (disburser, chain) = disburser(MockChain::new(5), None);
        let receipt = disburser.send(native(1_000)).await.unwrap();
        let sent = chain.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        let tx = &sent[0];
        assert_eq!(tx.to, ALICE);
        assert_eq!(tx.value, U256::from(1_000u64));
        assert!(tx.input.is_empty());
        assert_eq!(tx.gas_limit, NATIVE_TRANSFER_GAS);
        assert_eq!(tx.nonce, 5);
        assert_eq!(tx.chain_id, 31_337);
        assert_eq!(tx.from, disburser.address());
        assert_eq!(receipt.transaction_hash, TxHash::left_padding_from(&5u64.to_be_bytes()));
    }

    #[tokio::test]
    async fn test_token_transfer_params() {
        let (disburser, chain) = disburser(MockChain::new(0), Some(TOKEN));
        chain.set_token_balance(TOKEN, disburser.address(), U256::from(1_000_000u64));
        let request = DisbursementRequest {
            destination: ALICE,
            amount: U256::from(500u64),
            kind: AssetKind::FungibleToken,
        };
        disburser.send(request).await.unwrap();
        let tx = chain.sent.lock().unwrap()[0].clone();
        assert_eq!(tx.to, TOKEN);
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(tx.input, contract::transfer_calldata(ALICE, U256::from(500u64)));
        assert_eq!(tx.gas_limit, TOKEN_TRANSFER_GAS);
    }

    #[tokio::test]
    async fn test_invalid_parameters() {
        let (disburser, chain) = disburser(MockChain::new(0), None);
        assert!(matches!(
            disburser.send(native(0)).await,
            Err(DisburseError::InvalidParameters(_))
        ));
        let token = DisbursementRequest {
            destination: ALICE,
            amount: U256::from(1u8),
            kind: AssetKind::FungibleToken,
        };
        assert!(matches!(
            disburser.send(token).await,
            Err(DisburseError::InvalidParameters(_))
        ));
        assert_eq!(chain.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_insufficient_funds_checked_before_nonce() {
        let (disburser, chain) = disburser(MockChain::new(0), None);
        *chain.native_balance.lock().unwrap() = U256::from(10u8);
        assert!(matches!(
            disburser.send(native(11)).await,
            Err(DisburseError::InsufficientFunds(_))
        ));
        assert_eq!(chain.nonce_queries.load(Ordering::SeqCst), 0);
        assert_eq!(chain.sends.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_nonce_cached_between_sends() {
        let (disburser, chain) = disburser(MockChain::new(3), None);
        for _ in 0..3 {
            disburser.send(native(1)).await.unwrap();
        }
        assert_eq!(chain.sent_nonces(), vec![3, 4, 5]);
        assert_eq!(chain.nonce_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sends_get_sequential_nonces() {
        const N: u64 = 24;
        let k = 17;
        let (disburser, chain) = disburser(MockChain::new(k), None);
        let tasks = (0..N)
            .map(|_| {
                let disburser = Arc::clone(&disburser);
                tokio::spawn(async move { disburser.send(native(1)).await })
            })
            .collect::<Vec<_>>();
        for result in futures_util::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }
        assert_eq!(chain.sent_nonces(), (k..k + N).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_failure_resets_nonce_cache() {
        let (disburser, chain) = disburser(MockChain::new(9), None);
        disburser.send(native(1)).await.unwrap();
        chain.fail_next_send(ChainError::Unavailable("connection reset".into()));
        let err = disburser.send(native(1)).await.unwrap_err();
        assert_eq!(
            err,
            DisburseError::RpcUnavailable {
                reason: "RPC unavailable: connection reset".into(),
                tx_hash: None
            }
        );
        disburser.send(native(1)).await.unwrap();
        assert_eq!(chain.sent_nonces(), vec![9, 10]);
        assert_eq!(chain.nonce_queries.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unconfirmed_carries_hash() {
        let (disburser, chain) = disburser(MockChain::new(0), None);
        let hash = TxHash::repeat_byte(0xab);
        chain.fail_next_send(ChainError::Unconfirmed {
            tx_hash: hash,
            reason: "receipt timeout".into(),
        });
        let err = disburser.send(native(1)).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(
            err,
            DisburseError::RpcUnavailable {
                reason: "receipt timeout".into(),
                tx_hash: Some(hash)
            }
        );
    }

    #[test]
    fn test_chain_error_mapping() {
        assert!(matches!(
            DisburseError::from(ChainError::InsufficientFunds("gas * price + value".into())),
            DisburseError::InsufficientFunds(_)
        ));
        assert!(matches!(
            DisburseError::from(ChainError::Rejected("replacement underpriced".into())),
            DisburseError::Rejected(_)
        ));
        assert!(matches!(
            DisburseError::from(ChainError::Timeout(Duration::from_secs(15))),
            DisburseError::RpcUnavailable { tx_hash: None, .. }
        ));
    }
}
