//! [`ChainClient`] over an alloy JSON-RPC provider.
//!
//! - HTTP transports behind a throttle and fallback layer
//! - EIP-1559 or legacy fee estimation
//! - Local signing with [`EthereumWallet`] and raw broadcast
//! - Optional bounded wait for the receipt after broadcast
//!
//! Nonces are not managed here: the caller supplies a fully specified
//! [`TxParams`], so no filler touches the transaction.

use std::num::NonZeroUsize;
use std::time::Duration;

use alloy_network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types_eth::TransactionRequest;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport::{RpcError, TransportError};
use alloy_transport_http::Http;
use spigot::chain::{ChainClient, ChainError, FeeParams, TxParams};
use spigot::signer::SignerAccount;
use tower::ServiceBuilder;
use url::Url;

/// Errors raised while constructing an [`EvmChainClient`].
#[derive(Debug, thiserror::Error)]
pub enum EvmClientError {
    /// None of the configured endpoints is an HTTP(S) URL.
    #[error("no HTTP(S) RPC endpoint configured")]
    NoHttpEndpoints,
}

/// Settings for [`EvmChainClient`].
#[derive(Debug, Clone, Copy)]
pub struct EvmClientConfig {
    /// Whether the chain supports EIP-1559 gas pricing (default: `true`).
    pub eip1559: bool,
    /// How long to wait for a receipt after broadcast. Zero returns as soon
    /// as the node accepts the transaction (default: zero).
    pub receipt_timeout: Duration,
}

impl Default for EvmClientConfig {
    fn default() -> Self {
        Self {
            eip1559: true,
            receipt_timeout: Duration::ZERO,
        }
    }
}

/// Creates an RPC client from HTTP endpoint URLs with optional per-endpoint
/// rate limits (requests per second).
///
/// Non-HTTP(S) URLs are skipped.
///
/// # Errors
///
/// Returns [`EvmClientError::NoHttpEndpoints`] if no HTTP transport remains.
#[cfg_attr(not(feature = "telemetry"), allow(unused_variables))]
pub fn rpc_client(chain_id: u64, endpoints: &[(Url, Option<u32>)]) -> Result<RpcClient, EvmClientError> {
    let transports = endpoints
        .iter()
        .filter_map(|(url, rate_limit)| {
            let scheme = url.scheme();
            let is_http = scheme == "http" || scheme == "https";
            if !is_http {
                #[cfg(feature = "telemetry")]
                tracing::warn!(chain_id, rpc_url = %url, "Skipping non-HTTP RPC endpoint");
                return None;
            }
            #[cfg(feature = "telemetry")]
            tracing::info!(chain_id, rpc_url = %url, rate_limit = ?rate_limit, "Using HTTP transport");
            let limit = rate_limit.unwrap_or(u32::MAX);
            let service = ServiceBuilder::new()
                .layer(ThrottleLayer::new(limit))
                .service(Http::new(url.clone()));
            Some(service)
        })
        .collect::<Vec<_>>();
    let active = NonZeroUsize::new(transports.len()).ok_or(EvmClientError::NoHttpEndpoints)?;
    let fallback = ServiceBuilder::new()
        .layer(FallbackLayer::default().with_active_transport_count(active))
        .service(transports);
    Ok(RpcClient::new(fallback, false))
}

/// Maps an alloy transport error onto the engine's error classes.
///
/// JSON-RPC error responses mean the node answered: insufficient-funds
/// messages become [`ChainError::InsufficientFunds`], everything else
/// [`ChainError::Rejected`]. Undecodable responses are
/// [`ChainError::Decode`]; all other failures are
/// [`ChainError::Unavailable`].
#[must_use]
pub fn classify(error: &TransportError) -> ChainError {
    match error {
        RpcError::ErrorResp(payload) => {
            let message = payload.message.to_string();
            if message.to_ascii_lowercase().contains("insufficient funds") {
                ChainError::InsufficientFunds(message)
            } else {
                ChainError::Rejected(message)
            }
        }
        RpcError::DeserError { err, .. } => ChainError::Decode(err.to_string()),
        RpcError::NullResp => ChainError::Decode(error.to_string()),
        _ => ChainError::Unavailable(error.to_string()),
    }
}

/// Chain client backed by a [`RootProvider`].
///
/// Holds no signer: [`ChainClient::sign_and_send`] signs with the account it
/// is given.
#[derive(Debug, Clone)]
pub struct EvmChainClient {
    inner: RootProvider,
    chain_id: u64,
    config: EvmClientConfig,
}

impl EvmChainClient {
    /// Creates a client for `chain_id` from a configured RPC client.
    #[must_use]
    pub fn new(rpc_client: RpcClient, chain_id: u64, config: EvmClientConfig) -> Self {
        #[cfg(feature = "telemetry")]
        tracing::info!(chain_id, eip1559 = config.eip1559, "Using EVM chain client");
        Self {
            inner: RootProvider::new(rpc_client),
            chain_id,
            config,
        }
    }

    /// Connects to `endpoints` with default transport layers.
    ///
    /// # Errors
    ///
    /// Returns [`EvmClientError::NoHttpEndpoints`] if no endpoint is HTTP(S).
    pub fn connect(
        chain_id: u64,
        endpoints: &[(Url, Option<u32>)],
        config: EvmClientConfig,
    ) -> Result<Self, EvmClientError> {
        Ok(Self::new(rpc_client(chain_id, endpoints)?, chain_id, config))
    }

    /// The configured chain id.
    #[must_use]
    pub const fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Chain id reported by the node, used to detect a misconfigured endpoint.
    ///
    /// # Errors
    ///
    /// Returns the classified transport error.
    pub async fn remote_chain_id(&self) -> Result<u64, ChainError> {
        self.inner.get_chain_id().await.map_err(|e| classify(&e))
    }

    fn request(tx: TxParams) -> TransactionRequest {
        let mut request = TransactionRequest::default()
            .with_from(tx.from)
            .with_to(tx.to)
            .with_value(tx.value)
            .with_input(tx.input)
            .with_nonce(tx.nonce)
            .with_gas_limit(tx.gas_limit)
            .with_chain_id(tx.chain_id);
        match tx.fee {
            FeeParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
            } => {
                request.set_max_fee_per_gas(max_fee_per_gas);
                request.set_max_priority_fee_per_gas(max_priority_fee_per_gas);
            }
            FeeParams::Legacy { gas_price } => request.set_gas_price(gas_price),
        }
        request
    }
}

impl ChainClient for EvmChainClient {
    async fn get_balance(&self, address: Address) -> Result<U256, ChainError> {
        self.inner
            .get_balance(address)
            .await
            .map_err(|e| classify(&e))
    }

    async fn get_nonce(&self, address: Address) -> Result<u64, ChainError> {
        self.inner
            .get_transaction_count(address)
            .pending()
            .await
            .map_err(|e| classify(&e))
    }

    async fn estimate_fee(&self) -> Result<FeeParams, ChainError> {
        if self.config.eip1559 {
            let estimate = self
                .inner
                .estimate_eip1559_fees()
                .await
                .map_err(|e| classify(&e))?;
            Ok(FeeParams::Eip1559 {
                max_fee_per_gas: estimate.max_fee_per_gas,
                max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
            })
        } else {
            let gas_price = self
                .inner
                .get_gas_price()
                .await
                .map_err(|e| classify(&e))?;
            Ok(FeeParams::Legacy { gas_price })
        }
    }

    async fn sign_and_send(&self, tx: TxParams, signer: &SignerAccount) -> Result<TxHash, ChainError> {
        let wallet = EthereumWallet::from(signer.signer().clone());
        let envelope = Self::request(tx)
            .build(&wallet)
            .await
            .map_err(|e| ChainError::Signing(e.to_string()))?;

        let pending = self
            .inner
            .send_tx_envelope(envelope)
            .await
            .map_err(|e| classify(&e))?;
        let tx_hash = *pending.tx_hash();
        #[cfg(feature = "telemetry")]
        tracing::info!(tx = %tx_hash, "Transaction broadcast");

        if self.config.receipt_timeout.is_zero() {
            return Ok(tx_hash);
        }
        match pending
            .with_timeout(Some(self.config.receipt_timeout))
            .get_receipt()
            .await
        {
            Ok(receipt) if receipt.status() => Ok(tx_hash),
            Ok(_) => Err(ChainError::Rejected(format!("transaction {tx_hash} reverted"))),
            Err(e) => Err(ChainError::Unconfirmed {
                tx_hash,
                reason: e.to_string(),
            }),
        }
    }

    async fn call(&self, contract: Address, calldata: Bytes) -> Result<Bytes, ChainError> {
        let request = TransactionRequest::default()
            .with_to(contract)
            .with_input(calldata);
        self.inner.call(request).await.map_err(|e| classify(&e))
    }
}
