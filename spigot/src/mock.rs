//! In-process [`ChainClient`] for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, Bytes, TxHash, U256};
use alloy_sol_types::{SolCall, SolValue};

use crate::chain::{ChainClient, ChainError, FeeParams, TxParams};
use crate::contract::IERC20;
use crate::signer::SignerAccount;

/// Anvil account #0.
pub const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// A chain that accepts transactions whose nonce matches its pending nonce.
#[derive(Debug)]
pub struct MockChain {
    pub native_balance: Mutex<U256>,
    pub token_balances: Mutex<HashMap<(Address, Address), U256>>,
    pub pending_nonce: AtomicU64,
    pub send_failures: Mutex<VecDeque<ChainError>>,
    pub call_failures: Mutex<VecDeque<ChainError>>,
    pub sent: Mutex<Vec<TxParams>>,
    pub send_delay: Mutex<Duration>,
    pub nonce_queries: AtomicUsize,
    pub calls: AtomicUsize,
    pub sends: AtomicUsize,
}

impl MockChain {
    pub fn new(start_nonce: u64) -> Self {
        Self {
            native_balance: Mutex::new(U256::from(10u128.pow(21))),
            token_balances: Mutex::new(HashMap::new()),
            pending_nonce: AtomicU64::new(start_nonce),
            send_failures: Mutex::new(VecDeque::new()),
            call_failures: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            send_delay: Mutex::new(Duration::ZERO),
            nonce_queries: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            sends: AtomicUsize::new(0),
        }
    }

    pub fn set_token_balance(&self, contract: Address, owner: Address, amount: U256) {
        self.token_balances
            .lock()
            .unwrap()
            .insert((contract, owner), amount);
    }

    pub fn fail_next_send(&self, error: ChainError) {
        self.send_failures.lock().unwrap().push_back(error);
    }

    pub fn fail_next_call(&self, error: ChainError) {
        self.call_failures.lock().unwrap().push_back(error);
    }

    pub fn sent_nonces(&self) -> Vec<u64> {
        self.sent.lock().unwrap().iter().map(|tx| tx.nonce).collect()
    }

    /// Total number of remote calls of any kind.
    pub fn total_calls(&self) -> usize {
        self.nonce_queries.load(Ordering::SeqCst)
            + self.calls.load(Ordering::SeqCst)
            + self.sends.load(Ordering::SeqCst)
    }
}

impl ChainClient for MockChain {
    async fn get_balance(&self, _address: Address) -> Result<U256, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.native_balance.lock().unwrap())
    }

    async fn get_nonce(&self, _address: Address) -> Result<u64, ChainError> {
        self.nonce_queries.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.pending_nonce.load(Ordering::SeqCst))
    }

    async fn estimate_fee(&self) -> Result<FeeParams, ChainError> {
        Ok(FeeParams::Eip1559 {
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
        })
    }

    async fn sign_and_send(&self, tx: TxParams, _signer: &SignerAccount) -> Result<TxHash, ChainError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        let delay = *self.send_delay.lock().unwrap();
        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.send_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let expected = self.pending_nonce.load(Ordering::SeqCst);
        if tx.nonce != expected {
            return Err(ChainError::Rejected(format!(
                "nonce {} does not match pending {expected}",
                tx.nonce
            )));
        }
        self.pending_nonce.store(expected + 1, Ordering::SeqCst);
        let hash = B256::left_padding_from(&tx.nonce.to_be_bytes());
        self.sent.lock().unwrap().push(tx);
        Ok(hash)
    }

    async fn call(&self, contract: Address, calldata: Bytes) -> Result<Bytes, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.call_failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let call = IERC20::balanceOfCall::abi_decode(&calldata)
            .map_err(|e| ChainError::Rejected(e.to_string()))?;
        let balance = self
            .token_balances
            .lock()
            .unwrap()
            .get(&(contract, call.account))
            .copied()
            .unwrap_or_default();
        Ok(balance.abi_encode().into())
    }
}
