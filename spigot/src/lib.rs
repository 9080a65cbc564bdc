#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Claim-eligibility and disbursement engine for chain faucets.
//!
//! This crate holds everything a faucet needs apart from the chain's wire
//! protocol and the chat transport: per-identity rate limiting, eligibility
//! gating, transaction construction and the submission discipline that keeps
//! nonces strictly sequential when many claims arrive at once.
//!
//! # Overview
//!
//! A claim flows through [`router::RequestRouter`]:
//!
//! 1. the text is checked to be an address,
//! 2. [`gate::EligibilityGate`] rejects bad, self or non-member addresses,
//! 3. [`ledger::ClaimLedger`] reserves one of the identity's slots,
//! 4. [`disburser::Disburser`] signs and broadcasts the transfer,
//! 5. the reservation is committed or rolled back.
//!
//! Chain access goes through the [`chain::ChainClient`] trait, implemented for
//! EVM nodes in `spigot-evm`.
//!
//! # Modules
//!
//! - [`amount`] - Decimal amount parsing and formatting
//! - [`asset`] - Identities, asset kinds, requests and receipts
//! - [`chain`] - The `ChainClient` trait, fee and transaction types
//! - [`contract`] - ERC-20 ABI and call-data helpers
//! - [`disburser`] - Nonce-serialized transfer submission
//! - [`gate`] - Address validation and NFT membership checks
//! - [`ledger`] - Rolling-window claim accounting
//! - [`router`] - Claim lifecycle and reply rendering
//! - [`settings`] - Configuration validation
//! - [`signer`] - The faucet account
//! - [`timestamp`] - Second-resolution timestamps
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod amount;
pub mod asset;
pub mod chain;
pub mod contract;
pub mod disburser;
pub mod gate;
pub mod ledger;
pub mod router;
pub mod settings;
pub mod signer;
pub mod timestamp;

#[cfg(test)]
pub(crate) mod mock;

pub use asset::{AssetKind, DisbursementRequest, Grant, RequesterIdentity, TransactionReceipt};
pub use chain::{ChainClient, ChainError};
pub use router::{ClaimOutcome, RequestRouter};
pub use timestamp::UnixTimestamp;
