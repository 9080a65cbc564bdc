#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! EVM JSON-RPC backend for the `spigot` faucet engine.
//!
//! Implements [`spigot::ChainClient`] on top of an alloy provider:
//!
//! - [`client`] - HTTP transports, fee estimation, signing and broadcast
//! - [`networks`] - Known chains and their native coins
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod client;

mod networks;
pub use networks::*;

pub use client::{EvmChainClient, EvmClientConfig, EvmClientError, rpc_client};
