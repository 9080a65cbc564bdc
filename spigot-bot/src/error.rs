//! Error types for the bot server.

use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use spigot::ChainError;
use spigot::settings::SettingsError;
use spigot_evm::EvmClientError;

/// Fatal problems found while loading configuration or starting up.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or misses required fields.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The `[faucet]` table failed validation.
    #[error("invalid [faucet] settings: {0}")]
    Settings(#[from] SettingsError),

    /// The RPC client could not be built.
    #[error("invalid [chain] settings: {0}")]
    Client(#[from] EvmClientError),

    /// The node serves a different chain than configured.
    #[error("chain_id is {configured} but the RPC endpoint serves chain {remote}")]
    ChainMismatch {
        /// Configured chain id.
        configured: u64,
        /// Chain id reported by the node.
        remote: u64,
    },

    /// A startup read from the chain failed.
    #[error("startup chain query failed: {0}")]
    Chain(#[from] ChainError),
}

/// Errors returned by the chat-gateway endpoints.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The request body is not a valid message.
    #[error("invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    /// The message has no text.
    #[error("message text is empty")]
    EmptyText,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidBody(rejection) => rejection.status(),
            Self::EmptyText => StatusCode::UNPROCESSABLE_ENTITY,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
