//! Chat-gateway server for the spigot faucet.
//!
//! The chat transport (a Telegram or Discord adapter, for instance) posts
//! every incoming message to this server and relays the reply. Slash commands
//! are answered here; everything else is a claim handed to the engine.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration with environment variable expansion
//! - [`commands`] - Command parsing and replies
//! - [`handlers`] - Axum route handlers and router builder
//! - [`error`] - Startup and gateway error types
//! - [`util`] - Shutdown signal handling and ledger pruning

pub mod commands;
pub mod config;
pub mod error;
pub mod handlers;
pub mod util;

pub use commands::CommandHandler;
pub use handlers::gateway_router;
