//! Bot configuration.
//!
//! Loads configuration from a TOML file with support for environment variable
//! expansion in string values. Variables use `$VAR` or `${VAR}` syntax.
//!
//! # Example Configuration
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 4030
//! prune_interval_secs = 600
//!
//! [chain]
//! eip1559 = false
//!
//! [[chain.rpc]]
//! url = "https://testnet-rpc.example.org"
//! rate_limit = 25
//!
//! [faucet]
//! signer_private_key = "$FAUCET_SIGNER_KEY"
//! chain_id = 84532
//! asset = "fungible_token"
//! token_contract = "0x5A89F7e45D659695E98148aF069B24c529DBc4fC"
//! nft_contract = "0x18605d4c483AA343CAF971E8462213b1ed302bce"
//! nft_symbol = "JNC"
//! amount = "500"
//! symbol = "TTK"
//! claim_limit = 1
//! claim_window_secs = 86400
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to configuration file (default: `spigot.toml`)
//! - `HOST` - Override server bind address
//! - `PORT` - Override server port
//! - Signer key and endpoints referenced by `$VAR` in the config file

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use spigot::settings::FaucetSection;
use url::Url;

use crate::error::ConfigError;

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(name = "spigot-bot", version, about = "Rate-limited chat faucet for EVM chains")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short, env = "CONFIG", default_value = "spigot.toml")]
    pub config: PathBuf,
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Server bind address (default: `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Server port (default: `4030`).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds between sweeps of expired claims (default: `600`).
    #[serde(default = "default_prune_interval_secs")]
    pub prune_interval_secs: u64,

    /// Chain connection.
    pub chain: ChainSection,

    /// Faucet behaviour.
    pub faucet: FaucetSection,
}

/// The `[chain]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSection {
    /// RPC endpoints, used with fallback in score order.
    #[serde(default)]
    pub rpc: Vec<RpcEndpoint>,

    /// Whether the chain prices gas with EIP-1559 (default: `true`).
    #[serde(default = "default_eip1559")]
    pub eip1559: bool,
}

/// One RPC endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcEndpoint {
    /// HTTP(S) endpoint URL.
    pub url: Url,

    /// Maximum requests per second to this endpoint.
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0))
}

const fn default_port() -> u16 {
    4030
}

const fn default_prune_interval_secs() -> u64 {
    600
}

const fn default_eip1559() -> bool {
    true
}

impl BotConfig {
    /// Loads configuration from `path`.
    ///
    /// After loading, all `$VAR` / `${VAR}` references are expanded from the
    /// process environment. `HOST` and `PORT` env vars override the file
    /// values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let mut config = Self::from_toml(&content, |name| std::env::var(name).ok())?;

        if let Ok(host) = std::env::var("HOST")
            && let Ok(addr) = host.parse()
        {
            config.host = addr;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }

        Ok(config)
    }

    /// Parses `content` after expanding variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML or missing fields.
    pub fn from_toml(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let expanded = expand_vars(content, lookup);
        Ok(toml::from_str(&expanded)?)
    }

    /// Interval between ledger prunes.
    #[must_use]
    pub const fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }

    /// Endpoints in the shape the RPC client expects.
    #[must_use]
    pub fn rpc_endpoints(&self) -> Vec<(Url, Option<u32>)> {
        self.chain
            .rpc
            .iter()
            .map(|e| (e.url.clone(), e.rate_limit))
            .collect()
    }
}

/// Expands `$VAR` and `${VAR}` patterns using `lookup`.
///
/// Unresolved variables are left as-is.
fn expand_vars(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' {
            result.push(ch);
            continue;
        }
        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&c) = chars.peek() {
            if braced {
                if c == '}' {
                    chars.next();
                    break;
                }
            } else if !c.is_ascii_alphanumeric() && c != '_' {
                break;
            }
            var_name.push(c);
            chars.next();
        }

        if var_name.is_empty() {
            result.push('$');
            if braced {
                result.push('{');
            }
        } else if let Some(val) = lookup(&var_name) {
            result.push_str(&val);
        } else {
            result.push('$');
            if braced {
                result.push('{');
            }
            result.push_str(&var_name);
            if braced {
                result.push('}');
            }
        }
    }

    result
}
