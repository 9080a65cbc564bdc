//! Spigot faucet chat-gateway server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (spigot.toml in current directory)
//! cargo run -p spigot-bot --release
//!
//! # Run with custom config path
//! CONFIG=/path/to/spigot.toml cargo run -p spigot-bot
//!
//! # Configure logging level
//! RUST_LOG=debug cargo run -p spigot-bot
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `spigot.toml`)
//! - `HOST` - Override bind address (default: `0.0.0.0`)
//! - `PORT` - Override port (default: `4030`)
//! - `RUST_LOG` - Log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::Method;
use clap::Parser;
use spigot::chain::{token_decimals, with_timeout};
use spigot::disburser::Disburser;
use spigot::gate::EligibilityGate;
use spigot::settings::{FaucetSection, NATIVE_DECIMALS};
use spigot::{AssetKind, ChainClient, RequestRouter};
use spigot_evm::{EvmChainClient, EvmClientConfig, native_symbol, network_by_chain_id};
use tower_http::{cors, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use spigot_bot::config::{BotConfig, Cli};
use spigot_bot::error::ConfigError;
use spigot_bot::util::{Shutdown, prune_loop};
use spigot_bot::{CommandHandler, gateway_router};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Faucet failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = BotConfig::load_from(&cli.config)?;
    let chain_id = config.faucet.chain_id;
    tracing::info!(
        config = %cli.config.display(),
        host = %config.host,
        port = config.port,
        chain_id,
        network = network_by_chain_id(chain_id).map_or("unknown", |n| n.name),
        "Loaded configuration"
    );

    let client = Arc::new(EvmChainClient::connect(
        chain_id,
        &config.rpc_endpoints(),
        EvmClientConfig {
            eip1559: config.chain.eip1559,
            receipt_timeout: Duration::from_secs(config.faucet.receipt_timeout_secs),
        },
    )?);
    let rpc_timeout = Duration::from_secs(config.faucet.rpc_timeout_secs);

    let remote = with_timeout(rpc_timeout, client.remote_chain_id()).await?;
    if remote != chain_id {
        return Err(ConfigError::ChainMismatch {
            configured: chain_id,
            remote,
        }
        .into());
    }

    let decimals = resolve_decimals(&config.faucet, client.as_ref(), rpc_timeout).await?;
    let default_symbol = match config.faucet.asset {
        AssetKind::NativeCoin => native_symbol(chain_id),
        AssetKind::FungibleToken => "tokens",
    };
    let settings = config
        .faucet
        .clone()
        .validate(decimals, default_symbol)
        .map_err(ConfigError::from)?;

    let faucet_address = settings.signer.address();
    let disburser = Arc::new(Disburser::new(
        Arc::clone(&client),
        settings.signer.clone(),
        settings.disburser_config(),
    ));
    let gate = EligibilityGate::new(
        Arc::clone(&client),
        faucet_address,
        settings.nft_contract,
        settings.rpc_timeout,
    );
    let router = Arc::new(RequestRouter::new(
        Arc::new(settings.ledger()),
        gate,
        disburser,
        settings.router_config(),
    ));
    tracing::info!(
        faucet = %faucet_address,
        grant = %settings.grant,
        kind = %settings.grant.kind,
        claim_limit = settings.claim_limit.get(),
        claim_window_secs = settings.claim_window.as_secs(),
        nft_gate = ?settings.nft_contract,
        "Faucet ready"
    );

    let shutdown = Shutdown::install()?;
    let pruner = tokio::spawn(prune_loop(
        Arc::clone(router.ledger()),
        config.prune_interval(),
        shutdown.token(),
    ));

    let app = gateway_router(CommandHandler::new(Arc::clone(&router)))
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Faucet listening on http://{addr}");

    let token = shutdown.token();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await;
    shutdown.trigger();
    if let Err(e) = pruner.await {
        tracing::warn!(error = %e, "Ledger prune task failed");
    }

    tracing::info!(in_flight = router.in_flight(), "Draining in-flight disbursements");
    router.drain().await;
    shutdown.wait().await;
    served?;

    tracing::info!("Faucet shut down gracefully");
    Ok(())
}

/// Decimals of the granted asset: configured, native, or read from the token.
async fn resolve_decimals<C: ChainClient>(
    faucet: &FaucetSection,
    client: &C,
    rpc_timeout: Duration,
) -> Result<u8, ConfigError> {
    if let Some(decimals) = faucet.declared_decimals() {
        return Ok(decimals);
    }
    match faucet.token_contract_address()? {
        Some(token) => {
            let decimals = with_timeout(rpc_timeout, token_decimals(client, token)).await?;
            tracing::info!(%token, decimals, "Read token decimals");
            Ok(decimals)
        }
        // Validation reports the missing contract.
        None => Ok(NATIVE_DECIMALS),
    }
}
