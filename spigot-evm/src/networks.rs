//! Known EVM networks and their native coins.
//!
//! Used to default the native symbol and to label startup logs; chains not
//! listed here still work with an explicit symbol in the configuration.

/// Ethereum Mainnet chain ID.
pub const ETHEREUM_MAINNET: u64 = 1;

/// Ethereum Sepolia (testnet) chain ID.
pub const ETHEREUM_SEPOLIA: u64 = 11_155_111;

/// Ethereum Holesky (testnet) chain ID.
pub const ETHEREUM_HOLESKY: u64 = 17_000;

/// Base Mainnet chain ID.
pub const BASE_MAINNET: u64 = 8453;

/// Base Sepolia (testnet) chain ID.
pub const BASE_SEPOLIA: u64 = 84532;

/// Polygon Mainnet chain ID.
pub const POLYGON_MAINNET: u64 = 137;

/// Polygon Amoy (testnet) chain ID.
pub const POLYGON_AMOY: u64 = 80002;

/// Avalanche C-Chain chain ID.
pub const AVALANCHE_MAINNET: u64 = 43114;

/// Avalanche Fuji (testnet) chain ID.
pub const AVALANCHE_FUJI: u64 = 43113;

/// Celo Mainnet chain ID.
pub const CELO_MAINNET: u64 = 42220;

/// BNB Smart Chain chain ID.
pub const BSC_MAINNET: u64 = 56;

/// BNB Smart Chain testnet chain ID.
pub const BSC_TESTNET: u64 = 97;

/// OP Mainnet chain ID.
pub const OPTIMISM_MAINNET: u64 = 10;

/// Arbitrum One chain ID.
pub const ARBITRUM_ONE: u64 = 42161;

/// Local development chain (Anvil, Hardhat) chain ID.
pub const LOCAL_DEVNET: u64 = 31337;

/// Symbol used when a chain is not in [`KNOWN_NETWORKS`].
pub const DEFAULT_NATIVE_SYMBOL: &str = "ETH";

/// Static description of an EVM network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkInfo {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Human-readable name.
    pub name: &'static str,
    /// Ticker of the native coin.
    pub native_symbol: &'static str,
    /// Whether the network is a test network.
    pub testnet: bool,
}

const fn network(chain_id: u64, name: &'static str, native_symbol: &'static str, testnet: bool) -> NetworkInfo {
    NetworkInfo {
        chain_id,
        name,
        native_symbol,
        testnet,
    }
}

/// All networks with a known native coin.
pub const KNOWN_NETWORKS: &[NetworkInfo] = &[
    network(ETHEREUM_MAINNET, "Ethereum", "ETH", false),
    network(ETHEREUM_SEPOLIA, "Sepolia", "ETH", true),
    network(ETHEREUM_HOLESKY, "Holesky", "ETH", true),
    network(BASE_MAINNET, "Base", "ETH", false),
    network(BASE_SEPOLIA, "Base Sepolia", "ETH", true),
    network(POLYGON_MAINNET, "Polygon", "POL", false),
    network(POLYGON_AMOY, "Polygon Amoy", "POL", true),
    network(AVALANCHE_MAINNET, "Avalanche C-Chain", "AVAX", false),
    network(AVALANCHE_FUJI, "Avalanche Fuji", "AVAX", true),
    network(CELO_MAINNET, "Celo", "CELO", false),
    network(BSC_MAINNET, "BNB Smart Chain", "BNB", false),
    network(BSC_TESTNET, "BNB Smart Chain Testnet", "tBNB", true),
    network(OPTIMISM_MAINNET, "OP Mainnet", "ETH", false),
    network(ARBITRUM_ONE, "Arbitrum One", "ETH", false),
    network(LOCAL_DEVNET, "Local devnet", "ETH", true),
];

/// Looks up a network by chain id.
#[must_use]
pub fn network_by_chain_id(chain_id: u64) -> Option<&'static NetworkInfo> {
    KNOWN_NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Native coin symbol for `chain_id`, or [`DEFAULT_NATIVE_SYMBOL`].
#[must_use]
pub fn native_symbol(chain_id: u64) -> &'static str {
    network_by_chain_id(chain_id).map_or(DEFAULT_NATIVE_SYMBOL, |n| n.native_symbol)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_symbols() {
        assert_eq!(native_symbol(POLYGON_AMOY), "POL");
        assert_eq!(native_symbol(AVALANCHE_FUJI), "AVAX");
        assert_eq!(native_symbol(424_242), DEFAULT_NATIVE_SYMBOL);
    }

    #[test]
    fn test_chain_ids_are_unique() {
        for (i, a) in KNOWN_NETWORKS.iter().enumerate() {
            assert!(
                KNOWN_NETWORKS[i + 1..].iter().all(|b| b.chain_id != a.chain_id),
                "duplicate chain id {}",
                a.chain_id
            );
        }
    }
}
