//! Solidity interface definitions and call-data helpers.
//!
//! Only the ERC-20 / ERC-721 subset the faucet touches is declared. Encoding
//! lives here so the core never depends on a particular RPC client.

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{SolCall, sol};

sol! {
    /// Minimal ERC-20 interface: transfers plus the `decimals` read used at startup.
    ///
    /// `balanceOf` has the same selector on ERC-721, so NFT-club membership is
    /// checked through this interface too.
    #[allow(missing_docs)]
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address recipient, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
    }
}

/// Encodes `transfer(recipient, amount)`.
#[must_use]
pub fn transfer_calldata(recipient: Address, amount: U256) -> Bytes {
    IERC20::transferCall { recipient, amount }.abi_encode().into()
}

/// Encodes `balanceOf(account)`.
#[must_use]
pub fn balance_of_calldata(account: Address) -> Bytes {
    IERC20::balanceOfCall { account }.abi_encode().into()
}

/// Decodes the return data of a `balanceOf` call.
///
/// # Errors
///
/// Returns the ABI decoding error if `data` is not a single `uint256`.
pub fn decode_balance(data: &[u8]) -> Result<U256, alloy_sol_types::Error> {
    IERC20::balanceOfCall::abi_decode_returns(data)
}

/// Encodes `decimals()`.
#[must_use]
pub fn decimals_calldata() -> Bytes {
    IERC20::decimalsCall {}.abi_encode().into()
}

/// Decodes the return data of a `decimals` call.
///
/// # Errors
///
/// Returns the ABI decoding error if `data` is not a single `uint8`.
pub fn decode_decimals(data: &[u8]) -> Result<u8, alloy_sol_types::Error> {
    IERC20::decimalsCall::abi_decode_returns(data)
}
