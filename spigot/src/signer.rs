//! The faucet's single signing account.

use std::fmt::{Debug, Formatter};
use std::str::FromStr;

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;

/// Error returned when a private key cannot be parsed.
///
/// Carries no part of the input so it is safe to log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid signer private key")]
pub struct InvalidPrivateKey;

/// Holder of the faucet's address and private key.
///
/// Loaded once at startup and never mutated. `Debug` prints only the address.
#[derive(Clone)]
pub struct SignerAccount {
    signer: PrivateKeySigner,
}

impl SignerAccount {
    /// Parses a hex-encoded secp256k1 private key, with or without `0x`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPrivateKey`] if the key is not 32 bytes of hex or is
    /// not a valid scalar.
    pub fn from_private_key(key: &str) -> Result<Self, InvalidPrivateKey> {
        let signer = PrivateKeySigner::from_str(key.trim()).map_err(|_| InvalidPrivateKey)?;
        Ok(Self { signer })
    }

    /// The account's address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.signer.address()
    }

    /// The underlying local signer, for chain clients that sign transactions.
    #[must_use]
    pub const fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl From<PrivateKeySigner> for SignerAccount {
    fn from(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }
}

impl Debug for SignerAccount {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerAccount")
            .field("address", &self.address())
            .field("key", &"<redacted>")
            .finish()
    }
}
