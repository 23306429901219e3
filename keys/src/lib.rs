//! Generate and derive actor keys.
//!
//! Actors sign with secp256k1 keys that are either generated from a random source or derived
//! from a BIP-39 mnemonic along `m/44'/118'/0'/0/{index}`. Addresses are the bech32 encoding of
//! `ripemd160(sha256(compressed_public_key))` under a configurable human-readable prefix.
//!
//! # Example
//!
//! ```rust
//! use rand::rngs::OsRng;
//! use swarm_keys::PrivateKey;
//!
//! let key = PrivateKey::generate(&mut OsRng);
//! let address = key.public_key().address("allo").unwrap();
//! assert!(address.starts_with("allo1"));
//! ```

use thiserror::Error;

mod address;
pub use address::{account_id, address};
mod secp256k1;
pub use secp256k1::{PrivateKey, PublicKey, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

/// Errors that can occur when generating keys or addresses.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(bip39::Error),
    #[error("derivation failed: {0}")]
    Derivation(bip32::Error),
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
    #[error("address encoding failed: {0}")]
    Encoding(String),
}
