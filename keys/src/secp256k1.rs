//! Secp256k1 keys in the form expected by Cosmos SDK chains.
//!
//! Public keys are compressed (SEC 1, Version 2.0, Section 2.3.3). Signatures are deterministic
//! ([RFC 6979](https://datatracker.ietf.org/doc/html/rfc6979)) over the SHA-256 digest of the
//! message, encoded as `R || S`, and normalized to low-S.

use crate::Error;
use bip32::{DerivationPath, XPrv};
use bip39::{Language, Mnemonic};
use k256::ecdsa::{
    signature::{Signer, Verifier},
    Signature, SigningKey, VerifyingKey,
};
use rand::{CryptoRng, RngCore};
use std::fmt;

/// Length of a compressed public key (`Y-Parity || X`).
pub const PUBLIC_KEY_LENGTH: usize = 33;

/// Length of a signature (`R || S`).
pub const SIGNATURE_LENGTH: usize = 64;

/// Coin type registered for Cosmos SDK chains.
const COIN_TYPE: u32 = 118;

/// A secp256k1 signing key.
#[derive(Clone)]
pub struct PrivateKey {
    signer: SigningKey,
    public: PublicKey,
}

impl PrivateKey {
    /// Generate a fresh key from the provided randomness.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        Self::from_signer(SigningKey::random(rng))
    }

    /// Derive the key at `m/44'/118'/0'/0/{index}` from a BIP-39 mnemonic of any standard length
    /// (empty passphrase).
    ///
    /// Whitespace in the phrase is normalized before parsing, so a phrase read from a file
    /// (with trailing newline) derives the same key as the bare phrase.
    pub fn derive(mnemonic: &str, index: u32) -> Result<Self, Error> {
        let phrase = mnemonic.split_whitespace().collect::<Vec<_>>().join(" ");
        let mnemonic = Mnemonic::parse_in_normalized(Language::English, &phrase)
            .map_err(Error::InvalidMnemonic)?;
        let seed = mnemonic.to_seed_normalized("");
        let path: DerivationPath = format!("m/44'/{COIN_TYPE}'/0'/0/{index}")
            .parse()
            .map_err(Error::Derivation)?;
        let xprv = XPrv::derive_from_path(seed, &path).map_err(Error::Derivation)?;
        Ok(Self::from_signer(xprv.private_key().clone()))
    }

    fn from_signer(signer: SigningKey) -> Self {
        let public = PublicKey {
            verifier: signer.verifying_key().to_owned(),
        };
        Self { signer, public }
    }

    /// The public key associated with this key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Sign `message` (hashed with SHA-256 before signing).
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LENGTH] {
        let signature: Signature = self.signer.sign(message);
        let signature = signature.normalize_s().unwrap_or(signature);
        let mut bytes = [0u8; SIGNATURE_LENGTH];
        bytes.copy_from_slice(&signature.to_bytes());
        bytes
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// A compressed secp256k1 public key.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    verifier: VerifyingKey,
}

impl PublicKey {
    /// Compressed SEC1 encoding.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        let point = self.verifier.to_encoded_point(true);
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        bytes.copy_from_slice(point.as_bytes());
        bytes
    }

    /// Bech32 account address under `prefix`.
    pub fn address(&self, prefix: &str) -> Result<String, Error> {
        crate::address(prefix, &self.to_bytes())
    }

    /// Verify a `R || S` signature over `message`. High-S signatures are rejected.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        if signature.normalize_s().is_some() {
            return false;
        }
        self.verifier.verify(message, &signature).is_ok()
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", swarm_utils::hex(&self.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    use test_case::test_case;

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    const MNEMONIC_24: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art";

    #[test]
    fn test_sign_verify() {
        let mut rng = StdRng::seed_from_u64(0);
        let key = PrivateKey::generate(&mut rng);
        let signature = key.sign(b"hello");
        assert!(key.public_key().verify(b"hello", &signature));
        assert!(!key.public_key().verify(b"world", &signature));
        assert!(!key.public_key().verify(b"hello", &signature[..63]));
    }

    #[test]
    fn test_signature_deterministic() {
        let key = PrivateKey::derive(MNEMONIC, 0).unwrap();
        assert_eq!(key.sign(b"payload"), key.sign(b"payload"));
    }

    #[test]
    fn test_generate_seeded() {
        let a = PrivateKey::generate(&mut StdRng::seed_from_u64(7));
        let b = PrivateKey::generate(&mut StdRng::seed_from_u64(7));
        let c = PrivateKey::generate(&mut StdRng::seed_from_u64(8));
        assert_eq!(a.public_key(), b.public_key());
        assert_ne!(a.public_key(), c.public_key());
    }

    #[test]
    fn test_derive_reproducible() {
        let first = PrivateKey::derive(MNEMONIC, 0).unwrap();
        let second = PrivateKey::derive(MNEMONIC, 0).unwrap();
        assert_eq!(first.public_key(), second.public_key());
        assert_eq!(
            first.public_key().address("allo").unwrap(),
            second.public_key().address("allo").unwrap()
        );

        // Phrase read from a file
        let padded = format!("  {}\n", MNEMONIC.replace(' ', "  "));
        let third = PrivateKey::derive(&padded, 0).unwrap();
        assert_eq!(first.public_key(), third.public_key());
    }

    #[test_case(MNEMONIC => "cosmos19rl4cm2hmr8afy4kldpxz3fka4jguq0auqdal4"; "12 words")]
    #[test_case(MNEMONIC_24 => "cosmos1r5v5srda7xfth3hn2s26txvrcrntldjumt8mhl"; "24 words")]
    fn test_derive_known_address(mnemonic: &str) -> String {
        let key = PrivateKey::derive(mnemonic, 0).unwrap();
        key.public_key().address("cosmos").unwrap()
    }

    #[test]
    fn test_derive_index() {
        let zero = PrivateKey::derive(MNEMONIC, 0).unwrap();
        let one = PrivateKey::derive(MNEMONIC, 1).unwrap();
        assert_ne!(zero.public_key(), one.public_key());
    }

    #[test]
    fn test_derive_invalid() {
        assert!(matches!(
            PrivateKey::derive("not a valid mnemonic", 0),
            Err(Error::InvalidMnemonic(_))
        ));
    }

    #[test]
    fn test_public_key_compressed() {
        let key = PrivateKey::derive(MNEMONIC, 0).unwrap();
        let bytes = key.public_key().to_bytes();
        assert!(bytes[0] == 0x02 || bytes[0] == 0x03);
    }

    #[test]
    fn test_debug_redacts() {
        let key = PrivateKey::derive(MNEMONIC, 0).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains(&swarm_utils::hex(&key.public_key().to_bytes())));
        assert!(!rendered.contains("signer"));
    }
}
