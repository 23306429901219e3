use crate::Error;
use bech32::{Bech32, Hrp};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Length of an account identifier.
const ACCOUNT_ID_LENGTH: usize = 20;

/// Account identifier of a compressed public key: `ripemd160(sha256(public_key))`.
pub fn account_id(public_key: &[u8]) -> [u8; ACCOUNT_ID_LENGTH] {
    let digest = Ripemd160::digest(Sha256::digest(public_key));
    let mut id = [0u8; ACCOUNT_ID_LENGTH];
    id.copy_from_slice(&digest);
    id
}

/// Bech32 account address of a compressed public key under `prefix`.
pub fn address(prefix: &str, public_key: &[u8]) -> Result<String, Error> {
    let hrp = Hrp::parse(prefix).map_err(|err| Error::InvalidPrefix(err.to_string()))?;
    bech32::encode::<Bech32>(hrp, &account_id(public_key))
        .map_err(|err| Error::Encoding(err.to_string()))
}
