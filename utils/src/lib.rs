//! Shared primitives for the swarm load simulator.

pub mod signal;

/// Encode bytes as lowercase hex (as used for public keys in payloads and transaction hashes).
pub fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
