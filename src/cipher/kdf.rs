//! Salt-less, info-less HKDF-SHA256 key derivation.
//!
//! `cipher_key`, `mac_key`, and `server_verifier_key` are each derived by
//! extract-then-expand over a distinct `secret‖tag` input (RFC 5869), not by
//! expanding a single extracted key with different info strings.

use anyhow::{Result, anyhow};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::config::DERIVED_KEY_LEN;

/// Derives `len` bytes from `ikm` via HKDF-SHA256 with an empty salt and
/// empty info string.
pub fn derive(ikm: &[u8], len: usize) -> Result<Vec<u8>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut out = vec![0u8; len];
    hk.expand(&[], &mut out).map_err(|e| anyhow!("hkdf expand failed: {e}"))?;
    Ok(out)
}

/// Derives the 32-byte key used for a given purpose byte, as
/// `HKDF-SHA256(secret‖purpose)`.
pub fn derive_key(secret: &[u8], purpose: u8) -> Result<Vec<u8>> {
    let mut ikm = Vec::with_capacity(secret.len() + 1);
    ikm.extend_from_slice(secret);
    ikm.push(purpose);
    derive(&ikm, DERIVED_KEY_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = derive_key(b"s3cr3t", 0x31).unwrap();
        let b = derive_key(b"s3cr3t", 0x31).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn purpose_separates_keys() {
        let cipher_key = derive_key(b"s3cr3t", 0x31).unwrap();
        let mac_key = derive_key(b"s3cr3t", 0x32).unwrap();
        let verifier_key = derive_key(b"s3cr3t", 0x33).unwrap();
        assert_ne!(cipher_key, mac_key);
        assert_ne!(mac_key, verifier_key);
        assert_eq!(cipher_key.len(), DERIVED_KEY_LEN);
    }
}
