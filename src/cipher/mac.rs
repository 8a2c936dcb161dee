//! HMAC-SHA256 message authentication for the envelope tag.

use anyhow::{Result, anyhow, ensure};
use hmac::{Hmac, Mac as _};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::MAC_SIZE;

/// HMAC-SHA256 over a fixed key, computed as encrypt-then-MAC over `iv‖ct`.
pub struct Mac {
    key: Vec<u8>,
}

impl Mac {
    pub fn new(key: &[u8]) -> Result<Self> {
        ensure!(!key.is_empty(), "mac key cannot be empty");
        Ok(Self { key: key.to_vec() })
    }

    /// Computes the tag over the concatenation of `parts`, without
    /// allocating the concatenation itself.
    pub fn compute(&self, parts: &[&[u8]]) -> Result<[u8; MAC_SIZE]> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key).map_err(|e| anyhow!("hmac creation failed: {e}"))?;
        parts.iter().for_each(|part| mac.update(part));
        Ok(mac.finalize().into_bytes().into())
    }

    /// Constant-time verification against a tag received over the wire.
    pub fn verify(&self, expected: &[u8], parts: &[&[u8]]) -> Result<()> {
        ensure!(expected.len() == MAC_SIZE, "invalid mac length: expected {MAC_SIZE}, got {}", expected.len());
        let computed = self.compute(parts)?;
        let expected_array: [u8; MAC_SIZE] = expected.try_into().map_err(|_| anyhow!("failed to convert expected mac to array"))?;
        ensure!(bool::from(expected_array.ct_eq(&computed)), "mac verification failed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_own_output() {
        let mac = Mac::new(b"0123456789abcdef0123456789abcdef").unwrap();
        let tag = mac.compute(&[b"iv", b"ct"]).unwrap();
        assert!(mac.verify(&tag, &[b"iv", b"ct"]).is_ok());
    }

    #[test]
    fn rejects_tampered_data() {
        let mac = Mac::new(b"0123456789abcdef0123456789abcdef").unwrap();
        let tag = mac.compute(&[b"iv", b"ct"]).unwrap();
        assert!(mac.verify(&tag, &[b"iv", b"Ct"]).is_err());
    }
}
