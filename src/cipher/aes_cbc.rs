//! AES-256-CBC over data the caller has already padded to 32-byte blocks.
//!
//! The `cbc` crate's own padding is the standard 16-byte PKCS7; the envelope
//! format needs a 32-byte block, so padding is handled separately
//! in [`crate::padding`] and this module only ever sees already-aligned
//! buffers, encrypted/decrypted as raw CBC blocks.

use aes::Aes256;
use anyhow::{Result, anyhow, ensure};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

use crate::config::{AES_KEY_SIZE, IV_SIZE};

type Encryptor = cbc::Encryptor<Aes256>;
type Decryptor = cbc::Decryptor<Aes256>;

/// Encrypts `padded` (length a multiple of 16) in place under CBC, no padding.
pub fn encrypt(key: &[u8], iv: &[u8], padded: &[u8]) -> Result<Vec<u8>> {
    ensure!(key.len() == AES_KEY_SIZE, "aes key must be {AES_KEY_SIZE} bytes, got {}", key.len());
    ensure!(iv.len() == IV_SIZE, "iv must be {IV_SIZE} bytes, got {}", iv.len());
    ensure!(!padded.is_empty() && padded.len() % 16 == 0, "plaintext length must be a non-zero multiple of 16, got {}", padded.len());
    let enc = Encryptor::new_from_slices(key, iv).map_err(|e| anyhow!("aes key/iv setup failed: {e}"))?;
    Ok(enc.encrypt_padded_vec_mut::<NoPadding>(padded))
}

/// Decrypts `ct` (length a multiple of 16) in place under CBC, no padding.
pub fn decrypt(key: &[u8], iv: &[u8], ct: &[u8]) -> Result<Vec<u8>> {
    ensure!(key.len() == AES_KEY_SIZE, "aes key must be {AES_KEY_SIZE} bytes, got {}", key.len());
    ensure!(iv.len() == IV_SIZE, "iv must be {IV_SIZE} bytes, got {}", iv.len());
    ensure!(!ct.is_empty() && ct.len() % 16 == 0, "ciphertext length must be a non-zero multiple of 16, got {}", ct.len());
    let dec = Decryptor::new_from_slices(key, iv).map_err(|e| anyhow!("aes key/iv setup failed: {e}"))?;
    dec.decrypt_padded_vec_mut::<NoPadding>(ct).map_err(|e| anyhow!("aes-cbc decrypt failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let key = [0x42u8; AES_KEY_SIZE];
        let iv = [0x24u8; IV_SIZE];
        let padded = [0xAAu8; 64]; // already block-aligned
        let ct = encrypt(&key, &iv, &padded).unwrap();
        assert_eq!(ct.len(), padded.len());
        assert_eq!(decrypt(&key, &iv, &ct).unwrap(), padded);
    }

    #[test]
    fn rejects_short_key() {
        let iv = [0u8; IV_SIZE];
        assert!(encrypt(&[0u8; 10], &iv, &[0u8; 16]).is_err());
    }
}
