//! PKCS#7 padding for block-cipher alignment.
//!
//! The envelope format pads to a 32-byte block regardless of AES's native
//! 16-byte block size — an unusual but deliberate choice, so this
//! type stays generic over the block size rather than hard-coding 16.

use anyhow::{Result, anyhow, ensure};

/// PKCS#7 (RFC 5652 §6.3) padding for a configurable block size.
pub struct Padding {
    block_size: usize,
}

impl Padding {
    /// Creates a padding instance. `block_size` must be in `1..=255`.
    pub fn new(block_size: usize) -> Result<Self> {
        ensure!(block_size > 0, "block size must be greater than 0");
        ensure!(block_size <= 255, "block size must be <= 255 for PKCS#7");
        Ok(Self { block_size })
    }

    /// Pads `data` to a multiple of the block size.
    ///
    /// Empty input is valid and produces exactly one block of padding.
    pub fn pad(&self, data: &[u8]) -> Vec<u8> {
        let padding_len = self.block_size - (data.len() % self.block_size);
        data.iter().copied().chain(std::iter::repeat_n(padding_len as u8, padding_len)).collect()
    }

    /// Removes and validates PKCS#7 padding.
    pub fn unpad(&self, data: &[u8]) -> Result<Vec<u8>> {
        let padding_len = data.last().copied().ok_or_else(|| anyhow!("cannot unpad empty data"))?;
        ensure!(padding_len > 0 && padding_len <= self.block_size as u8, "invalid padding length: {padding_len}");
        let padding_len = padding_len as usize;
        ensure!(data.len() >= padding_len, "data too short for padding length");
        let (content, padding_bytes) = data.split_at(data.len() - padding_len);
        ensure!(padding_bytes.iter().all(|&b| b == padding_len as u8), "invalid PKCS#7 padding bytes");
        Ok(content.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let p = Padding::new(32).unwrap();
        for len in [0usize, 1, 31, 32, 33, 64, 100] {
            let data = vec![0xAB; len];
            let padded = p.pad(&data);
            assert_eq!(padded.len() % 32, 0);
            assert!(!padded.is_empty());
            assert_eq!(p.unpad(&padded).unwrap(), data);
        }
    }

    #[test]
    fn rejects_bad_padding() {
        let p = Padding::new(32).unwrap();
        let mut padded = p.pad(b"hello");
        let last = padded.len() - 1;
        padded[last] ^= 0xFF;
        assert!(p.unpad(&padded).is_err());
    }

    #[test]
    fn rejects_empty_unpad() {
        let p = Padding::new(32).unwrap();
        assert!(p.unpad(&[]).is_err());
    }
}
