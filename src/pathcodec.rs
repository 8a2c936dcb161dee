//! Path encryption: split a path on `/`, encrypt each normal
//! segment, hex-encode it, and rejoin — leaving `.`, `..`, and empty
//! segments (from a leading or doubled `/`) untouched.

use anyhow::Result;

use crate::cipher::{Cipher, Mode};

fn is_normal(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".."
}

/// Encrypts every normal segment of `path` under `cipher`, hex-encoding the
/// ciphertext. Structural segments (`.`, `..`, empty) pass through.
pub fn encrypt_path(cipher: &Cipher, path: &str) -> Result<String> {
    let encoded: Result<Vec<String>> = path
        .split('/')
        .map(|seg| {
            if is_normal(seg) {
                let env = cipher.encrypt(seg.as_bytes(), Mode::Filename)?;
                Ok(hex::encode(env.to_concat()))
            } else {
                Ok(seg.to_string())
            }
        })
        .collect();
    Ok(encoded?.join("/"))
}

/// Reverses [`encrypt_path`]. A segment that isn't valid hex, or doesn't
/// decrypt (wrong secret, tampered, or a literal `.`/`..`/empty segment), is
/// passed through unchanged.
pub fn decrypt_path(cipher: &Cipher, path: &str) -> String {
    path.split('/')
        .map(|seg| decrypt_segment(cipher, seg).unwrap_or_else(|| seg.to_string()))
        .collect::<Vec<_>>()
        .join("/")
}

fn decrypt_segment(cipher: &Cipher, seg: &str) -> Option<String> {
    if !is_normal(seg) {
        return None;
    }
    let blob = hex::decode(seg).ok()?;
    let pt = cipher.decrypt_concat(&blob).ok()?;
    String::from_utf8(pt).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ordinary_path() {
        let c = Cipher::new(b"1234").unwrap();
        for path in ["/a/b/c.txt", "a.txt", "/", "", "./a", "../a", "a//b"] {
            let enc = encrypt_path(&c, path).unwrap();
            assert_eq!(decrypt_path(&c, &enc), path);
        }
    }

    #[test]
    fn preserves_structural_segments_bit_exactly() {
        let c = Cipher::new(b"1234").unwrap();
        let enc = encrypt_path(&c, "/./a/../b").unwrap();
        let segs: Vec<&str> = enc.split('/').collect();
        assert_eq!(segs[1], ".");
        assert_eq!(segs[3], "..");
    }

    #[test]
    fn same_segment_encrypts_identically_each_time() {
        let c = Cipher::new(b"1234").unwrap();
        assert_eq!(encrypt_path(&c, "a.txt").unwrap(), encrypt_path(&c, "a.txt").unwrap());
    }
}
