//! The cryptographic envelope: key derivation, authenticated
//! encryption of bodies and path components, and the password verifier.

use anyhow::{Result, anyhow, bail, ensure};
use rand::Rng;
use scrypt::Params;
use subtle::ConstantTimeEq;

use super::aes_cbc;
use super::kdf::derive_key;
use super::mac::Mac;
use crate::config::{IV_SIZE, PASSWORD_SALT_LEN, SCRYPT_LOG_N, SCRYPT_OUTPUT_LEN, SCRYPT_P, SCRYPT_R};
use crate::padding::Padding;
use crate::secret::SecretBytes;

const PURPOSE_CIPHER: u8 = 0x31;
const PURPOSE_MAC: u8 = 0x32;
const PURPOSE_VERIFIER: u8 = 0x33;

/// Which IV derivation a call to [`Cipher::encrypt`] should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Random 16-byte IV; used for file bodies.
    Body,
    /// `KDF(secret‖pt)[:16]`; used for path components so repeated plaintext
    /// segments always produce the same ciphertext.
    Filename,
}

/// A ciphertext and its detached authentication tag.
pub struct Envelope {
    pub iv_ct: Vec<u8>,
    pub tag: [u8; 32],
}

impl Envelope {
    /// `iv‖ct‖tag`, the wire form used for filenames.
    pub fn to_concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.iv_ct.len() + self.tag.len());
        out.extend_from_slice(&self.iv_ct);
        out.extend_from_slice(&self.tag);
        out
    }
}

/// Derives and holds the per-secret key material, and performs envelope
/// encrypt/decrypt and password-verifier operations.
pub struct Cipher {
    secret: SecretBytes,
    cipher_key: SecretBytes,
    mac: Mac,
    padding: Padding,
}

impl Cipher {
    /// Derives `cipher_key` and `mac_key` from `secret` and retains the raw
    /// secret for deterministic-IV computation.
    pub fn new(secret: &[u8]) -> Result<Self> {
        let cipher_key = derive_key(secret, PURPOSE_CIPHER)?;
        let mac_key = derive_key(secret, PURPOSE_MAC)?;
        Ok(Self {
            secret: SecretBytes::from_slice(secret),
            cipher_key: SecretBytes::from_slice(&cipher_key),
            mac: Mac::new(&mac_key)?,
            padding: Padding::new(crate::config::PADDING_BLOCK_SIZE)?,
        })
    }

    /// `hex(KDF(secret‖0x33))`, the password field sent on the wire.
    pub fn server_verifier_hex(&self) -> Result<String> {
        let key = derive_key(self.secret.expose_secret(), PURPOSE_VERIFIER)?;
        Ok(hex::encode(key))
    }

    fn iv_for(&self, pt: &[u8], mode: Mode) -> Result<[u8; IV_SIZE]> {
        match mode {
            Mode::Body => {
                let mut iv = [0u8; IV_SIZE];
                rand::rng().fill_bytes(&mut iv);
                Ok(iv)
            }
            Mode::Filename => {
                let mut ikm = Vec::with_capacity(self.secret.expose_secret().len() + pt.len());
                ikm.extend_from_slice(self.secret.expose_secret());
                ikm.extend_from_slice(pt);
                let derived = super::kdf::derive(&ikm, IV_SIZE)?;
                derived.try_into().map_err(|_| anyhow!("derived iv has wrong length"))
            }
        }
    }

    /// Encrypts `pt`, returning the envelope. Body mode uses a random IV;
    /// Filename mode a deterministic one.
    pub fn encrypt(&self, pt: &[u8], mode: Mode) -> Result<Envelope> {
        let iv = self.iv_for(pt, mode)?;
        let padded = self.padding.pad(pt);
        let ct = aes_cbc::encrypt(self.cipher_key.expose_secret(), &iv, &padded)?;
        let mut iv_ct = Vec::with_capacity(IV_SIZE + ct.len());
        iv_ct.extend_from_slice(&iv);
        iv_ct.extend_from_slice(&ct);
        let tag = self.mac.compute(&[&iv_ct])?;
        Ok(Envelope { iv_ct, tag })
    }

    /// Decrypts a detached `(iv_ct, tag)` pair (the body form).
    pub fn decrypt_pair(&self, iv_ct: &[u8], tag: &[u8]) -> Result<Vec<u8>> {
        self.mac.verify(tag, &[iv_ct]).map_err(|_| anyhow!("tamper"))?;
        self.decrypt_unverified(iv_ct)
    }

    /// Decrypts the concatenated `iv‖ct‖tag` form (the filename form).
    pub fn decrypt_concat(&self, blob: &[u8]) -> Result<Vec<u8>> {
        if blob.len() < IV_SIZE + 32 {
            bail!("envelope too short");
        }
        let (iv_ct, tag) = blob.split_at(blob.len() - 32);
        self.decrypt_pair(iv_ct, tag)
    }

    fn decrypt_unverified(&self, iv_ct: &[u8]) -> Result<Vec<u8>> {
        if iv_ct.len() < IV_SIZE {
            bail!("envelope shorter than one iv");
        }
        let (iv, ct) = iv_ct.split_at(IV_SIZE);
        let padded = aes_cbc::decrypt(self.cipher_key.expose_secret(), iv, ct)?;
        self.padding.unpad(&padded)
    }

    fn scrypt_params() -> Result<Params> {
        Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, SCRYPT_OUTPUT_LEN).map_err(|e| anyhow!("invalid scrypt params: {e}"))
    }

    /// Derives a fresh `(salt, verifier)` pair for a client-supplied
    /// verifier-hex password, for storage in the account store.
    pub fn derive_password_for_storage(password_hex: &str) -> Result<(Vec<u8>, Vec<u8>)> {
        let password = hex::decode(password_hex).map_err(|e| anyhow!("password is not valid hex: {e}"))?;
        let mut salt = vec![0u8; PASSWORD_SALT_LEN];
        rand::rng().fill_bytes(&mut salt);
        let mut verifier = vec![0u8; SCRYPT_OUTPUT_LEN];
        scrypt::scrypt(&password, &salt, &Self::scrypt_params()?, &mut verifier).map_err(|e| anyhow!("scrypt derive failed: {e}"))?;
        Ok((salt, verifier))
    }

    /// Verifies a client-supplied verifier-hex password against the stored
    /// salt and verifier bytes.
    pub fn verify_stored_password(password_hex: &str, salt: &[u8], verifier: &[u8]) -> Result<()> {
        ensure!(verifier.len() == SCRYPT_OUTPUT_LEN, "stored verifier has unexpected length");
        let password = hex::decode(password_hex).map_err(|e| anyhow!("password is not valid hex: {e}"))?;
        let mut computed = vec![0u8; SCRYPT_OUTPUT_LEN];
        scrypt::scrypt(&password, salt, &Self::scrypt_params()?, &mut computed).map_err(|e| anyhow!("scrypt derive failed: {e}"))?;
        if bool::from(computed.as_slice().ct_eq(verifier)) { Ok(()) } else { bail!("auth") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_body() {
        let c = Cipher::new(b"1234").unwrap();
        for pt in [&b""[..], b"hello\n", &vec![0x7Fu8; 1000]] {
            let env = c.encrypt(pt, Mode::Body).unwrap();
            assert_eq!(c.decrypt_pair(&env.iv_ct, &env.tag).unwrap(), pt);
        }
    }

    #[test]
    fn filename_mode_is_deterministic() {
        let c = Cipher::new(b"1234").unwrap();
        let a = c.encrypt(b"a.txt", Mode::Filename).unwrap();
        let b = c.encrypt(b"a.txt", Mode::Filename).unwrap();
        assert_eq!(a.to_concat(), b.to_concat());
    }

    #[test]
    fn filename_round_trips_concat_form() {
        let c = Cipher::new(b"1234").unwrap();
        let env = c.encrypt(b"a.txt", Mode::Filename).unwrap();
        assert_eq!(c.decrypt_concat(&env.to_concat()).unwrap(), b"a.txt");
    }

    #[test]
    fn tamper_is_detected() {
        let c = Cipher::new(b"1234").unwrap();
        let env = c.encrypt(b"hello\n", Mode::Body).unwrap();
        let mut tampered = env.iv_ct.clone();
        tampered[0] ^= 0xFF;
        assert!(c.decrypt_pair(&tampered, &env.tag).is_err());
    }

    #[test]
    fn password_verifier_round_trips() {
        let hex_pw = Cipher::new(b"1234").unwrap().server_verifier_hex().unwrap();
        let (salt, verifier) = Cipher::derive_password_for_storage(&hex_pw).unwrap();
        assert!(Cipher::verify_stored_password(&hex_pw, &salt, &verifier).is_ok());
        assert!(Cipher::verify_stored_password("deadbeef", &salt, &verifier).is_err());
    }
}
