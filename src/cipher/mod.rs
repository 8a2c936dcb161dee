//! The cryptographic envelope: key derivation, authenticated encryption of
//! file bodies and path components, and the password verifier.

pub mod aes_cbc;
pub mod envelope;
pub mod kdf;
pub mod mac;

pub use envelope::{Cipher, Envelope, Mode};
