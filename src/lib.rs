//! cryptftp - End-to-end encrypted file transfer over an extended FTP
//! control/data protocol.
//!
//! Every filename and file body crossing the wire is encrypted client-side
//! with AES-256-CBC under an encrypt-then-MAC (HMAC-SHA256) envelope; the
//! server never sees plaintext names or contents, only an opaque numbered
//! virtual filesystem it uses to store and serve ciphertext.

pub mod allocator;
pub mod cipher;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod padding;
pub mod pathcodec;
pub mod protocol;
pub mod secret;
pub mod server;
pub mod types;
pub mod ui;
pub mod vfs;
pub mod wire;
