//! Application configuration and cryptographic constants.
//!
//! Single source of truth for the sizes and parameters the wire protocol,
//! envelope format, and on-disk schema all depend on.

/// The application name used in user-facing output and prompts.
pub const APP_NAME: &str = "cryptftp";

/// Length in bytes of each derived key (`cipher_key`, `mac_key`,
/// `server_verifier_key`).
pub const DERIVED_KEY_LEN: usize = 32;

/// AES-256 key length in bytes.
pub const AES_KEY_SIZE: usize = 32;

/// AES-CBC IV length in bytes (one block).
pub const IV_SIZE: usize = 16;

/// Envelope padding block size in bytes.
///
/// Intentionally 32, not the usual 16-byte AES block. A 16-byte
/// re-implementation is not wire-compatible.
pub const PADDING_BLOCK_SIZE: usize = 32;

/// HMAC-SHA256 authentication tag length in bytes.
pub const MAC_SIZE: usize = 32;

/// Scrypt parameters for the stored password verifier.
pub const SCRYPT_LOG_N: u8 = 14;
pub const SCRYPT_R: u32 = 8;
pub const SCRYPT_P: u32 = 1;
pub const SCRYPT_OUTPUT_LEN: usize = 32;

/// Length in bytes of the random salt stored alongside a user's verifier.
pub const PASSWORD_SALT_LEN: usize = 16;

/// Name of the per-home SQLite file. Non-numeric basename, so it is
/// automatically excluded from `listdir` by the "numeric basename" rule.
pub const FILEMETA_DB_NAME: &str = ".filemeta.db";

/// Name of the account store SQLite file at the server root.
pub const ACCOUNTS_DB_NAME: &str = "accounts.db";

/// Maximum simultaneous connections accepted by the server.
pub const MAX_CONNECTIONS: usize = 256;

/// Maximum simultaneous connections accepted from a single remote IP.
pub const MAX_CONNECTIONS_PER_IP: usize = 5;

/// Idle timeout for a connection awaiting its next command.
pub const IDLE_TIMEOUT_SECS: u64 = 300;

/// Default bind address for the server binary.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:2121";

/// Default server address the client binary connects to.
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:2121";
