//! Error kinds and their mapping to FTP reply codes.

use thiserror::Error;

use crate::protocol::Reply;

/// Errors that carry specific wire-protocol semantics.
///
/// Kept distinct from `anyhow::Error` (used for "can't happen here"
/// plumbing failures) so call sites can match on the kind
/// without string inspection.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HMAC verification failed while decrypting an envelope.
    #[error("envelope authentication failed")]
    Tamper,

    /// Scrypt verification failed, or the user does not exist.
    #[error("authentication failed")]
    Auth,

    /// An `ftppath` has no corresponding row in the name map.
    #[error("path not found")]
    NotFound,

    /// `TAG` arrived with no preceding `STOR` on this session.
    #[error("bad sequence of commands: use STOR first")]
    BadSequence,

    /// On-disk size disagrees with the recorded size ahead of a `RETR`.
    #[error("file size changed")]
    SizeMismatch,

    /// A username is already registered.
    #[error("username already exists")]
    UsernameTaken,

    /// `RGTR` was sent on an already-authenticated session.
    #[error("can't register while logged in")]
    AlreadyLoggedIn,

    /// The account's permission bits (global or per-path) don't include the
    /// letter the attempted operation requires.
    #[error("permission denied")]
    PermissionDenied,

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProtocolError {
    /// The FTP reply this error kind maps to.
    pub fn reply(&self) -> Reply {
        match self {
            ProtocolError::Tamper => Reply::new(556, "File integrity check failed."),
            ProtocolError::Auth => Reply::new(530, "Login incorrect."),
            ProtocolError::NotFound => Reply::new(550, "File not found."),
            ProtocolError::BadSequence => Reply::new(503, "Bad sequence of commands: use STOR first."),
            ProtocolError::SizeMismatch => Reply::new(555, "File size changed."),
            ProtocolError::UsernameTaken => Reply::new(503, "Username already exists. Choose a different name."),
            ProtocolError::AlreadyLoggedIn => Reply::new(503, "Can't register while logged in."),
            ProtocolError::PermissionDenied => Reply::new(550, "Permission denied."),
            ProtocolError::Db(e) => Reply::new(550, format!("Storage error: {e}")),
            ProtocolError::Io(e) => Reply::new(550, format!("I/O error: {e}")),
            ProtocolError::Other(e) => Reply::new(550, format!("{e}")),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
