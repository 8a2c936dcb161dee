//! Shared value types used across the account store, file metadata store,
//! and VFS layers.

use serde::{Deserialize, Serialize};

/// A user's account metadata row.
#[derive(Debug, Clone)]
pub struct UserMetadata {
    pub homedir: String,
    pub perm: String,
    pub operms: OpermsMap,
    pub msg_login: String,
    pub msg_quit: String,
}

/// Per-path operms, stored as a JSON object mapping a path prefix to a
/// permission string. Opaque to everything except the authorizer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpermsMap(pub std::collections::BTreeMap<String, String>);

/// A `(numpath, ftppath, size)` triple as returned by
/// `fetch_all_file_sizes` for the post-auth tamper scan.
#[derive(Debug, Clone)]
pub struct FileSizeRow {
    pub numpath: String,
    pub ftppath: String,
    pub size: i64,
}

/// The client CLI's top-level menu state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Unauth,
    Auth,
}
