//! The account store: usernames, their Scrypt salt and
//! verifier, and a metadata row (home id, perm bits, operms, login/quit
//! messages).

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{ProtocolError, Result};
use crate::types::{OpermsMap, UserMetadata};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    salt     BLOB NOT NULL,
    verifier BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS user_metadata (
    username   TEXT PRIMARY KEY REFERENCES users(username) ON DELETE CASCADE,
    homedir    TEXT NOT NULL,
    perm       TEXT NOT NULL DEFAULT 'elradfmwMT',
    operms     TEXT NOT NULL DEFAULT '{}',
    msg_login  TEXT NOT NULL DEFAULT '',
    msg_quit   TEXT NOT NULL DEFAULT ''
);
"#;

/// A registered user's credential row.
pub struct UserRecord {
    pub salt: Vec<u8>,
    pub verifier: Vec<u8>,
}

/// The server-wide account store, backed by one SQLite file at the server
/// root. Every operation opens and closes its own connection.
pub struct AccountStore {
    db_path: PathBuf,
}

impl AccountStore {
    /// Opens (creating if absent) the account store at `path` and applies
    /// the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { db_path })
    }

    fn conn(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    pub fn has_user(&self, username: &str) -> Result<bool> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT 1 FROM users WHERE username = ?1", params![username], |_| Ok(())).optional()?.is_some())
    }

    pub fn fetch_user(&self, username: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn()?;
        conn.query_row("SELECT salt, verifier FROM users WHERE username = ?1", params![username], |row| {
            Ok(UserRecord { salt: row.get(0)?, verifier: row.get(1)? })
        })
        .optional()
        .map_err(ProtocolError::from)
    }

    pub fn fetch_user_metadata(&self, username: &str) -> Result<Option<UserMetadata>> {
        let conn = self.conn()?;
        conn.query_row("SELECT homedir, perm, operms, msg_login, msg_quit FROM user_metadata WHERE username = ?1", params![username], |row| {
            let operms_json: String = row.get(2)?;
            let operms: OpermsMap = serde_json::from_str(&operms_json).unwrap_or_default();
            Ok(UserMetadata { homedir: row.get(0)?, perm: row.get(1)?, operms, msg_login: row.get(3)?, msg_quit: row.get(4)? })
        })
        .optional()
        .map_err(ProtocolError::from)
    }

    /// Returns the user's per-path operms map, or an empty one if unset.
    pub fn fetch_operms(&self, username: &str) -> Result<OpermsMap> {
        Ok(self.fetch_user_metadata(username)?.map(|m| m.operms).unwrap_or_default())
    }

    /// Monotonically allocates the next user home opaque id.
    pub fn next_user_num(&self) -> Result<i64> {
        let conn = self.conn()?;
        let next: i64 = conn.query_row("SELECT COALESCE(MAX(CAST(homedir AS INTEGER)), -1) + 1 FROM user_metadata", [], |row| row.get(0))?;
        Ok(next)
    }

    /// Registers a new user: credential row plus metadata row, in one
    /// transaction.
    pub fn add_user(&self, username: &str, salt: &[u8], verifier: &[u8], homedir: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("INSERT INTO users (username, salt, verifier) VALUES (?1, ?2, ?3)", params![username, salt, verifier])?;
        tx.execute("INSERT INTO user_metadata (username, homedir) VALUES (?1, ?2)", params![username, homedir])?;
        tx.commit()?;
        Ok(())
    }

    pub fn remove_user(&self, username: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        Ok(())
    }

    /// Overwrites the account's global permission bits.
    pub fn set_perm(&self, username: &str, perm: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("UPDATE user_metadata SET perm = ?1 WHERE username = ?2", params![perm, username])?;
        Ok(())
    }

    /// Overwrites the account's per-path operms overrides.
    pub fn set_operms(&self, username: &str, operms: &OpermsMap) -> Result<()> {
        let conn = self.conn()?;
        let json = serde_json::to_string(operms).map_err(|e| anyhow::anyhow!("serializing operms: {e}"))?;
        conn.execute("UPDATE user_metadata SET operms = ?1 WHERE username = ?2", params![json, username])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_fetch_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::open(dir.path().join("accounts.db")).unwrap();
        assert!(!store.has_user("rawn").unwrap());

        let home = store.next_user_num().unwrap().to_string();
        store.add_user("rawn", b"salt1234", b"verifier-bytes", &home).unwrap();

        assert!(store.has_user("rawn").unwrap());
        let rec = store.fetch_user("rawn").unwrap().unwrap();
        assert_eq!(rec.salt, b"salt1234");
        let meta = store.fetch_user_metadata("rawn").unwrap().unwrap();
        assert_eq!(meta.homedir, home);
    }

    #[test]
    fn unknown_user_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::open(dir.path().join("accounts.db")).unwrap();
        assert!(store.fetch_user("nobody").unwrap().is_none());
    }

    #[test]
    fn next_user_num_increments() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::open(dir.path().join("accounts.db")).unwrap();
        assert_eq!(store.next_user_num().unwrap(), 0);
        store.add_user("a", b"s", b"v", "0").unwrap();
        assert_eq!(store.next_user_num().unwrap(), 1);
    }

    #[test]
    fn new_account_defaults_to_full_perm_and_empty_operms() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::open(dir.path().join("accounts.db")).unwrap();
        store.add_user("fay", b"s", b"v", "0").unwrap();
        let meta = store.fetch_user_metadata("fay").unwrap().unwrap();
        assert_eq!(meta.perm, "elradfmwMT");
        assert!(store.fetch_operms("fay").unwrap().0.is_empty());
    }

    #[test]
    fn set_perm_and_set_operms_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = AccountStore::open(dir.path().join("accounts.db")).unwrap();
        store.add_user("gus", b"s", b"v", "0").unwrap();

        store.set_perm("gus", "lre").unwrap();
        assert_eq!(store.fetch_user_metadata("gus").unwrap().unwrap().perm, "lre");

        let mut overrides = OpermsMap::default();
        overrides.0.insert("/shared".to_string(), "lrw".to_string());
        store.set_operms("gus", &overrides).unwrap();
        let operms = store.fetch_operms("gus").unwrap();
        assert_eq!(operms.0.get("/shared"), Some(&"lrw".to_string()));
    }
}
