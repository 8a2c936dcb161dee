//! Per-home file metadata store: the name map between
//! `filenum`, opaque `numpath`, and client-supplied `ftppath`, plus the
//! integrity table of `(tag, size)` per file.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::Result;
use crate::types::FileSizeRow;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS filenums (
    filenum INTEGER PRIMARY KEY,
    numpath TEXT NOT NULL UNIQUE,
    ftppath TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS file_metadata (
    filenum INTEGER PRIMARY KEY REFERENCES filenums(filenum) ON DELETE CASCADE,
    tag_hex TEXT NOT NULL,
    size    INTEGER NOT NULL
);
"#;

/// One home directory's name map and integrity tables.
pub struct FileMetaStore {
    db_path: PathBuf,
}

impl FileMetaStore {
    /// Opens (creating if absent) the per-home store at `path`. If the
    /// store is newly created, seeds the root row
    /// `(homedir_filenum, homedir_numpath, "/")`.
    pub fn open(path: impl AsRef<Path>, homedir_filenum: i64, homedir_numpath: &str) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let is_new = !db_path.exists();
        let conn = Connection::open(&db_path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        let store = Self { db_path };
        if is_new {
            store.add_numpath(homedir_filenum, homedir_numpath, "/")?;
        }
        Ok(store)
    }

    fn conn(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }

    /// Allocates the next `filenum`: `max(filenum) + 1`, or `0` if empty.
    /// Intended to be called inside the same logical operation as the
    /// following `add_numpath`; since each call opens its own connection,
    /// callers that need strict atomicity should serialize through the
    /// owning session.
    pub fn get_next_filenum(&self) -> Result<i64> {
        let conn = self.conn()?;
        let next: i64 = conn.query_row("SELECT COALESCE(MAX(filenum), -1) + 1 FROM filenums", [], |row| row.get(0))?;
        Ok(next)
    }

    pub fn add_numpath(&self, filenum: i64, numpath: &str, ftppath: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("INSERT INTO filenums (filenum, numpath, ftppath) VALUES (?1, ?2, ?3)", params![filenum, numpath, ftppath])?;
        Ok(())
    }

    pub fn fetch_numpath_by_ftppath(&self, ftppath: &str) -> Result<Option<(i64, String)>> {
        let conn = self.conn()?;
        conn.query_row("SELECT filenum, numpath FROM filenums WHERE ftppath = ?1", params![ftppath], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()
            .map_err(Into::into)
    }

    /// The last segment of the `ftppath` registered for `filenum`.
    pub fn fetch_filename(&self, filenum: i64) -> Result<Option<String>> {
        let conn = self.conn()?;
        let ftppath: Option<String> = conn.query_row("SELECT ftppath FROM filenums WHERE filenum = ?1", params![filenum], |row| row.get(0)).optional()?;
        Ok(ftppath.map(|p| p.rsplit('/').next().unwrap_or(&p).to_string()))
    }

    pub fn fetch_filepath(&self, numpath: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        conn.query_row("SELECT ftppath FROM filenums WHERE numpath = ?1", params![numpath], |row| row.get(0)).optional().map_err(Into::into)
    }

    /// Rewrites the `numpath` of an existing row, leaving `filenum` and
    /// `ftppath` (and any integrity row) untouched — a rename only moves
    /// where the row is addressed from, not its identity.
    pub fn update_numpath(&self, old_numpath: &str, new_numpath: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("UPDATE filenums SET numpath = ?1 WHERE numpath = ?2", params![new_numpath, old_numpath])?;
        Ok(())
    }

    pub fn add_file_meta(&self, filenum: i64, tag_hex: &str, size: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO file_metadata (filenum, tag_hex, size) VALUES (?1, ?2, ?3)
             ON CONFLICT(filenum) DO UPDATE SET tag_hex = excluded.tag_hex, size = excluded.size",
            params![filenum, tag_hex, size],
        )?;
        Ok(())
    }

    /// Alias for `add_file_meta`; the integrity row upsert is idempotent
    /// whether this is the first `TAG` for a `filenum` or a later one.
    pub fn update_file_meta(&self, filenum: i64, tag_hex: &str, size: i64) -> Result<()> {
        self.add_file_meta(filenum, tag_hex, size)
    }

    pub fn fetch_tag(&self, filenum: i64) -> Result<Option<String>> {
        let conn = self.conn()?;
        conn.query_row("SELECT tag_hex FROM file_metadata WHERE filenum = ?1", params![filenum], |row| row.get(0)).optional().map_err(Into::into)
    }

    pub fn fetch_size(&self, filenum: i64) -> Result<Option<i64>> {
        let conn = self.conn()?;
        conn.query_row("SELECT size FROM file_metadata WHERE filenum = ?1", params![filenum], |row| row.get(0)).optional().map_err(Into::into)
    }

    pub fn fetch_all_file_sizes(&self) -> Result<Vec<FileSizeRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT f.numpath, f.ftppath, m.size FROM filenums f JOIN file_metadata m ON m.filenum = f.filenum",
        )?;
        let rows = stmt
            .query_map([], |row| Ok(FileSizeRow { numpath: row.get(0)?, ftppath: row.get(1)?, size: row.get(2)? }))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn remove_file_by_num(&self, filenum: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM file_metadata WHERE filenum = ?1", params![filenum])?;
        conn.execute("DELETE FROM filenums WHERE filenum = ?1", params![filenum])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_root_row_on_creation() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetaStore::open(dir.path().join(".filemeta.db"), 0, "0").unwrap();
        assert_eq!(store.fetch_filepath("0").unwrap().as_deref(), Some("/"));
    }

    #[test]
    fn filenum_allocation_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetaStore::open(dir.path().join(".filemeta.db"), 0, "0").unwrap();
        let n = store.get_next_filenum().unwrap();
        assert_eq!(n, 1);
        store.add_numpath(n, "0/1", "a.txt").unwrap();
        assert_eq!(store.fetch_numpath_by_ftppath("a.txt").unwrap(), Some((n, "0/1".to_string())));
        assert_eq!(store.fetch_filename(n).unwrap().as_deref(), Some("a.txt"));
    }

    #[test]
    fn tag_and_size_round_trip_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetaStore::open(dir.path().join(".filemeta.db"), 0, "0").unwrap();
        let n = store.get_next_filenum().unwrap();
        store.add_numpath(n, "0/1", "a.txt").unwrap();
        store.add_file_meta(n, "deadbeef", 48).unwrap();
        assert_eq!(store.fetch_tag(n).unwrap().as_deref(), Some("deadbeef"));
        assert_eq!(store.fetch_size(n).unwrap(), Some(48));

        store.remove_file_by_num(n).unwrap();
        assert_eq!(store.fetch_tag(n).unwrap(), None);
        assert_eq!(store.fetch_filepath("0/1").unwrap(), None);
    }

    #[test]
    fn rename_preserves_integrity_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileMetaStore::open(dir.path().join(".filemeta.db"), 0, "0").unwrap();
        let n = store.get_next_filenum().unwrap();
        store.add_numpath(n, "0/1", "a.txt").unwrap();
        store.add_file_meta(n, "deadbeef", 48).unwrap();

        store.update_numpath("0/1", "0/2").unwrap();
        assert_eq!(store.fetch_filepath("0/2").unwrap().as_deref(), Some("a.txt"));
        assert_eq!(store.fetch_tag(n).unwrap().as_deref(), Some("deadbeef"));
    }
}
