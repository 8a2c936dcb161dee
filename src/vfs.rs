//! The opaque-name virtual filesystem: translates between
//! client-visible ciphertext `ftppath`s and server-side numeric `numpath`s.

use std::path::{Path, PathBuf};

use crate::db::FileMetaStore;
use crate::error::{ProtocolError, Result};

/// One user's home directory, backed by a [`FileMetaStore`].
pub struct OpaqueVfs {
    root: PathBuf,
    meta: FileMetaStore,
}

fn normalize(ftppath: &str) -> String {
    if ftppath.starts_with('/') { ftppath.to_string() } else { format!("/{ftppath}") }
}

impl OpaqueVfs {
    /// Creates a new user's home: allocates filenum `0`, its numpath equal
    /// to the home directory itself, creates the directory, and opens the
    /// metadata store inside it.
    pub fn mkhomedir(server_root: &Path, homedir_id: &str) -> Result<Self> {
        let root = server_root.join(homedir_id);
        std::fs::create_dir_all(&root)?;
        let meta = FileMetaStore::open(root.join(crate::config::FILEMETA_DB_NAME), 0, homedir_id)?;
        Ok(Self { root, meta })
    }

    /// Opens the home directory and its metadata store for an already
    /// registered user.
    pub fn open(server_root: &Path, homedir_id: &str) -> Result<Self> {
        let root = server_root.join(homedir_id);
        let meta = FileMetaStore::open(root.join(crate::config::FILEMETA_DB_NAME), 0, homedir_id)?;
        Ok(Self { root, meta })
    }

    fn real_path(&self, numpath: &str) -> PathBuf {
        self.root.parent().map(|p| p.join(numpath)).unwrap_or_else(|| PathBuf::from(numpath))
    }

    /// Absolute on-disk path for a `numpath`.
    pub fn fs_path(&self, numpath: &str) -> PathBuf {
        self.real_path(numpath)
    }

    /// Translates a client ftppath to its server numpath, allocating a new
    /// filenum (and name-map row) if the path hasn't been seen before.
    pub fn ftp2fs(&self, ftppath: &str) -> Result<String> {
        let ftppath = normalize(ftppath);
        if let Some((_, numpath)) = self.meta.fetch_numpath_by_ftppath(&ftppath)? {
            return Ok(numpath);
        }
        let parent_numpath = self.parent_numpath(&ftppath)?;
        let filenum = self.meta.get_next_filenum()?;
        let numpath = format!("{parent_numpath}/{filenum}");
        self.meta.add_numpath(filenum, &numpath, &ftppath)?;
        Ok(numpath)
    }

    fn parent_numpath(&self, ftppath: &str) -> Result<String> {
        match ftppath.rfind('/') {
            Some(0) | None => self.meta.fetch_numpath_by_ftppath("/")?.map(|(_, n)| n).ok_or(ProtocolError::NotFound),
            Some(idx) => {
                let parent_ftppath = &ftppath[..idx];
                self.meta.fetch_numpath_by_ftppath(parent_ftppath)?.map(|(_, n)| n).ok_or(ProtocolError::NotFound)
            }
        }
    }

    /// Translates a server numpath back to the client-supplied ftppath.
    pub fn fs2ftp(&self, numpath: &str) -> Result<String> {
        self.meta.fetch_filepath(numpath)?.ok_or(ProtocolError::NotFound)
    }

    /// Looks up an already-registered ftppath without allocating a new
    /// filenum if it's missing (use for RETR/DELE/SIZE/RNFR; `ftp2fs` is for
    /// STOR, where a new path should be created).
    pub fn resolve(&self, ftppath: &str) -> Result<(i64, String)> {
        let ftppath = normalize(ftppath);
        self.meta.fetch_numpath_by_ftppath(&ftppath)?.ok_or(ProtocolError::NotFound)
    }

    /// Computes a fresh numpath under the parent of `ftppath`, without
    /// registering it — used as the destination of a rename, which updates
    /// an existing row in place rather than inserting a new one.
    pub fn alloc_numpath_for(&self, ftppath: &str) -> Result<String> {
        let ftppath = normalize(ftppath);
        let parent_numpath = self.parent_numpath(&ftppath)?;
        let filenum = self.meta.get_next_filenum()?;
        Ok(format!("{parent_numpath}/{filenum}"))
    }

    /// Lists the ftppath basenames of every real directory entry under
    /// `numpath`, filtering out entries with no name-map row (e.g. the
    /// per-home metadata DB file itself).
    pub fn listdir(&self, numpath: &str) -> Result<Vec<String>> {
        let dir = self.real_path(numpath);
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let Some(basename) = entry.file_name().to_str().map(str::to_string) else { continue };
            let child_numpath = format!("{numpath}/{basename}");
            if let Some(ftppath) = self.meta.fetch_filepath(&child_numpath)? {
                out.push(ftppath.rsplit('/').next().unwrap_or(&ftppath).to_string());
            }
        }
        Ok(out)
    }

    /// Renames the underlying file and updates the map so the destination
    /// numpath resolves to the original ftppath.
    pub fn rename(&self, src_numpath: &str, dst_numpath: &str) -> Result<()> {
        std::fs::rename(self.real_path(src_numpath), self.real_path(dst_numpath))?;
        self.meta.update_numpath(src_numpath, dst_numpath)?;
        Ok(())
    }

    /// Removes a file both on disk and from the name map and integrity
    /// tables.
    pub fn remove(&self, numpath: &str) -> Result<()> {
        let path = self.real_path(numpath);
        if path.is_dir() {
            std::fs::remove_dir(&path)?;
        } else {
            std::fs::remove_file(&path)?;
        }
        if let Some((filenum, _)) = self.meta.fetch_numpath_by_ftppath(&self.fs2ftp(numpath)?)? {
            self.meta.remove_file_by_num(filenum)?;
        }
        Ok(())
    }

    pub fn meta(&self) -> &FileMetaStore {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ftp2fs_allocates_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = OpaqueVfs::mkhomedir(dir.path(), "0").unwrap();
        let numpath = vfs.ftp2fs("a.txt").unwrap();
        assert_eq!(vfs.ftp2fs("a.txt").unwrap(), numpath);
        assert_eq!(vfs.fs2ftp(&numpath).unwrap(), "/a.txt");
    }

    #[test]
    fn listdir_filters_entries_without_map_rows() {
        let dir = tempfile::tempdir().unwrap();
        let vfs = OpaqueVfs::mkhomedir(dir.path(), "0").unwrap();
        let numpath = vfs.ftp2fs("a.txt").unwrap();
        std::fs::write(vfs.fs_path(&numpath), b"hi").unwrap();
        // the metadata DB file itself has no name-map row
        let entries = vfs.listdir("0").unwrap();
        assert_eq!(entries, vec!["a.txt".to_string()]);
    }
}
