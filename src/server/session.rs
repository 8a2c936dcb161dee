//! Per-connection session actor: the `RGTR`/`TAG` state machine, the RETR
//! append-tag trick, and the post-auth tamper scan.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{info, instrument, warn};

use crate::cipher::Cipher;
use crate::db::AccountStore;
use crate::protocol::{Command, Reply};
use crate::types::OpermsMap;
use crate::vfs::OpaqueVfs;
use crate::wire::{read_frame, read_line, write_frame};

/// Per-session state: which commands are legal next depends on this.
enum State {
    Unauth,
    AwaitPass { username: String, registering: bool },
    Auth {
        username: String,
        vfs: OpaqueVfs,
        cwd: String,
        pending_file: Option<(i64, PathBuf)>,
        rename_from: Option<String>,
        perm: String,
        operms: OpermsMap,
    },
}

pub struct Session {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    peer: SocketAddr,
    accounts: Arc<AccountStore>,
    root: PathBuf,
    idle_timeout: Duration,
    state: State,
}

/// Removes its path on drop, used for the RETR `blob‖tag` temp file so it's
/// cleaned up on both the success and incomplete-send path.
struct TempFileGuard<'a>(&'a Path);

impl Drop for TempFileGuard<'_> {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(self.0);
    }
}

impl Session {
    pub fn new(socket: TcpStream, peer: SocketAddr, accounts: Arc<AccountStore>, root: PathBuf, idle_timeout: Duration) -> Self {
        let (read_half, writer) = socket.into_split();
        Self { reader: BufReader::new(read_half), writer, peer, accounts, root, idle_timeout, state: State::Unauth }
    }

    #[instrument(skip(self), fields(peer = %self.peer))]
    pub async fn run(mut self) -> Result<()> {
        info!("session started");
        self.send(Reply::new(220, "cryptftp server ready.")).await?;
        loop {
            let line = match tokio::time::timeout(self.idle_timeout, read_line(&mut self.reader)).await {
                Ok(Ok(Some(line))) => line,
                Ok(Ok(None)) => break,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    warn!("idle timeout, closing connection");
                    break;
                }
            };
            let command = Command::parse(&line);
            if matches!(command, Command::Quit) {
                self.send(Reply::new(221, "Goodbye.")).await?;
                break;
            }
            let reply = self.dispatch(command).await;
            self.send(reply).await?;
        }
        info!("session ended");
        Ok(())
    }

    async fn send(&mut self, reply: Reply) -> Result<()> {
        self.writer.write_all(reply.to_string().as_bytes()).await?;
        Ok(())
    }

    async fn dispatch(&mut self, command: Command) -> Reply {
        let result = self.dispatch_inner(command).await;
        match result {
            Ok(reply) => reply,
            Err(e) => match e.downcast::<crate::error::ProtocolError>() {
                Ok(pe) => pe.reply(),
                Err(e) => Reply::new(550, format!("{e}")),
            },
        }
    }

    async fn dispatch_inner(&mut self, command: Command) -> Result<Reply> {
        match (&self.state, command) {
            (State::Unauth, Command::User(username)) => {
                self.state = State::AwaitPass { username, registering: false };
                Ok(Reply::new(331, "User name okay, need password."))
            }
            (State::Unauth, Command::Rgtr(username)) => {
                if self.accounts.has_user(&username)? {
                    return Ok(Reply::new(503, "Username already exists. Choose a different name."));
                }
                self.state = State::AwaitPass { username, registering: true };
                Ok(Reply::new(331, "Username ok, send password."))
            }
            (State::AwaitPass { .. }, Command::Rgtr(_)) => Ok(Reply::new(503, "Can't register while logged in.")),
            (State::AwaitPass { username, registering: true }, Command::Pass(password_hex)) => {
                let username = username.clone();
                self.register(&username, &password_hex).await
            }
            (State::AwaitPass { username, registering: false }, Command::Pass(password_hex)) => {
                let username = username.clone();
                self.login(&username, &password_hex).await
            }
            (State::Auth { .. }, Command::Rgtr(_)) => Ok(Reply::new(503, "Can't register while logged in.")),
            (State::Auth { .. }, Command::Stor(encpath)) => self.stor(encpath).await,
            (State::Auth { .. }, Command::Tag(tag_hex)) => self.tag(tag_hex).await,
            (State::Auth { .. }, Command::Retr(encpath)) => self.retr(encpath).await,
            (State::Auth { .. }, Command::Dele(encpath)) => self.dele(encpath).await,
            (State::Auth { .. }, Command::Rmd(encpath)) => self.dele(encpath).await,
            (State::Auth { .. }, Command::Mkd(encpath)) => self.mkd(encpath).await,
            (State::Auth { .. }, Command::Cwd(encpath)) => self.cwd(encpath).await,
            (State::Auth { cwd, .. }, Command::Pwd) => Ok(Reply::new(257, format!("\"{cwd}\" is the current directory."))),
            (State::Auth { .. }, Command::List(_) | Command::Nlst(_)) => self.list().await,
            (State::Auth { .. }, Command::Rnfr(encpath)) => self.rnfr(encpath).await,
            (State::Auth { .. }, Command::Rnto(encpath)) => self.rnto(encpath).await,
            (State::Auth { .. }, Command::Size(encpath)) => self.size(encpath).await,
            _ => Ok(Reply::new(503, "Bad sequence of commands.")),
        }
    }

    async fn register(&mut self, username: &str, password_hex: &str) -> Result<Reply> {
        let (salt, verifier) = Cipher::derive_password_for_storage(password_hex)?;
        let homedir = self.accounts.next_user_num()?.to_string();
        OpaqueVfs::mkhomedir(&self.root, &homedir)?;
        self.accounts.add_user(username, &salt, &verifier, &homedir)?;
        let vfs = OpaqueVfs::open(&self.root, &homedir)?;
        let meta = self.accounts.fetch_user_metadata(username)?.ok_or_else(|| anyhow!("just-registered user without metadata"))?;
        self.state = State::Auth {
            username: username.to_string(),
            vfs,
            cwd: "/".to_string(),
            pending_file: None,
            rename_from: None,
            perm: meta.perm,
            operms: self.accounts.fetch_operms(username)?,
        };
        Ok(Reply::new(230, "User registered and logged in."))
    }

    async fn login(&mut self, username: &str, password_hex: &str) -> Result<Reply> {
        let Some(record) = self.accounts.fetch_user(username)? else {
            self.state = State::Unauth;
            return Ok(Reply::new(530, "Login incorrect."));
        };
        if Cipher::verify_stored_password(password_hex, &record.salt, &record.verifier).is_err() {
            self.state = State::Unauth;
            return Ok(Reply::new(530, "Login incorrect."));
        }
        let meta = self.accounts.fetch_user_metadata(username)?.ok_or_else(|| anyhow!("user row without metadata"))?;
        let vfs = OpaqueVfs::open(&self.root, &meta.homedir)?;
        let scan = scan_for_tamper(&vfs)?;
        let operms = self.accounts.fetch_operms(username)?;
        self.state = State::Auth { username: username.to_string(), vfs, cwd: "/".to_string(), pending_file: None, rename_from: None, perm: meta.perm, operms };
        Ok(scan.unwrap_or_else(|| Reply::new(230, "All files unchanged.")))
    }

    /// Checks `letter` against the account's operms override for `path` (the
    /// longest matching prefix wins), falling back to the global `perm`
    /// string when no override matches.
    fn require_perm(&self, letter: char, path: &str) -> Result<()> {
        let (perm, operms) = match &self.state {
            State::Auth { perm, operms, .. } => (perm, operms),
            _ => return Err(anyhow!(crate::error::ProtocolError::BadSequence)),
        };
        let normalized = encpath_normalized(path);
        let effective = operms.0.iter().filter(|(prefix, _)| normalized.starts_with(prefix.as_str())).max_by_key(|(prefix, _)| prefix.len()).map_or(perm.as_str(), |(_, bits)| bits.as_str());
        if effective.contains(letter) {
            Ok(())
        } else {
            Err(anyhow!(crate::error::ProtocolError::PermissionDenied))
        }
    }

    fn vfs(&self) -> Result<&OpaqueVfs> {
        match &self.state {
            State::Auth { vfs, .. } => Ok(vfs),
            _ => Err(anyhow!(crate::error::ProtocolError::BadSequence)),
        }
    }

    async fn stor(&mut self, encpath: String) -> Result<Reply> {
        self.require_perm('w', &encpath)?;
        let numpath = self.vfs()?.ftp2fs(&encpath)?;
        let fs_path = self.vfs()?.fs_path(&numpath);
        self.send(Reply::new(150, "Opening binary mode data connection.")).await?;
        let blob = read_frame(&mut self.reader).await?;
        tokio::fs::write(&fs_path, &blob).await?;

        let filenum = self.vfs()?.meta().fetch_numpath_by_ftppath(&encpath_normalized(&encpath))?.map(|(n, _)| n).ok_or_else(|| anyhow!("just-stored path missing"))?;
        if let State::Auth { pending_file, .. } = &mut self.state {
            *pending_file = Some((filenum, fs_path));
        }
        Ok(Reply::new(226, "Transfer complete."))
    }

    async fn tag(&mut self, tag_hex: String) -> Result<Reply> {
        let (filenum, fs_path) = match &self.state {
            State::Auth { pending_file: Some((f, p)), .. } => (*f, p.clone()),
            _ => return Err(anyhow!(crate::error::ProtocolError::BadSequence)),
        };
        let size = tokio::fs::metadata(&fs_path).await?.len() as i64;
        self.vfs()?.meta().add_file_meta(filenum, &tag_hex, size)?;
        if let State::Auth { pending_file, .. } = &mut self.state {
            *pending_file = None;
        }
        Ok(Reply::new(250, "File transfer completed."))
    }

    async fn retr(&mut self, encpath: String) -> Result<Reply> {
        self.require_perm('r', &encpath)?;
        let (filenum, numpath) = self.vfs()?.resolve(&encpath)?;
        let fs_path = self.vfs()?.fs_path(&numpath);
        let recorded_size = self.vfs()?.meta().fetch_size(filenum)?.ok_or(crate::error::ProtocolError::NotFound)?;
        let actual_size = tokio::fs::metadata(&fs_path).await?.len() as i64;
        if actual_size != recorded_size {
            return Ok(Reply::new(555, "File size changed."));
        }
        let tag_hex = self.vfs()?.meta().fetch_tag(filenum)?.ok_or(crate::error::ProtocolError::NotFound)?;
        let tag = hex::decode(&tag_hex).map_err(|e| anyhow!("corrupt stored tag: {e}"))?;

        let temp_path = fs_path.with_file_name(format!("{}__temp__", fs_path.file_name().and_then(|n| n.to_str()).unwrap_or("tmp")));
        let _guard = TempFileGuard(&temp_path);
        let mut blob = tokio::fs::read(&fs_path).await?;
        blob.extend_from_slice(&tag);
        tokio::fs::write(&temp_path, &blob).await?;

        self.send(Reply::new(150, "Opening binary mode data connection.")).await?;
        write_frame(&mut self.writer, &blob).await?;
        Ok(Reply::new(226, "Transfer complete."))
    }

    async fn dele(&mut self, encpath: String) -> Result<Reply> {
        self.require_perm('d', &encpath)?;
        let (_, numpath) = self.vfs()?.resolve(&encpath)?;
        self.vfs()?.remove(&numpath)?;
        Ok(Reply::new(250, "File removed."))
    }

    async fn mkd(&mut self, encpath: String) -> Result<Reply> {
        self.require_perm('m', &encpath)?;
        let numpath = self.vfs()?.ftp2fs(&encpath)?;
        tokio::fs::create_dir(self.vfs()?.fs_path(&numpath)).await?;
        Ok(Reply::new(257, format!("\"{encpath}\" created.")))
    }

    async fn cwd(&mut self, encpath: String) -> Result<Reply> {
        self.require_perm('e', &encpath)?;
        self.vfs()?.resolve(&encpath)?;
        let normalized = encpath_normalized(&encpath);
        if let State::Auth { cwd, .. } = &mut self.state {
            *cwd = normalized;
        }
        Ok(Reply::new(250, "Directory successfully changed."))
    }

    async fn list(&mut self) -> Result<Reply> {
        let (cwd, vfs) = match &self.state {
            State::Auth { cwd, vfs, .. } => (cwd.clone(), vfs),
            _ => return Err(anyhow!(crate::error::ProtocolError::BadSequence)),
        };
        self.require_perm('l', &cwd)?;
        let (_, numpath) = vfs.resolve(&cwd)?;
        let entries = vfs.listdir(&numpath)?;
        let body = entries.join("\r\n");
        self.send(Reply::new(150, "Here comes the directory listing.")).await?;
        write_frame(&mut self.writer, body.as_bytes()).await?;
        Ok(Reply::new(226, "Directory send OK."))
    }

    async fn rnfr(&mut self, encpath: String) -> Result<Reply> {
        self.require_perm('f', &encpath)?;
        let (_, numpath) = self.vfs()?.resolve(&encpath)?;
        if let State::Auth { rename_from, .. } = &mut self.state {
            *rename_from = Some(numpath);
        }
        Ok(Reply::new(350, "Requested file action pending further information."))
    }

    async fn rnto(&mut self, encpath: String) -> Result<Reply> {
        self.require_perm('f', &encpath)?;
        let src_numpath = match &self.state {
            State::Auth { rename_from: Some(p), .. } => p.clone(),
            _ => return Err(anyhow!(crate::error::ProtocolError::BadSequence)),
        };
        let dst_numpath = self.vfs()?.alloc_numpath_for(&encpath)?;
        self.vfs()?.rename(&src_numpath, &dst_numpath)?;
        if let State::Auth { rename_from, .. } = &mut self.state {
            *rename_from = None;
        }
        Ok(Reply::new(250, "Rename successful."))
    }

    async fn size(&mut self, encpath: String) -> Result<Reply> {
        let (filenum, _) = self.vfs()?.resolve(&encpath)?;
        let size = self.vfs()?.meta().fetch_size(filenum)?.ok_or(crate::error::ProtocolError::NotFound)?;
        Ok(Reply::new(213, size.to_string()))
    }
}

fn encpath_normalized(ftppath: &str) -> String {
    if ftppath.starts_with('/') { ftppath.to_string() } else { format!("/{ftppath}") }
}

/// Scans the home directory for missing or size-altered files, run once
/// right after a successful login. Returns `None` if everything matches.
fn scan_for_tamper(vfs: &OpaqueVfs) -> Result<Option<Reply>> {
    let mut missing = Vec::new();
    let mut altered = Vec::new();
    for row in vfs.meta().fetch_all_file_sizes()? {
        let fs_path = vfs.fs_path(&row.numpath);
        match std::fs::metadata(&fs_path) {
            Ok(meta) if meta.len() as i64 == row.size => {}
            Ok(_) => altered.push(row.ftppath),
            Err(_) => missing.push(row.ftppath),
        }
    }
    if missing.is_empty() && altered.is_empty() {
        return Ok(None);
    }
    let mut message = String::from("File integrity issues detected.");
    for path in &missing {
        message.push_str(&format!(" missing={path}"));
    }
    for path in &altered {
        message.push_str(&format!(" altered={path}"));
    }
    Ok(Some(Reply::new(556, message)))
}

