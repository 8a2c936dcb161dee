//! Client-side command wrappers. Every path-bearing command is
//! passed through [`crate::pathcodec`]; every body through [`Cipher`].

use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::cipher::{Cipher, Mode};
use crate::pathcodec::{decrypt_path, encrypt_path};
use crate::protocol::Reply;
use crate::wire::{read_frame, read_line, write_frame};

/// An open, authenticated-or-not control connection to a `cryptftpd`.
pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    cipher: Cipher,
}

impl Client {
    /// Connects to `addr` and derives the envelope keys from `secret`. Does
    /// not log in or register — call [`Client::login`] or
    /// [`Client::register`] next.
    pub async fn connect(addr: &str, secret: &[u8]) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.with_context(|| format!("connecting to {addr}"))?;
        let (read_half, writer) = stream.into_split();
        let mut client = Self { reader: BufReader::new(read_half), writer, cipher: Cipher::new(secret)? };
        let greeting = client.read_reply().await?;
        if !greeting.is_positive() {
            bail!("server rejected connection: {greeting}");
        }
        Ok(client)
    }

    async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\r\n").await?;
        Ok(())
    }

    async fn read_reply(&mut self) -> Result<Reply> {
        let line = read_line(&mut self.reader).await?.ok_or_else(|| anyhow!("connection closed by server"))?;
        Reply::parse(&line).ok_or_else(|| anyhow!("malformed reply: {line:?}"))
    }

    fn encrypt_token(&self, plaintext: &str) -> Result<String> {
        Ok(hex::encode(self.cipher.encrypt(plaintext.as_bytes(), Mode::Filename)?.to_concat()))
    }

    fn encrypt_path(&self, path: &str) -> Result<String> {
        encrypt_path(&self.cipher, path)
    }

    async fn command(&mut self, line: &str) -> Result<Reply> {
        self.send_line(line).await?;
        self.read_reply().await
    }

    /// Registers a new account, then leaves the session authenticated.
    pub async fn register(&mut self, username: &str) -> Result<()> {
        let enc_user = self.encrypt_token(username)?;
        let reply = self.command(&format!("RGTR {enc_user}")).await?;
        if reply.code != 331 {
            bail!("registration rejected: {reply}");
        }
        let verifier_hex = self.cipher.server_verifier_hex()?;
        let reply = self.command(&format!("PASS {verifier_hex}")).await?;
        if !reply.is_positive() {
            bail!("registration failed: {reply}");
        }
        Ok(())
    }

    /// Logs in; on success returns the server's post-auth scan reply
    /// (`230` clean, or `556` enumerating missing/altered files).
    pub async fn login(&mut self, username: &str) -> Result<Reply> {
        let enc_user = self.encrypt_token(username)?;
        let reply = self.command(&format!("USER {enc_user}")).await?;
        if reply.code != 331 {
            bail!("login rejected: {reply}");
        }
        let verifier_hex = self.cipher.server_verifier_hex()?;
        let reply = self.command(&format!("PASS {verifier_hex}")).await?;
        if reply.code == 530 {
            bail!("login incorrect");
        }
        Ok(reply)
    }

    /// Uploads `local_path`'s full contents as `remote_path`, then submits
    /// the `TAG`.
    pub async fn upload(&mut self, remote_path: &str, local_path: &Path) -> Result<()> {
        let body = tokio::fs::read(local_path).await?;
        let envelope = self.cipher.encrypt(&body, Mode::Body)?;
        let enc_path = self.encrypt_path(remote_path)?;

        let reply = self.command(&format!("STOR {enc_path}")).await?;
        if reply.code != 150 {
            bail!("STOR rejected: {reply}");
        }
        write_frame(&mut self.writer, &envelope.iv_ct).await?;
        let reply = self.read_reply().await?;
        if !reply.is_positive() {
            bail!("upload failed: {reply}");
        }

        let reply = self.command(&format!("TAG {}", hex::encode(envelope.tag))).await?;
        if !reply.is_positive() {
            bail!("TAG rejected: {reply}");
        }
        Ok(())
    }

    /// Downloads `remote_path` to `local_path`. Returns an error (without
    /// writing the output file) on a `555` size mismatch or a tamper
    /// (HMAC failure) detected during decryption.
    pub async fn download(&mut self, remote_path: &str, local_path: &Path) -> Result<()> {
        let enc_path = self.encrypt_path(remote_path)?;
        let reply = self.command(&format!("RETR {enc_path}")).await?;
        if reply.code == 555 {
            bail!("file size changed on server");
        }
        if reply.code != 150 {
            bail!("RETR rejected: {reply}");
        }
        let blob = read_frame(&mut self.reader).await?;
        let _final_reply = self.read_reply().await?;

        if blob.len() < 32 {
            bail!("envelope too short");
        }
        let (iv_ct, tag) = blob.split_at(blob.len() - 32);
        let plaintext = self.cipher.decrypt_pair(iv_ct, tag).map_err(|_| anyhow!("File has been altered"))?;
        tokio::fs::write(local_path, plaintext).await?;
        Ok(())
    }

    /// Lists the current directory, returning decrypted filenames.
    pub async fn list(&mut self) -> Result<Vec<String>> {
        let reply = self.command("LIST").await?;
        if reply.code != 150 {
            bail!("LIST rejected: {reply}");
        }
        let body = read_frame(&mut self.reader).await?;
        let _final_reply = self.read_reply().await?;
        let text = String::from_utf8_lossy(&body);
        Ok(text
            .split("\r\n")
            .filter(|line| !line.is_empty())
            .map(|line| decrypt_path(&self.cipher, line))
            .collect())
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let enc_from = self.encrypt_path(from)?;
        let reply = self.command(&format!("RNFR {enc_from}")).await?;
        if reply.code != 350 {
            bail!("RNFR rejected: {reply}");
        }
        let enc_to = self.encrypt_path(to)?;
        let reply = self.command(&format!("RNTO {enc_to}")).await?;
        if !reply.is_positive() {
            bail!("RNTO rejected: {reply}");
        }
        Ok(())
    }

    pub async fn size(&mut self, remote_path: &str) -> Result<u64> {
        let enc_path = self.encrypt_path(remote_path)?;
        let reply = self.command(&format!("SIZE {enc_path}")).await?;
        if reply.code != 213 {
            bail!("SIZE rejected: {reply}");
        }
        reply.message.trim().parse().map_err(|e| anyhow!("invalid SIZE reply: {e}"))
    }

    pub async fn delete(&mut self, remote_path: &str) -> Result<()> {
        let enc_path = self.encrypt_path(remote_path)?;
        let reply = self.command(&format!("DELE {enc_path}")).await?;
        if !reply.is_positive() {
            bail!("DELE rejected: {reply}");
        }
        Ok(())
    }

    pub async fn mkdir(&mut self, remote_path: &str) -> Result<()> {
        let enc_path = self.encrypt_path(remote_path)?;
        let reply = self.command(&format!("MKD {enc_path}")).await?;
        if reply.code != 257 {
            bail!("MKD rejected: {reply}");
        }
        Ok(())
    }

    pub async fn rmdir(&mut self, remote_path: &str) -> Result<()> {
        let enc_path = self.encrypt_path(remote_path)?;
        let reply = self.command(&format!("RMD {enc_path}")).await?;
        if !reply.is_positive() {
            bail!("RMD rejected: {reply}");
        }
        Ok(())
    }

    pub async fn cwd(&mut self, remote_path: &str) -> Result<()> {
        let enc_path = self.encrypt_path(remote_path)?;
        let reply = self.command(&format!("CWD {enc_path}")).await?;
        if !reply.is_positive() {
            bail!("CWD rejected: {reply}");
        }
        Ok(())
    }

    pub async fn pwd(&mut self) -> Result<String> {
        let reply = self.command("PWD").await?;
        if reply.code != 257 {
            bail!("PWD rejected: {reply}");
        }
        let enc = reply.message.split('"').nth(1).ok_or_else(|| anyhow!("malformed PWD reply"))?;
        Ok(decrypt_path(&self.cipher, enc))
    }

    pub async fn quit(&mut self) -> Result<()> {
        let _ = self.command("QUIT").await;
        Ok(())
    }

    /// Sends a raw command line and returns the reply, bypassing the
    /// higher-level wrappers above. Exposed for protocol-sequencing tests.
    #[doc(hidden)]
    pub async fn command_for_test(&mut self, line: &str) -> Result<Reply> {
        self.command(line).await
    }
}
