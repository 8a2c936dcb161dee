//! Drives a real client against a real server over a loopback socket bound
//! to an OS-assigned port.

use std::time::Duration;

use cryptftp::client::Client;
use cryptftp::db::AccountStore;
use cryptftp::server::{self, ServerConfig};
use tokio::net::TcpListener;

async fn spawn_server() -> (String, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let config = ServerConfig { root: dir.path().to_path_buf(), idle_timeout: Duration::from_secs(5), ..ServerConfig::default() };
    tokio::spawn(async move {
        let _ = server::serve(listener, config).await;
    });
    (addr, dir)
}

#[tokio::test]
async fn round_trip_register_upload_download() {
    let (addr, _dir) = spawn_server().await;
    let mut client = Client::connect(&addr, b"correct-horse-battery-staple").await.unwrap();
    client.register("alice").await.unwrap();

    let src = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(src.path(), b"hello world").unwrap();
    client.upload("/greeting.txt", src.path()).await.unwrap();

    let dst = tempfile::NamedTempFile::new().unwrap();
    client.download("/greeting.txt", dst.path()).await.unwrap();
    assert_eq!(std::fs::read(dst.path()).unwrap(), b"hello world");

    let entries = client.list().await.unwrap();
    assert_eq!(entries, vec!["greeting.txt".to_string()]);
    client.quit().await.unwrap();
}

#[tokio::test]
async fn same_filename_produces_identical_wire_path() {
    let (addr, _dir) = spawn_server().await;
    let mut a = Client::connect(&addr, b"same-secret-same-secret").await.unwrap();
    a.register("bob").await.unwrap();
    let src = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(src.path(), b"one").unwrap();
    a.upload("/notes.txt", src.path()).await.unwrap();
    a.quit().await.unwrap();

    // Logging in again and listing must show the same encrypted segment,
    // since filename encryption under a fixed secret is deterministic.
    let mut b = Client::connect(&addr, b"same-secret-same-secret").await.unwrap();
    b.login("bob").await.unwrap();
    let entries = b.list().await.unwrap();
    assert_eq!(entries, vec!["notes.txt".to_string()]);
    b.quit().await.unwrap();
}

#[tokio::test]
async fn tampered_body_is_rejected_on_download() {
    let (addr, dir) = spawn_server().await;
    let mut client = Client::connect(&addr, b"tamper-test-secret-val").await.unwrap();
    client.register("carol").await.unwrap();

    let src = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(src.path(), b"sensitive payload").unwrap();
    client.upload("/secret.bin", src.path()).await.unwrap();

    // Flip a byte in the one stored ciphertext file on disk.
    let stored = find_stored_file(dir.path());
    let mut bytes = std::fs::read(&stored).unwrap();
    bytes[0] ^= 0xFF;
    std::fs::write(&stored, bytes).unwrap();

    let dst = tempfile::NamedTempFile::new().unwrap();
    let err = client.download("/secret.bin", dst.path()).await.unwrap_err();
    assert!(err.to_string().contains("altered") || err.to_string().contains("size"));
    client.quit().await.unwrap();
}

#[tokio::test]
async fn truncated_file_is_flagged_on_next_login_and_retr() {
    let (addr, dir) = spawn_server().await;
    let mut client = Client::connect(&addr, b"truncate-test-secret-v").await.unwrap();
    client.register("dave").await.unwrap();

    let src = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(src.path(), b"0123456789").unwrap();
    client.upload("/data.bin", src.path()).await.unwrap();
    client.quit().await.unwrap();

    let stored = find_stored_file(dir.path());
    let bytes = std::fs::read(&stored).unwrap();
    std::fs::write(&stored, &bytes[..bytes.len() / 2]).unwrap();

    let mut relogin = Client::connect(&addr, b"truncate-test-secret-v").await.unwrap();
    let reply = relogin.login("dave").await.unwrap();
    assert_eq!(reply.code, 556);

    let dst = tempfile::NamedTempFile::new().unwrap();
    let err = relogin.download("/data.bin", dst.path()).await.unwrap_err();
    assert!(err.to_string().contains("size"));
    relogin.quit().await.unwrap();
}

#[tokio::test]
async fn unknown_user_login_is_rejected() {
    let (addr, _dir) = spawn_server().await;
    let mut client = Client::connect(&addr, b"whoever-secret-value-xy").await.unwrap();
    let err = client.login("nobody-registered").await.unwrap_err();
    assert!(err.to_string().contains("incorrect"));
}

#[tokio::test]
async fn write_is_denied_once_the_w_bit_is_revoked() {
    let (addr, dir) = spawn_server().await;
    let mut client = Client::connect(&addr, b"perm-test-secret-value").await.unwrap();
    client.register("finn").await.unwrap();
    client.quit().await.unwrap();

    let accounts = AccountStore::open(dir.path().join("accounts.db")).unwrap();
    accounts.set_perm("finn", "lre").unwrap();

    let mut relogin = Client::connect(&addr, b"perm-test-secret-value").await.unwrap();
    relogin.login("finn").await.unwrap();

    let src = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(src.path(), b"should not be written").unwrap();
    let err = relogin.upload("/blocked.txt", src.path()).await.unwrap_err();
    assert!(err.to_string().contains("Permission denied"));
    relogin.quit().await.unwrap();
}

#[tokio::test]
async fn tag_without_preceding_stor_is_rejected() {
    let (addr, _dir) = spawn_server().await;
    let mut client = Client::connect(&addr, b"sequence-test-secret-v").await.unwrap();
    client.register("erin").await.unwrap();

    let reply = client.command_for_test("TAG deadbeef").await.unwrap();
    assert_eq!(reply.code, 503);
}

/// Finds the single regular file the server wrote under `root`, skipping the
/// account and per-home metadata databases.
fn find_stored_file(root: &std::path::Path) -> std::path::PathBuf {
    for entry in walk(root) {
        let name = entry.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if entry.is_file() && !name.ends_with(".db") {
            return entry;
        }
    }
    panic!("no stored file found under {}", root.display());
}

fn walk(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        if path.is_dir() {
            out.extend(walk(&path));
        } else {
            out.push(path);
        }
    }
    out
}
