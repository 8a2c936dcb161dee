//! The server: TCP accept loop, connection accounting, and the
//! per-connection session actor.

pub mod session;

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{IDLE_TIMEOUT_SECS, MAX_CONNECTIONS, MAX_CONNECTIONS_PER_IP};
use crate::db::AccountStore;

/// Server-wide configuration, populated from CLI flags in `bin/server.rs`.
pub struct ServerConfig {
    pub root: PathBuf,
    pub bind_addr: String,
    pub max_cons: usize,
    pub max_cons_per_ip: usize,
    pub idle_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            bind_addr: crate::config::DEFAULT_BIND_ADDR.to_string(),
            max_cons: MAX_CONNECTIONS,
            max_cons_per_ip: MAX_CONNECTIONS_PER_IP,
            idle_timeout: Duration::from_secs(IDLE_TIMEOUT_SECS),
        }
    }
}

/// Enforces `max_cons` and `max_cons_per_ip`, releasing its slot on `Drop`
/// (covers both clean teardown and a panicking session task).
struct ConnectionLimiterInner {
    total: usize,
    max_total: usize,
    per_ip: HashMap<IpAddr, usize>,
    max_per_ip: usize,
}

pub struct ConnectionLimiter {
    inner: Mutex<ConnectionLimiterInner>,
}

pub struct ConnectionGuard {
    limiter: Arc<ConnectionLimiter>,
    ip: IpAddr,
}

impl ConnectionLimiter {
    pub fn new(max_total: usize, max_per_ip: usize) -> Arc<Self> {
        Arc::new(Self { inner: Mutex::new(ConnectionLimiterInner { total: 0, max_total, per_ip: HashMap::new(), max_per_ip }) })
    }

    /// Tries to admit a connection from `ip`. Returns `None` if either cap
    /// is already at its limit.
    fn try_admit(self: &Arc<Self>, ip: IpAddr) -> Option<ConnectionGuard> {
        let mut inner = self.inner.lock().unwrap();
        if inner.total >= inner.max_total {
            return None;
        }
        let max_per_ip = inner.max_per_ip;
        let count = inner.per_ip.entry(ip).or_insert(0);
        if *count >= max_per_ip {
            return None;
        }
        *count += 1;
        inner.total += 1;
        Some(ConnectionGuard { limiter: Arc::clone(self), ip })
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut inner = self.limiter.inner.lock().unwrap();
        inner.total = inner.total.saturating_sub(1);
        if let Some(count) = inner.per_ip.get_mut(&self.ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                inner.per_ip.remove(&self.ip);
            }
        }
    }
}

/// Binds `config.bind_addr` and runs the accept loop until an I/O error
/// occurs.
pub async fn run(config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "listening");
    serve(listener, config).await
}

/// Runs the accept loop over an already-bound listener. Split out from
/// [`run`] so tests can bind an ephemeral port (`127.0.0.1:0`) and read back
/// the assigned address before serving.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> Result<()> {
    std::fs::create_dir_all(&config.root)?;
    let accounts = Arc::new(AccountStore::open(config.root.join(crate::config::ACCOUNTS_DB_NAME))?);
    let limiter = ConnectionLimiter::new(config.max_cons, config.max_cons_per_ip);
    let root = Arc::new(config.root.clone());
    let idle_timeout = config.idle_timeout;

    loop {
        let (socket, peer): (_, SocketAddr) = listener.accept().await?;
        let Some(guard) = limiter.try_admit(peer.ip()) else {
            warn!(%peer, "connection rejected: over capacity");
            drop(socket);
            continue;
        };

        let accounts = Arc::clone(&accounts);
        let root = Arc::clone(&root);
        tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = session::Session::new(socket, peer, accounts, (*root).clone(), idle_timeout).run().await {
                warn!(%peer, error = %e, "session ended with error");
            }
        });
    }
}
