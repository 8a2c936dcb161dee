//! `cryptftpd` - the encrypted-FTP server binary.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use cryptftp::config::{DEFAULT_BIND_ADDR, IDLE_TIMEOUT_SECS, MAX_CONNECTIONS, MAX_CONNECTIONS_PER_IP};
use cryptftp::server::{self, ServerConfig};

/// Serves encrypted file storage over an extended FTP control protocol.
#[derive(Parser)]
#[command(name = "cryptftpd")]
#[command(version)]
pub struct Args {
    /// Directory under which per-user home directories and the account
    /// database are stored.
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// Address to bind the control socket to.
    #[arg(short, long, default_value = DEFAULT_BIND_ADDR)]
    bind: String,

    /// Maximum simultaneous connections.
    #[arg(long, default_value_t = MAX_CONNECTIONS)]
    max_connections: usize,

    /// Maximum simultaneous connections from a single remote IP.
    #[arg(long, default_value_t = MAX_CONNECTIONS_PER_IP)]
    max_connections_per_ip: usize,

    /// Idle timeout in seconds before an inactive connection is closed.
    #[arg(long, default_value_t = IDLE_TIMEOUT_SECS)]
    idle_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive("cryptftpd=info".parse()?))
        .init();

    let args = Args::parse();
    let config = ServerConfig {
        root: args.root,
        bind_addr: args.bind,
        max_cons: args.max_connections,
        max_cons_per_ip: args.max_connections_per_ip,
        idle_timeout: Duration::from_secs(args.idle_timeout_secs),
    };
    server::run(config).await
}
