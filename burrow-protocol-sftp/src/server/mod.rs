mod russh_handler;
mod session;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
pub use russh_handler::ServerHandler;
use russh::server::Server;
pub use session::{ServerContext, ServerSession, SFTP_SUBSYSTEM};
use tokio::net::TcpListener;
use tracing::*;

use crate::keys::load_host_keys;

pub async fn run_server(
    context: Arc<ServerContext>,
    keys_path: &std::path::Path,
    inactivity_timeout: Duration,
    address: SocketAddr,
) -> Result<()> {
    let config = russh::server::Config {
        auth_rejection_time: Duration::from_secs(1),
        auth_rejection_time_initial: Some(Duration::from_secs(0)),
        inactivity_timeout: Some(inactivity_timeout),
        keys: load_host_keys(keys_path).context("Failed to load host keys")?,
        ..Default::default()
    };
    let config = Arc::new(config);

    let socket = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;
    info!(?address, "Listening");

    let mut server = SftpServer { context };
    server
        .run_on_socket(config, &socket)
        .await
        .context("SSH server failed")?;
    Ok(())
}

struct SftpServer {
    context: Arc<ServerContext>,
}

impl russh::server::Server for SftpServer {
    type Handler = ServerHandler;

    fn new_client(&mut self, peer_addr: Option<SocketAddr>) -> Self::Handler {
        ServerHandler::new(ServerSession::new(peer_addr, self.context.clone()))
    }

    fn handle_session_error(&mut self, error: <Self::Handler as russh::server::Handler>::Error) {
        error!(?error, "Session failed");
    }
}
