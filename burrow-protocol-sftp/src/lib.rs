mod keys;
mod server;
pub mod sftp;
use std::fmt::Debug;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use burrow_common::BurrowConfig;
pub use keys::*;
pub use server::{run_server, ServerContext, SFTP_SUBSYSTEM};
use sftp::PathSandbox;
use tracing::*;

pub static PROTOCOL_NAME: &str = "SFTP";

#[derive(Clone)]
pub struct SftpProtocolServer {
    context: Arc<ServerContext>,
    keys_path: PathBuf,
    inactivity_timeout: Duration,
}

impl SftpProtocolServer {
    /// Prepares the served root and host keys.
    pub fn new(config: &BurrowConfig) -> Result<Self> {
        let root = config
            .prepare_served_root()
            .context("Failed to prepare the served root")?;
        info!(?root, "Serving directory");

        let keys_path = config.keys_path();
        generate_host_keys(&keys_path)?;

        Ok(SftpProtocolServer {
            context: Arc::new(ServerContext {
                sandbox: Arc::new(PathSandbox::new(root)),
                username: config.store.user.clone(),
                password: config.store.pass.clone(),
            }),
            keys_path,
            inactivity_timeout: config.store.inactivity_timeout,
        })
    }

    pub fn root(&self) -> &std::path::Path {
        self.context.sandbox.root()
    }

    pub async fn run(self, address: SocketAddr) -> Result<()> {
        run_server(
            self.context,
            &self.keys_path,
            self.inactivity_timeout,
            address,
        )
        .await
    }
}

impl Debug for SftpProtocolServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SftpProtocolServer")
    }
}
