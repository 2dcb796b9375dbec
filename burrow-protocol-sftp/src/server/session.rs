use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use burrow_common::{Secret, SessionId};
use russh::server::{Auth, Msg, Session};
use russh::{Channel, ChannelId};
use tracing::*;
use uuid::Uuid;

use crate::sftp::{PathSandbox, SftpSession};

pub const SFTP_SUBSYSTEM: &str = "sftp";

/// State shared by every connection.
#[derive(Debug)]
pub struct ServerContext {
    pub sandbox: Arc<PathSandbox>,
    pub username: String,
    pub password: Secret<String>,
}

impl ServerContext {
    fn credentials_match(&self, username: &str, password: &Secret<String>) -> bool {
        username == self.username && password.expose_secret() == self.password.expose_secret()
    }
}

/// One SSH connection.
pub struct ServerSession {
    pub id: SessionId,
    remote_address: Option<SocketAddr>,
    username: Option<String>,
    context: Arc<ServerContext>,
    pending_channels: HashMap<ChannelId, Channel<Msg>>,
}

impl ServerSession {
    pub fn new(remote_address: Option<SocketAddr>, context: Arc<ServerContext>) -> Self {
        let this = Self {
            id: Uuid::new_v4(),
            remote_address,
            username: None,
            context,
            pending_channels: HashMap::new(),
        };
        this.make_logging_span()
            .in_scope(|| info!("New connection"));
        this
    }

    pub fn make_logging_span(&self) -> tracing::Span {
        let client_ip = self
            .remote_address
            .map(|addr| addr.ip().to_string())
            .unwrap_or_default();
        match self.username {
            Some(ref username) => {
                info_span!("SSH", session=%self.id, session_username=%username, %client_ip)
            }
            None => info_span!("SSH", session=%self.id, %client_ip),
        }
    }

    pub async fn _auth_password(
        &mut self,
        ssh_username: Secret<String>,
        password: Secret<String>,
    ) -> Auth {
        let username = ssh_username.expose_secret();
        if self.context.credentials_match(username, &password) {
            info!(%username, "Password auth accepted");
            self.username = Some(username.clone());
            Auth::Accept
        } else {
            warn!(%username, "Password auth rejected");
            Auth::reject()
        }
    }

    pub async fn _channel_open_session(&mut self, channel: Channel<Msg>) -> Result<bool> {
        if self.username.is_none() {
            warn!("Session channel requested before authentication");
            return Ok(false);
        }
        debug!(channel=%channel.id(), "Opened session channel");
        self.pending_channels.insert(channel.id(), channel);
        Ok(true)
    }

    pub async fn _channel_subsystem_request(
        &mut self,
        channel_id: ChannelId,
        name: String,
        session: &mut Session,
    ) -> Result<()> {
        let channel = match (name.as_str(), self.username.clone()) {
            (SFTP_SUBSYSTEM, Some(username)) => self
                .pending_channels
                .remove(&channel_id)
                .map(|channel| (channel, username)),
            _ => None,
        };

        let Some((channel, username)) = channel else {
            warn!(channel=%channel_id, subsystem=%name, "Refused subsystem request");
            session.channel_failure(channel_id)?;
            return Ok(());
        };

        session.channel_success(channel_id)?;
        info!(channel=%channel_id, "Starting SFTP session");

        let mut sftp = SftpSession::new(
            self.id,
            username,
            self.remote_address,
            self.context.sandbox.clone(),
        );
        let released = sftp.subscribe_release();
        let span = sftp.make_logging_span();
        tokio::spawn(
            async move {
                if let Ok(count) = released.await {
                    info!(channel=%channel_id, released_handles = count, "SFTP session ended");
                }
            }
            .instrument(span),
        );
        russh_sftp::server::run(channel.into_stream(), sftp).await;
        Ok(())
    }

    pub async fn _channel_close(&mut self, channel_id: ChannelId) {
        debug!(channel=%channel_id, "Channel closed");
        self.pending_channels.remove(&channel_id);
    }

    pub fn _disconnect(&mut self) {
        self.pending_channels.clear();
        info!("Closed connection");
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        debug!("Dropped");
    }
}
