use std::fmt::Debug;

use burrow_common::{Secret, SessionId};
use russh::server::{Auth, Msg, Session};
use russh::{Channel, ChannelId};
use tracing::*;

use super::session::ServerSession;

pub struct ServerHandler {
    pub id: SessionId,
    pub session: ServerSession,
}

impl ServerHandler {
    pub fn new(session: ServerSession) -> Self {
        Self {
            id: session.id,
            session,
        }
    }
}

impl russh::server::Handler for ServerHandler {
    type Error = anyhow::Error;

    async fn auth_password(&mut self, user: &str, password: &str) -> Result<Auth, Self::Error> {
        let user = Secret::new(user.to_string());
        let password = Secret::new(password.to_string());
        let span = self.session.make_logging_span();
        Ok(self
            .session
            ._auth_password(user, password)
            .instrument(span)
            .await)
    }

    async fn channel_open_session(
        &mut self,
        channel: Channel<Msg>,
        _session: &mut Session,
    ) -> Result<bool, Self::Error> {
        let span = self.session.make_logging_span();
        self.session
            ._channel_open_session(channel)
            .instrument(span)
            .await
    }

    async fn subsystem_request(
        &mut self,
        channel: ChannelId,
        name: &str,
        session: &mut Session,
    ) -> Result<(), Self::Error> {
        let name = name.to_string();
        let span = self.session.make_logging_span();
        self.session
            ._channel_subsystem_request(channel, name, session)
            .instrument(span)
            .await
    }

    async fn channel_eof(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let span = self.session.make_logging_span();
        span.in_scope(|| debug!(%channel, "Channel EOF"));
        Ok(())
    }

    async fn channel_close(
        &mut self,
        channel: ChannelId,
        _session: &mut Session,
    ) -> Result<(), Self::Error> {
        let span = self.session.make_logging_span();
        self.session._channel_close(channel).instrument(span).await;
        Ok(())
    }
}

impl Drop for ServerHandler {
    fn drop(&mut self) {
        let span = self.session.make_logging_span();
        let _enter = span.enter();
        self.session._disconnect();
    }
}

impl Debug for ServerHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServerHandler {{ id: {} }}", self.id)
    }
}
