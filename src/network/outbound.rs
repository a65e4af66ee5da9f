//! Outbound line sender.
//!
//! Every component that writes to the server holds a clone of [`Outbound`].
//! Lines go through a bounded channel to the single writer task, which owns
//! the write half of the socket.

use crate::error::EngineError;
use crate::proto::ctcp;
use tokio::sync::mpsc;
use tracing::trace;

/// Capacity of the outbound channel.
pub const OUTBOUND_CAPACITY: usize = 512;

#[derive(Debug, Clone)]
pub struct Outbound {
    tx: mpsc::Sender<String>,
}

impl Outbound {
    /// Create a sender and the receiver the writer task drains.
    pub fn channel() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queue one raw line (without line terminator).
    pub async fn send_raw(&self, line: impl Into<String>) -> Result<(), EngineError> {
        let line = line.into();
        trace!(line = %line, "Outbound");
        self.tx
            .send(line)
            .await
            .map_err(|_| EngineError::OutboundClosed)
    }

    pub async fn send_all<I>(&self, lines: I) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = String>,
    {
        for line in lines {
            self.send_raw(line).await?;
        }
        Ok(())
    }

    pub async fn privmsg(&self, target: &str, text: &str) -> Result<(), EngineError> {
        self.send_raw(format!("PRIVMSG {target} :{text}")).await
    }

    pub async fn notice(&self, target: &str, text: &str) -> Result<(), EngineError> {
        self.send_raw(format!("NOTICE {target} :{text}")).await
    }

    /// Answer a CTCP request (sent as a NOTICE).
    pub async fn ctcp_reply(
        &self,
        target: &str,
        command: &str,
        params: Option<&str>,
    ) -> Result<(), EngineError> {
        self.notice(target, &ctcp::frame(command, params)).await
    }

    pub async fn part(&self, channel: &str, reason: Option<&str>) -> Result<(), EngineError> {
        match reason {
            Some(reason) => self.send_raw(format!("PART {channel} :{reason}")).await,
            None => self.send_raw(format!("PART {channel}")).await,
        }
    }

    pub async fn pong(&self, token: &str) -> Result<(), EngineError> {
        self.send_raw(format!("PONG {token}")).await
    }

    pub async fn quit(&self, message: &str) -> Result<(), EngineError> {
        self.send_raw(format!("QUIT :{message}")).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Registration burst: optional PASS, then NICK and USER.
pub fn registration_lines(
    password: Option<&str>,
    nick: &str,
    username: &str,
    realname: &str,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    if let Some(password) = password {
        lines.push(format!("PASS {password}"));
    }
    lines.push(format!("NICK {nick}"));
    lines.push(format!("USER {username} 0 * :{realname}"));
    lines
}

/// Queries sent after the bot joins a channel.
pub fn channel_sync_lines(channel: &str) -> Vec<String> {
    vec![
        format!("WHO {channel}"),
        format!("MODE {channel}"),
        format!("MODE {channel} b"),
        format!("MODE {channel} e"),
        format!("MODE {channel} I"),
    ]
}
