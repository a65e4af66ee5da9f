//! Fake IRC server.
//!
//! The engine runs over one end of a `tokio::io::duplex` pipe; the test
//! drives the other end line by line.

#![allow(dead_code)]

use slirc_bot::{BotConfig, Engine, EngineError, ExitReason, HandlerRegistry, StateHandle};
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Config with housekeeping disabled so tests see only traffic they cause.
pub fn test_config(extra: &str) -> BotConfig {
    let toml = format!(
        r##"
channels = ["#test"]
{extra}

[server]
address = "irc.test"

[identity]
nick = "bot"

[pipeline]
workers = 3
message_timeout_secs = 1

[schedule]
keepalive_secs = 0
autosave_secs = 0
"##
    );
    BotConfig::parse(&toml).expect("test config parses")
}

/// The server end of the pipe.
pub struct FakeServer {
    reader: BufReader<ReadHalf<DuplexStream>>,
    writer: WriteHalf<DuplexStream>,
}

impl FakeServer {
    /// Send one line (CRLF is appended).
    pub async fn send(&mut self, line: &str) {
        self.writer
            .write_all(format!("{line}\r\n").as_bytes())
            .await
            .expect("write to bot");
    }

    /// Next line from the bot, without the terminator.
    pub async fn recv(&mut self) -> anyhow::Result<String> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<String> {
        let mut line = String::new();
        let n = timeout(dur, self.reader.read_line(&mut line)).await??;
        if n == 0 {
            anyhow::bail!("bot closed the connection");
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    /// Read lines until one satisfies `predicate`; returns everything read.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<String>>
    where
        F: FnMut(&str) -> bool,
    {
        let mut lines = Vec::new();
        loop {
            let line = self.recv().await?;
            let done = predicate(&line);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    /// Read until `expected` shows up.
    pub async fn expect(&mut self, expected: &str) -> anyhow::Result<Vec<String>> {
        self.recv_until(|line| line == expected).await
    }

    /// Collect whatever arrives within `dur`.
    pub async fn drain(&mut self, dur: Duration) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = self.recv_timeout(dur).await {
            lines.push(line);
        }
        lines
    }

    /// Play the registration burst and wait for the channel JOIN.
    pub async fn welcome(&mut self, nick: &str) -> anyhow::Result<()> {
        self.expect(&format!("NICK {nick}")).await?;
        self.recv_until(|line| line.starts_with("USER ")).await?;
        self.send(&format!(":irc.test 001 {nick} :Welcome to the test network"))
            .await;
        self.send(&format!(":irc.test 004 {nick} irc.test fakeircd-1 io biklmnopstv"))
            .await;
        self.send(&format!(
            ":irc.test 005 {nick} PREFIX=(ov)@+ CHANTYPES=# CHANMODES=beI,k,l,imnpst NETWORK=TestNet :are supported by this server"
        ))
        .await;
        self.send(&format!(":irc.test 375 {nick} :- irc.test Message of the day -"))
            .await;
        self.send(&format!(":irc.test 376 {nick} :End of /MOTD command."))
            .await;
        self.recv_until(|line| line.starts_with("JOIN ")).await?;
        Ok(())
    }

    /// Close the connection from the server side.
    pub fn close(self) {
        drop(self);
    }
}

/// An engine running against a [`FakeServer`].
pub struct RunningBot {
    pub state: StateHandle,
    pub task: JoinHandle<Result<ExitReason, EngineError>>,
}

impl RunningBot {
    /// Wait for the engine to finish its exit sequence.
    pub async fn finished(self) -> ExitReason {
        timeout(Duration::from_secs(10), self.task)
            .await
            .expect("engine exits")
            .expect("engine task")
            .expect("engine result")
    }
}

/// Start an engine and hand back the server end of its connection.
pub fn start_bot(config: BotConfig, registry: HandlerRegistry) -> (FakeServer, RunningBot) {
    start_engine(Engine::new(config, registry))
}

pub fn start_engine(engine: Engine) -> (FakeServer, RunningBot) {
    let (bot_end, server_end) = tokio::io::duplex(64 * 1024);
    let state = engine.state();
    let task = tokio::spawn(engine.run_with_stream(bot_end));

    let (read_half, write_half) = tokio::io::split(server_end);
    (
        FakeServer {
            reader: BufReader::new(read_half),
            writer: write_half,
        },
        RunningBot { state, task },
    )
}

/// Poll `check` until it returns true or two seconds pass.
pub async fn wait_for<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
