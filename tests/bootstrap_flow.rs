//! Integration tests for connection bootstrap and the exit sequence.

mod common;

use async_trait::async_trait;
use common::{start_bot, test_config, wait_for};
use slirc_bot::network::Engine;
use slirc_bot::{
    ConnectionState, ExitReason, Handler, HandlerRegistry, HookContext, HookResult, LockFile,
    TomlConfigStore, TypedEvent,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Hangs in every hook it gets for a `!slow` message.
struct Sluggish;

impl Sluggish {
    async fn linger(ev: &TypedEvent) -> HookResult {
        if ev.body == "!slow" {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for Sluggish {
    fn name(&self) -> &str {
        "sluggish"
    }
    fn commands(&self) -> Vec<String> {
        vec!["slow".to_string()]
    }
    async fn on_command(&self, _c: &str, _ctx: &HookContext, ev: &TypedEvent) -> HookResult {
        Self::linger(ev).await
    }
    async fn on_raw(&self, _ctx: &HookContext, ev: &TypedEvent) -> HookResult {
        Self::linger(ev).await
    }
    async fn on_privmsg(&self, _ctx: &HookContext, ev: &TypedEvent) -> HookResult {
        Self::linger(ev).await
    }
}

#[tokio::test]
async fn registration_then_autojoin_after_motd() {
    let (mut server, bot) = start_bot(test_config(""), HandlerRegistry::new());

    assert_eq!(server.recv().await.unwrap(), "NICK bot");
    assert_eq!(server.recv().await.unwrap(), "USER slirc 0 * :slirc-bot");

    server.send(":irc.test 001 bot :Welcome").await;
    server.send(":irc.test 005 bot PREFIX=(ov)@+ NETWORK=TestNet :are supported").await;
    server.send(":irc.test 375 bot :- MOTD -").await;

    // Nothing is joined before the MOTD ends.
    assert!(server.recv_timeout(Duration::from_millis(200)).await.is_err());
    assert_eq!(
        bot.state.connection_state().await.unwrap(),
        ConnectionState::AwaitingMotd
    );

    server.send(":irc.test 376 bot :End of /MOTD command.").await;
    assert_eq!(server.recv().await.unwrap(), "MODE bot +B");
    assert_eq!(server.recv().await.unwrap(), "JOIN #test");

    // A second end-of-MOTD (from a later MOTD command) changes nothing.
    server.send(":irc.test 376 bot :End of /MOTD command.").await;
    assert!(server.recv_timeout(Duration::from_millis(200)).await.is_err());
    assert_eq!(bot.state.connection_state().await.unwrap(), ConnectionState::Ready);

    server.close();
    assert_eq!(bot.finished().await, ExitReason::ServerClosed);
}

#[tokio::test]
async fn missing_motd_still_completes() {
    let (mut server, bot) = start_bot(test_config(r#"bot_mode = """#), HandlerRegistry::new());
    server.recv_until(|l| l.starts_with("USER ")).await.unwrap();

    server.send(":irc.test 001 bot :Welcome").await;
    server.send(":irc.test 422 bot :MOTD File is missing").await;
    // Bot mode is disabled, so JOIN comes first.
    assert_eq!(server.recv().await.unwrap(), "JOIN #test");
    assert_eq!(bot.state.connection_state().await.unwrap(), ConnectionState::Ready);

    server.close();
    bot.finished().await;
}

#[tokio::test]
async fn server_password_is_sent_first() {
    let mut config = test_config("");
    config.server.password = Some("hunter2".into());
    let (mut server, bot) = start_bot(config, HandlerRegistry::new());

    assert_eq!(server.recv().await.unwrap(), "PASS hunter2");
    assert_eq!(server.recv().await.unwrap(), "NICK bot");

    server.close();
    bot.finished().await;
}

#[tokio::test]
async fn ping_is_answered_directly() {
    let (mut server, bot) = start_bot(test_config(""), HandlerRegistry::new());
    server.recv_until(|l| l.starts_with("USER ")).await.unwrap();

    server.send("PING :irc.test").await;
    assert_eq!(server.recv().await.unwrap(), "PONG :irc.test");

    server.close();
    bot.finished().await;
}

#[tokio::test]
async fn self_join_triggers_channel_sync() {
    let (mut server, bot) = start_bot(test_config(""), HandlerRegistry::new());
    server.welcome("bot").await.unwrap();

    server.send(":bot!slirc@bot.host JOIN :#test").await;
    let expected = ["WHO #test", "MODE #test", "MODE #test b", "MODE #test e", "MODE #test I"];
    for line in expected {
        assert_eq!(server.recv().await.unwrap(), line);
    }
    assert_eq!(bot.state.channels().await.unwrap(), vec!["#test"]);

    server.close();
    bot.finished().await;
}

#[tokio::test]
async fn exit_sequence_saves_nick_and_releases_lock() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("bot.toml");
    let lock_path = dir.path().join(".lock");

    let config = test_config("");
    std::fs::write(&config_path, config.to_toml().unwrap()).unwrap();
    let lock = LockFile::acquire(&lock_path).unwrap();

    let engine = Engine::new(config, HandlerRegistry::new())
        .with_store(Arc::new(TomlConfigStore::new(&config_path)))
        .with_lock(lock);
    let (mut server, bot) = common::server::start_engine(engine);

    server.recv_until(|l| l.starts_with("USER ")).await.unwrap();
    server.send(":irc.test 001 bot :Welcome").await;
    server.send(":bot!slirc@host NICK :renamed").await;
    let state = bot.state.clone();
    let renamed = wait_for(|| {
        let state = state.clone();
        async move { state.bot_nick().await.unwrap() == "renamed" }
    })
    .await;
    assert!(renamed);

    server.close();
    assert_eq!(bot.finished().await, ExitReason::ServerClosed);

    let saved = TomlConfigStore::new(&config_path);
    let saved = slirc_bot::ConfigStore::load(&saved).await.unwrap();
    assert_eq!(saved.identity.nick, "renamed");
    assert!(dir.path().join("bot.toml.bak").exists());
    assert!(!lock_path.exists());
    assert_eq!(state.connection_state().await.unwrap(), ConnectionState::Terminated);
}

#[tokio::test]
async fn busy_workers_share_one_exit_deadline() {
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Sluggish));
    let (mut server, bot) = start_bot(test_config(""), registry);
    server.welcome("bot").await.unwrap();

    // One message per worker; each would hold its worker for three hook
    // timeouts.
    for _ in 0..3 {
        server.send(":alice!a@alice.host PRIVMSG #test :!slow").await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let closed = Instant::now();
    server.close();
    assert_eq!(bot.finished().await, ExitReason::ServerClosed);
    let took = closed.elapsed();
    assert!(took < Duration::from_secs(2), "exit took {took:?}");
}
