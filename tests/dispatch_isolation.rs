//! Integration tests for hook dispatch: failure isolation, the apology,
//! per-message timeouts and PING handling.

mod common;

use async_trait::async_trait;
use common::{start_bot, test_config, wait_for};
use parking_lot::Mutex;
use slirc_bot::hooks::APOLOGY;
use slirc_bot::{Handler, HandlerRegistry, HookContext, HookError, HookResult, TypedEvent};
use std::sync::Arc;
use std::time::Duration;

/// Fails every `foo` command.
struct Broken;

#[async_trait]
impl Handler for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    fn commands(&self) -> Vec<String> {
        vec!["foo".to_string()]
    }
    async fn on_command(&self, _c: &str, _ctx: &HookContext, _ev: &TypedEvent) -> HookResult {
        Err(HookError::Failed("module exploded".into()))
    }
}

/// Records command invocations and raw lines.
#[derive(Default)]
struct Recorder {
    commands: Mutex<Vec<String>>,
    raw: Mutex<Vec<String>>,
}

#[async_trait]
impl Handler for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }
    fn commands(&self) -> Vec<String> {
        vec!["foo".to_string(), "ping".to_string()]
    }
    async fn on_command(&self, command: &str, ctx: &HookContext, ev: &TypedEvent) -> HookResult {
        self.commands.lock().push(command.to_string());
        if command == "ping" {
            ctx.reply(ev, "pong").await?;
        }
        Ok(())
    }
    async fn on_raw(&self, _ctx: &HookContext, ev: &TypedEvent) -> HookResult {
        self.raw.lock().push(ev.raw.clone());
        Ok(())
    }
}

/// Never finishes the named command.
struct Stuck(&'static str);

#[async_trait]
impl Handler for Stuck {
    fn name(&self) -> &str {
        "stuck"
    }
    fn commands(&self) -> Vec<String> {
        vec![self.0.to_string()]
    }
    async fn on_command(&self, _c: &str, _ctx: &HookContext, _ev: &TypedEvent) -> HookResult {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

#[tokio::test]
async fn failing_command_hook_sends_one_apology() {
    let recorder = Arc::new(Recorder::default());
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Broken));
    registry.register(recorder.clone());

    let (mut server, bot) = start_bot(test_config(""), registry);
    server.welcome("bot").await.unwrap();

    server.send(":alice!a@alice.host PRIVMSG #test :!foo bar").await;
    server
        .expect(&format!("PRIVMSG #test :{APOLOGY}"))
        .await
        .unwrap();
    assert!(server.drain(Duration::from_millis(200)).await.is_empty());
    assert_eq!(*recorder.commands.lock(), vec!["foo"]);

    server.close();
    bot.finished().await;
}

#[tokio::test]
async fn private_command_without_prefix_is_answered_privately() {
    let recorder = Arc::new(Recorder::default());
    let mut registry = HandlerRegistry::new();
    registry.register(recorder.clone());

    let (mut server, bot) = start_bot(test_config(""), registry);
    server.welcome("bot").await.unwrap();

    server.send(":alice!a@alice.host PRIVMSG bot :PING").await;
    server.expect("PRIVMSG alice :pong").await.unwrap();

    // In a channel the prefix is required.
    server.send(":alice!a@alice.host PRIVMSG #test :ping").await;
    assert!(server.drain(Duration::from_millis(200)).await.is_empty());
    assert_eq!(*recorder.commands.lock(), vec!["ping"]);

    server.close();
    bot.finished().await;
}

#[tokio::test]
async fn timed_out_message_frees_its_worker() {
    let recorder = Arc::new(Recorder::default());
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Stuck("slow")));
    registry.register(recorder.clone());

    let mut config = test_config("");
    config.pipeline.workers = 1;
    let (mut server, bot) = start_bot(config, registry);
    server.welcome("bot").await.unwrap();

    server.send(":alice!a@alice.host PRIVMSG #test :!slow").await;
    server.send(":alice!a@alice.host PRIVMSG #test :!ping").await;

    // The only worker is stuck until the one second hook timeout fires,
    // which counts as a failed command.
    let lines = server.recv_until(|l| l == "PRIVMSG #test :pong").await.unwrap();
    assert_eq!(
        lines,
        vec![format!("PRIVMSG #test :{APOLOGY}"), "PRIVMSG #test :pong".to_string()]
    );

    server.close();
    bot.finished().await;
}

#[tokio::test]
async fn stuck_command_hook_does_not_starve_siblings() {
    let recorder = Arc::new(Recorder::default());
    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(Stuck("foo")));
    registry.register(recorder.clone());

    let (mut server, bot) = start_bot(test_config(""), registry);
    server.welcome("bot").await.unwrap();

    server.send(":alice!a@alice.host PRIVMSG #test :!foo").await;
    server
        .expect(&format!("PRIVMSG #test :{APOLOGY}"))
        .await
        .unwrap();
    assert_eq!(*recorder.commands.lock(), vec!["foo"]);
    assert!(
        recorder
            .raw
            .lock()
            .iter()
            .any(|l| l == "alice!a@alice.host PRIVMSG #test :!foo")
    );
    assert!(server.drain(Duration::from_millis(200)).await.is_empty());

    server.close();
    bot.finished().await;
}

#[tokio::test]
async fn server_ping_never_reaches_handlers() {
    let recorder = Arc::new(Recorder::default());
    let mut registry = HandlerRegistry::new();
    registry.register(recorder.clone());

    let (mut server, bot) = start_bot(test_config(""), registry);
    server.recv_until(|l| l.starts_with("USER ")).await.unwrap();

    server.send("PING :irc.test").await;
    assert_eq!(server.recv().await.unwrap(), "PONG :irc.test");
    server.send(":irc.test NOTICE * :marker").await;

    let seen = wait_for(|| {
        let recorder = recorder.clone();
        async move { recorder.raw.lock().iter().any(|l| l.contains("marker")) }
    })
    .await;
    assert!(seen);
    assert!(!recorder.raw.lock().iter().any(|l| l.starts_with("PING")));

    server.close();
    bot.finished().await;
}
