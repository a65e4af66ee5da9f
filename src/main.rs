//! slirc-bot - Straylight IRC Bot
//!
//! Loads the configuration, takes the instance lock and runs one connection
//! until the server closes it.

use anyhow::Context;
use clap::Parser;
use slirc_bot::{
    ConfigStore, Engine, HandlerRegistry, LockFile, Outbound, TomlConfigStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "slirc-bot", version, about = "Straylight IRC Bot")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "slirc-bot.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(short, long)]
    debug: bool,

    /// PID lock file guarding against a second instance.
    #[arg(long, default_value = ".slirc-bot.lock")]
    lock_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let store = TomlConfigStore::new(&cli.config);
    // Logging is not up yet; the error goes to stderr through anyhow.
    let config = store
        .load()
        .await
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let _log_guard = init_tracing(cli.debug, config.logging.directory.as_deref())?;

    info!(
        server = %config.server.address,
        port = config.server.port,
        nick = %config.identity.nick,
        "Starting slirc-bot"
    );

    let lock = LockFile::acquire(&cli.lock_file).map_err(|e| {
        error!(path = %cli.lock_file.display(), error = %e, "Refusing to start");
        e
    })?;

    let quit_message = config.quit_message.clone();
    let engine = Engine::new(config, HandlerRegistry::with_builtins())
        .with_store(Arc::new(store))
        .with_lock(lock);

    tokio::spawn(quit_on_signal(engine.outbound(), quit_message));

    let reason = engine.run().await?;
    info!(reason = ?reason, "Connection closed, exiting");
    Ok(())
}

/// Install the subscriber. Keep the returned guard alive to flush file logs.
fn init_tracing(
    debug: bool,
    log_dir: Option<&std::path::Path>,
) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "slirc-bot.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .init();
            Ok(None)
        }
    }
}

/// Send QUIT on SIGINT or SIGTERM. The server then closes the socket, which
/// drives the normal exit sequence. SIGHUP is ignored.
async fn quit_on_signal(outbound: Outbound, quit_message: String) {
    wait_for_signal().await;
    info!("Signal received, quitting");
    if let Err(e) = outbound.quit(&quit_message).await {
        warn!(error = %e, "Could not send QUIT");
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let (Ok(mut term), Ok(mut hup)) = (
        signal(SignalKind::terminate()),
        signal(SignalKind::hangup()),
    ) else {
        warn!("Could not install signal handlers, falling back to Ctrl-C only");
        let _ = tokio::signal::ctrl_c().await;
        return;
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return,
            _ = term.recv() => return,
            _ = hup.recv() => info!("SIGHUP ignored"),
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
