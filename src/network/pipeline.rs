//! The engine: one connection, end to end.
//!
//! ```text
//!   socket ──► reader ──(seq, line)──► queue ──► workers ×N ──► handlers
//!     ▲          │                                  │
//!     │          └─ PING → PONG                     ▼
//!   writer ◄────────── Outbound ◄──────────── state actor
//! ```
//!
//! The reader answers server PINGs itself and numbers every other line. When
//! the socket closes the engine runs the exit sequence: stop the workers and
//! the scheduler, fire exit hooks, save the config, release the lock.

use super::connection::{self, IrcStream};
use super::outbound::{Outbound, registration_lines};
use super::worker::{QueuedLine, SharedQueue, spawn_pool};
use crate::config::{BotConfig, ConfigStore};
use crate::error::EngineError;
use crate::hooks::{HandlerRegistry, HookContext};
use crate::isupport::NetworkCapabilities;
use crate::lock::LockFile;
use crate::proto::IrcLineCodec;
use crate::scheduler::{IntervalScheduler, ScheduledTask, Scheduler};
use crate::state::{BootstrapPlan, SharedCapabilities, StateActor, StateHandle};
use futures_util::future::join_all;
use futures_util::{FutureExt, SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

/// Why [`Engine::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    /// The server closed the connection.
    ServerClosed,
    /// Reading from the socket failed.
    ReadError(String),
}

pub struct Engine {
    config: BotConfig,
    registry: Arc<HandlerRegistry>,
    store: Option<Arc<dyn ConfigStore>>,
    lock: Option<LockFile>,
    caps: SharedCapabilities,
    outbound: Outbound,
    outbound_rx: mpsc::Receiver<String>,
    state: StateHandle,
}

impl Engine {
    /// Build an engine. Spawns the state actor, so this must be called from
    /// inside a tokio runtime. The actor stops once every [`StateHandle`] is
    /// dropped. Every hook in `registry` is bounded by the message timeout.
    pub fn new(config: BotConfig, mut registry: HandlerRegistry) -> Self {
        registry.set_hook_timeout(Duration::from_secs(config.pipeline.message_timeout_secs));
        let caps: SharedCapabilities = Arc::new(RwLock::new(NetworkCapabilities::new()));
        let (outbound, outbound_rx) = Outbound::channel();
        let plan = BootstrapPlan {
            bot_mode: config.bot_mode().map(str::to_string),
            channels: config.channels.clone(),
        };
        let (state, _actor) = StateActor::spawn(
            config.identity.nick.clone(),
            plan,
            caps.clone(),
            outbound.clone(),
        );

        Self {
            config,
            registry: Arc::new(registry),
            store: None,
            lock: None,
            caps,
            outbound,
            outbound_rx,
            state,
        }
    }

    /// Persist the config here on auto-save and on exit.
    pub fn with_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Release this lock at the end of the exit sequence.
    pub fn with_lock(mut self, lock: LockFile) -> Self {
        self.lock = Some(lock);
        self
    }

    /// Sender for lines to the server, usable from outside the engine.
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    pub fn capabilities(&self) -> SharedCapabilities {
        self.caps.clone()
    }

    /// Connect to the configured server and run until the connection ends.
    pub async fn run(self) -> Result<ExitReason, EngineError> {
        let stream = connection::connect(&self.config.server).await?;
        self.run_with_stream(stream).await
    }

    /// Run over an already open stream.
    pub async fn run_with_stream<S: IrcStream>(self, stream: S) -> Result<ExitReason, EngineError> {
        let Self {
            config,
            registry,
            store,
            mut lock,
            caps,
            outbound,
            outbound_rx,
            state,
        } = self;

        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FramedRead::new(read_half, IrcLineCodec::new());
        let writer = spawn_writer(FramedWrite::new(write_half, IrcLineCodec::new()), outbound_rx);

        // Registration
        let identity = &config.identity;
        outbound
            .send_all(registration_lines(
                config.server.password.as_deref(),
                &identity.nick,
                &identity.username,
                &identity.realname,
            ))
            .await?;
        state.registration_sent()?;
        info!(nick = %identity.nick, "Registration sent");

        // Workers
        let ctx = HookContext::new(outbound.clone(), state.clone(), config.command_prefix.as_str());
        let (queue_tx, queue_rx) = mpsc::unbounded_channel::<QueuedLine>();
        let queue: SharedQueue = Arc::new(Mutex::new(queue_rx));
        let timeout = Duration::from_secs(config.pipeline.message_timeout_secs);
        let workers = spawn_pool(
            config.pipeline.workers,
            queue,
            caps,
            registry.clone(),
            ctx.clone(),
            timeout,
        );
        info!(workers = workers.len(), timeout = ?timeout, "Worker pool started");

        // Housekeeping
        let mut scheduler = IntervalScheduler::new();
        register_housekeeping(&mut scheduler, &config, &outbound, &state, store.as_ref());
        scheduler.start();

        // Reader
        let mut seq: u64 = 0;
        let reason = loop {
            match reader.next().await {
                Some(Ok(line)) => {
                    if let Some(token) = ping_token(&line) {
                        if let Err(e) = outbound.pong(token).await {
                            warn!(error = %e, "Could not answer PING");
                        }
                        continue;
                    }
                    if queue_tx.send(QueuedLine { seq, line }).is_err() {
                        error!("Inbound queue closed");
                        break ExitReason::ReadError("inbound queue closed".to_string());
                    }
                    seq += 1;
                }
                Some(Err(e)) => {
                    warn!(error = %e, "Read error");
                    break ExitReason::ReadError(e.to_string());
                }
                None => {
                    info!("Server closed the connection");
                    break ExitReason::ServerClosed;
                }
            }
        };

        // Exit sequence
        let _ = state.disconnected();
        drop(queue_tx);
        let aborts: Vec<_> = workers.iter().map(JoinHandle::abort_handle).collect();
        if tokio::time::timeout(timeout, join_all(workers)).await.is_err() {
            warn!(workers = aborts.len(), "Workers still busy at exit, aborting");
            for abort in aborts {
                abort.abort();
            }
        }
        scheduler.shutdown();

        let failed = registry.dispatch_exiting(&ctx).await;
        if failed > 0 {
            warn!(failed, "Some exit hooks failed");
        }

        if let Some(store) = &store {
            let nick = state.bot_nick().await.unwrap_or_else(|_| config.identity.nick.clone());
            save_config(store.as_ref(), &config, &nick).await;
        }

        if let Some(lock) = lock.as_mut()
            && let Err(e) = lock.release()
        {
            warn!(error = %e, "Failed to release lock");
        }

        let _ = state.terminated();
        debug!(lines = seq, reason = ?reason, "Exit sequence finished");

        writer.abort();

        Ok(reason)
    }
}

/// The token of a server `PING`, if `line` is one.
fn ping_token(line: &str) -> Option<&str> {
    line.strip_prefix("PING ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

fn spawn_writer<W>(
    mut sink: FramedWrite<W, IrcLineCodec>,
    mut rx: mpsc::Receiver<String>,
) -> JoinHandle<()>
where
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if let Err(e) = sink.send(line).await {
                warn!(error = %e, "Write failed");
                break;
            }
        }
        debug!("Writer stopped");
    })
}

fn register_housekeeping(
    scheduler: &mut impl Scheduler,
    config: &BotConfig,
    outbound: &Outbound,
    state: &StateHandle,
    store: Option<&Arc<dyn ConfigStore>>,
) {
    let schedule = &config.schedule;

    if schedule.keepalive_secs > 0 {
        let outbound = outbound.clone();
        scheduler.add(ScheduledTask::repeating(
            "Keep-Alive Pinger",
            Duration::from_secs(schedule.keepalive_secs),
            move || {
                let outbound = outbound.clone();
                async move {
                    let now = chrono::Utc::now().timestamp();
                    if let Err(e) = outbound.send_raw(format!("PING {now}")).await {
                        debug!(error = %e, "Keep-alive PING dropped");
                    }
                }
                .boxed()
            },
        ));
    }

    if schedule.autosave_secs > 0
        && let Some(store) = store
    {
        let store = store.clone();
        let state = state.clone();
        let config = config.clone();
        scheduler.add(ScheduledTask::repeating(
            "Configuration Auto-Save",
            Duration::from_secs(schedule.autosave_secs),
            move || {
                let store = store.clone();
                let state = state.clone();
                let config = config.clone();
                async move {
                    let nick = match state.bot_nick().await {
                        Ok(nick) => nick,
                        Err(_) => config.identity.nick.clone(),
                    };
                    save_config(store.as_ref(), &config, &nick).await;
                }
                .boxed()
            },
        ));
    }
}

/// Save `config` with the bot's current nick.
async fn save_config(store: &dyn ConfigStore, config: &BotConfig, nick: &str) {
    let mut config = config.clone();
    config.identity.nick = nick.to_string();
    if let Err(e) = store.save(&config).await {
        error!(error = %e, "Failed to save configuration");
    }
}
