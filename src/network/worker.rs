//! Message workers.
//!
//! A fixed pool of workers pulls numbered lines off the shared inbound queue.
//! Each line is classified, handed to the state actor (which applies it in
//! arrival order) and then dispatched to the handlers. A line whose state
//! update takes longer than the message timeout is abandoned. Dispatch is
//! bounded per hook by the registry, so one stuck hook costs one timeout and
//! its siblings still run.

use crate::event::{TypedEvent, classify};
use crate::hooks::{HandlerRegistry, HookContext};
use crate::state::{SharedCapabilities, StateHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{Instrument, Level, debug, span, warn};

/// A line waiting for a worker, stamped with its arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedLine {
    pub seq: u64,
    pub line: String,
}

/// Receiving end of the inbound queue, shared by every worker.
pub type SharedQueue = Arc<Mutex<mpsc::UnboundedReceiver<QueuedLine>>>;

pub struct Worker {
    id: usize,
    queue: SharedQueue,
    caps: SharedCapabilities,
    state: StateHandle,
    registry: Arc<HandlerRegistry>,
    ctx: HookContext,
    timeout: Duration,
}

impl Worker {
    pub fn new(
        id: usize,
        queue: SharedQueue,
        caps: SharedCapabilities,
        registry: Arc<HandlerRegistry>,
        ctx: HookContext,
        timeout: Duration,
    ) -> Self {
        let state = ctx.state.clone();
        Self {
            id,
            queue,
            caps,
            state,
            registry,
            ctx,
            timeout,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Loop until the queue is closed and drained.
    pub async fn run(self) {
        debug!(worker = self.id, "Worker started");
        loop {
            // The lock is only held while waiting for the next line.
            let next = self.queue.lock().await.recv().await;
            let Some(queued) = next else {
                break;
            };

            let line_span = span!(Level::DEBUG, "bot.line", worker = self.id, seq = queued.seq);
            self.process(queued).instrument(line_span).await;
        }
        debug!(worker = self.id, "Worker stopped");
    }

    async fn process(&self, queued: QueuedLine) {
        let seq = queued.seq;
        let event = match tokio::time::timeout(self.timeout, self.submit(queued)).await {
            Ok(Some(event)) => event,
            Ok(None) => return,
            Err(_) => {
                warn!(worker = self.id, seq, timeout = ?self.timeout, "State update timed out");
                return;
            }
        };

        let report = self.registry.dispatch(&self.ctx, &event).await;
        if report.failed > 0 {
            debug!(
                failed = report.failed,
                invoked = report.invoked,
                command = ?report.command,
                "Some hooks failed"
            );
        }
    }

    /// Classify and apply. Yields the event as the state actor applied it.
    async fn submit(&self, queued: QueuedLine) -> Option<Arc<TypedEvent>> {
        let guard = self.state.guard(queued.seq);

        let event = {
            let caps = self.caps.read();
            Arc::new(classify(&queued.line, &caps))
        };
        debug!(kind = %event.kind, line = %event.raw, "Classified");

        match guard.submit(event).await {
            Ok(applied) => Some(applied),
            Err(e) => {
                warn!(error = %e, "State update failed");
                None
            }
        }
    }
}

/// Spawn `count` workers over one queue.
pub fn spawn_pool(
    count: usize,
    queue: SharedQueue,
    caps: SharedCapabilities,
    registry: Arc<HandlerRegistry>,
    ctx: HookContext,
    timeout: Duration,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|id| {
            Worker::new(
                id,
                queue.clone(),
                caps.clone(),
                registry.clone(),
                ctx.clone(),
                timeout,
            )
            .spawn()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookResult;
    use crate::hooks::Handler;
    use crate::isupport::NetworkCapabilities;
    use crate::network::outbound::Outbound;
    use crate::state::{BootstrapPlan, StateActor};
    use async_trait::async_trait;
    use parking_lot::RwLock;

    struct Sleepy;

    #[async_trait]
    impl Handler for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }
        fn commands(&self) -> Vec<String> {
            vec!["slow".to_string()]
        }
        async fn on_command(&self, _c: &str, _ctx: &HookContext, _ev: &TypedEvent) -> HookResult {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn stuck_hook_does_not_block_the_worker() {
        let caps = Arc::new(RwLock::new(NetworkCapabilities::default()));
        let (outbound, _out_rx) = Outbound::channel();
        let (state, _task) =
            StateActor::spawn("bot", BootstrapPlan::default(), caps.clone(), outbound.clone());
        let ctx = HookContext::new(outbound, state.clone(), "!");

        let mut registry = HandlerRegistry::new();
        registry.set_hook_timeout(Duration::from_millis(100));
        registry.register(Arc::new(Sleepy));

        let (tx, rx) = mpsc::unbounded_channel();
        let queue: SharedQueue = Arc::new(Mutex::new(rx));
        let workers = spawn_pool(
            1,
            queue,
            caps,
            Arc::new(registry),
            ctx,
            Duration::from_millis(100),
        );

        tx.send(QueuedLine {
            seq: 0,
            line: ":a!u@h PRIVMSG #c :!slow".into(),
        })
        .unwrap();
        tx.send(QueuedLine {
            seq: 1,
            line: ":bot!b@h JOIN #c".into(),
        })
        .unwrap();

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(state.channels().await.unwrap(), vec!["#c"]);

        drop(tx);
        for worker in workers {
            tokio::time::timeout(Duration::from_secs(1), worker)
                .await
                .unwrap()
                .unwrap();
        }
    }
}
