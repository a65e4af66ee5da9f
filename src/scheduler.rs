//! Named periodic tasks.
//!
//! The engine registers its housekeeping here ("Keep-Alive Pinger",
//! "Configuration Auto-Save"). Tasks run on their own tokio tasks and are
//! aborted on shutdown.

use futures_util::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

pub type TaskAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// A task to run after `interval`, and every `interval` after that when
/// `repeat` is set.
#[derive(Clone)]
pub struct ScheduledTask {
    pub name: String,
    pub interval: Duration,
    pub repeat: bool,
    pub action: TaskAction,
}

impl ScheduledTask {
    pub fn repeating<F>(name: impl Into<String>, interval: Duration, action: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            interval,
            repeat: true,
            action: Arc::new(action),
        }
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("repeat", &self.repeat)
            .finish_non_exhaustive()
    }
}

pub trait Scheduler: Send {
    /// Register a task. Tasks added after `start` begin immediately.
    fn add(&mut self, task: ScheduledTask);
    fn start(&mut self);
    /// Stop every task. Safe to call more than once.
    fn shutdown(&mut self);
    fn task_names(&self) -> Vec<String>;
}

/// [`Scheduler`] backed by `tokio::time::interval`.
#[derive(Debug, Default)]
pub struct IntervalScheduler {
    pending: Vec<ScheduledTask>,
    running: Vec<(String, JoinHandle<()>)>,
    started: bool,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn launch(&mut self, task: ScheduledTask) {
        let name = task.name.clone();
        debug!(task = %name, interval = ?task.interval, repeat = task.repeat, "Scheduling task");
        let handle = tokio::spawn(run_task(task));
        self.running.push((name, handle));
    }
}

async fn run_task(task: ScheduledTask) {
    let period = task.interval.max(Duration::from_millis(1));
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        debug!(task = %task.name, "Running scheduled task");
        (task.action)().await;
        if !task.repeat {
            break;
        }
    }
}

impl Scheduler for IntervalScheduler {
    fn add(&mut self, task: ScheduledTask) {
        if self.started {
            self.launch(task);
        } else {
            self.pending.push(task);
        }
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        for task in std::mem::take(&mut self.pending) {
            self.launch(task);
        }
        info!(tasks = self.running.len(), "Scheduler started");
    }

    fn shutdown(&mut self) {
        for (name, handle) in self.running.drain(..) {
            handle.abort();
            debug!(task = %name, "Scheduled task stopped");
        }
        self.pending.clear();
    }

    fn task_names(&self) -> Vec<String> {
        self.pending
            .iter()
            .map(|t| t.name.clone())
            .chain(self.running.iter().map(|(name, _)| name.clone()))
            .collect()
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        for (_, handle) in &self.running {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static {
        let counter = counter.clone();
        move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        }
    }

    #[tokio::test]
    async fn repeating_task_runs_each_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduler = IntervalScheduler::new();
        scheduler.add(ScheduledTask::repeating("tick", Duration::from_millis(20), counting(&count)));
        assert_eq!(scheduler.task_names(), vec!["tick"]);
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(150)).await;
        let seen = count.load(Ordering::SeqCst);
        assert!(seen >= 2, "ran {seen} times");

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let stopped_at = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), stopped_at);
        assert!(scheduler.task_names().is_empty());
    }

    #[tokio::test]
    async fn one_shot_task_runs_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduler = IntervalScheduler::new();
        scheduler.start();
        scheduler.add(ScheduledTask {
            name: "later".into(),
            interval: Duration::from_millis(10),
            repeat: false,
            action: Arc::new(counting(&count)),
        });

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
