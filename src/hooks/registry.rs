//! Handler registry and hook dispatch.
//!
//! Handlers are registered once at startup and then shared read-only by all
//! workers. Dispatch fires, in order: command hooks, the raw hook, then the
//! hook for the event's kind. Each invocation is isolated so a failing,
//! panicking or stuck handler never stops its siblings.

use super::command::command_name;
use super::traits::{Handler, HookContext};
use crate::error::{HookError, HookResult};
use crate::event::{EventKind, TypedEvent};
use futures_util::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{Instrument, Level, debug, error, span, warn};

/// Sent to the reply target when a command hook fails.
pub const APOLOGY: &str =
    "There was a problem executing your command with one of my modules. Sorry!";

type HookFuture<'a> = Pin<Box<dyn Future<Output = HookResult> + Send + 'a>>;

/// Which hook to call on a handler.
#[derive(Debug, Clone, Copy)]
enum Hook<'a> {
    Command(&'a str),
    Raw,
    Privmsg,
    Notice,
    CtcpRequest,
    CtcpReply,
    NickChange,
    Join,
    Part,
}

impl Hook<'_> {
    fn label(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Raw => "raw",
            Self::Privmsg => "privmsg",
            Self::Notice => "notice",
            Self::CtcpRequest => "ctcp_request",
            Self::CtcpReply => "ctcp_reply",
            Self::NickChange => "nick_change",
            Self::Join => "join",
            Self::Part => "part",
        }
    }

    /// The kind-specific hook for an event, if it has one.
    fn for_kind(kind: EventKind) -> Option<Self> {
        match kind {
            EventKind::PrivateMessage => Some(Self::Privmsg),
            EventKind::Notice => Some(Self::Notice),
            EventKind::CtcpRequest => Some(Self::CtcpRequest),
            EventKind::CtcpReply => Some(Self::CtcpReply),
            EventKind::NickChange => Some(Self::NickChange),
            EventKind::JoinChannel => Some(Self::Join),
            EventKind::PartChannel => Some(Self::Part),
            _ => None,
        }
    }

    fn call<'a>(
        self,
        handler: &'a dyn Handler,
        ctx: &'a HookContext,
        event: &'a TypedEvent,
    ) -> HookFuture<'a>
    where
        Self: 'a,
    {
        match self {
            Self::Command(name) => handler.on_command(name, ctx, event),
            Self::Raw => handler.on_raw(ctx, event),
            Self::Privmsg => handler.on_privmsg(ctx, event),
            Self::Notice => handler.on_notice(ctx, event),
            Self::CtcpRequest => handler.on_ctcp_request(ctx, event),
            Self::CtcpReply => handler.on_ctcp_reply(ctx, event),
            Self::NickChange => handler.on_nick_change(ctx, event),
            Self::Join => handler.on_join(ctx, event),
            Self::Part => handler.on_part(ctx, event),
        }
    }
}

/// Outcome of dispatching one event.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Command the event resolved to, if any.
    pub command: Option<String>,
    pub invoked: usize,
    pub failed: usize,
    /// At least one command hook failed (an apology was sent).
    pub command_failed: bool,
}

/// Registry of handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn Handler>>,
    /// Command name → indices into `handlers`.
    commands: HashMap<String, Vec<usize>>,
    /// Command usage counters.
    command_counts: HashMap<String, AtomicU64>,
    /// Deadline for a single hook invocation.
    hook_timeout: Option<Duration>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::builtin::CtcpResponder::default()));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn Handler>) {
        let index = self.handlers.len();
        for command in handler.commands() {
            self.command_counts
                .entry(command.clone())
                .or_insert_with(|| AtomicU64::new(0));
            self.commands.entry(command).or_default().push(index);
        }
        debug!(handler = %handler.name(), "Handler registered");
        self.handlers.push(handler);
    }

    /// Bound every hook call. An elapsed hook counts as a failure.
    pub fn set_hook_timeout(&mut self, limit: Duration) {
        self.hook_timeout = Some(limit);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Command usage, most used first.
    pub fn command_stats(&self) -> Vec<(&str, u64)> {
        let mut stats: Vec<_> = self
            .command_counts
            .iter()
            .map(|(cmd, count)| (cmd.as_str(), count.load(Ordering::Relaxed)))
            .filter(|(_, count)| *count > 0)
            .collect();
        stats.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        stats
    }

    /// Fire every hook that applies to `event`.
    pub async fn dispatch(&self, ctx: &HookContext, event: &TypedEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        if event.kind.carries_commands()
            && let Some(name) = command_name(event, &ctx.command_prefix)
        {
            if let Some(indices) = self.commands.get(&name) {
                if let Some(counter) = self.command_counts.get(&name) {
                    counter.fetch_add(1, Ordering::Relaxed);
                }
                for &index in indices {
                    let ok = self
                        .invoke(&self.handlers[index], Hook::Command(&name), ctx, event)
                        .await;
                    report.invoked += 1;
                    if !ok {
                        report.failed += 1;
                        report.command_failed = true;
                    }
                }
            }
            report.command = Some(name);
        }

        for handler in &self.handlers {
            let ok = self.invoke(handler, Hook::Raw, ctx, event).await;
            report.invoked += 1;
            report.failed += usize::from(!ok);
        }

        if let Some(hook) = Hook::for_kind(event.kind) {
            for handler in &self.handlers {
                let ok = self.invoke(handler, hook, ctx, event).await;
                report.invoked += 1;
                report.failed += usize::from(!ok);
            }
        }

        if report.command_failed
            && let Err(e) = ctx.outbound.privmsg(&event.reply_target, APOLOGY).await
        {
            debug!(error = %e, "Could not send apology");
        }

        report
    }

    /// Fire `on_exiting` on every handler.
    pub async fn dispatch_exiting(&self, ctx: &HookContext) -> usize {
        let mut failed = 0;
        for handler in &self.handlers {
            let result = self.guarded(handler.on_exiting(ctx)).await;
            if !log_outcome(handler.name(), "exiting", result) {
                failed += 1;
            }
        }
        failed
    }

    async fn invoke(
        &self,
        handler: &Arc<dyn Handler>,
        hook: Hook<'_>,
        ctx: &HookContext,
        event: &TypedEvent,
    ) -> bool {
        let hook_span = span!(
            Level::DEBUG,
            "bot.hook",
            handler = %handler.name(),
            hook = hook.label(),
            kind = %event.kind,
        );
        let result = self
            .guarded(hook.call(handler.as_ref(), ctx, event))
            .instrument(hook_span)
            .await;
        log_outcome(handler.name(), hook.label(), result)
    }

    /// Run one hook future, catching panics and enforcing the hook timeout.
    async fn guarded<F>(&self, hook: F) -> Result<HookResult, Box<dyn Any + Send>>
    where
        F: Future<Output = HookResult>,
    {
        let call = AssertUnwindSafe(hook).catch_unwind();
        match self.hook_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Ok(Err(HookError::TimedOut(limit)))),
            None => call.await,
        }
    }
}

fn log_outcome(
    handler: &str,
    hook: &str,
    result: Result<HookResult, Box<dyn Any + Send>>,
) -> bool {
    match result {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!(handler = %handler, hook = %hook, code = e.error_code(), error = %e, "Hook failed");
            false
        }
        Err(panic) => {
            error!(handler = %handler, hook = %hook, panic = %panic_message(panic.as_ref()), "Hook panicked");
            false
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
