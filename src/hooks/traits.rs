//! Handler trait and the context hooks receive.

use crate::error::{HookError, HookResult};
use crate::event::TypedEvent;
use crate::network::outbound::Outbound;
use crate::state::StateHandle;
use async_trait::async_trait;
use std::sync::Arc;

/// What a hook can reach: the outbound sender, the state actor and the
/// configured command prefix.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub outbound: Outbound,
    pub state: StateHandle,
    pub command_prefix: Arc<str>,
}

impl HookContext {
    pub fn new(outbound: Outbound, state: StateHandle, command_prefix: impl Into<Arc<str>>) -> Self {
        Self {
            outbound,
            state,
            command_prefix: command_prefix.into(),
        }
    }

    /// PRIVMSG the event's reply target.
    pub async fn reply(&self, event: &TypedEvent, text: &str) -> HookResult {
        self.outbound
            .privmsg(&event.reply_target, text)
            .await
            .map_err(HookError::from)
    }
}

/// A pluggable event handler.
///
/// Every hook has a no-op default; implement only what you need. Hooks for
/// one event run after the state actor has applied that event. Errors and
/// panics are contained per invocation.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Command names (already sanitized, e.g. `seen`, `foo_bar`) this
    /// handler answers through [`Handler::on_command`].
    fn commands(&self) -> Vec<String> {
        Vec::new()
    }

    async fn on_command(&self, _command: &str, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    /// Every classified line, whatever its kind.
    async fn on_raw(&self, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    async fn on_privmsg(&self, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    async fn on_notice(&self, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    async fn on_ctcp_request(&self, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    async fn on_ctcp_reply(&self, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    async fn on_nick_change(&self, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    async fn on_join(&self, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    async fn on_part(&self, _ctx: &HookContext, _event: &TypedEvent) -> HookResult {
        Ok(())
    }

    /// The engine is shutting down; the socket may already be gone.
    async fn on_exiting(&self, _ctx: &HookContext) -> HookResult {
        Ok(())
    }
}
