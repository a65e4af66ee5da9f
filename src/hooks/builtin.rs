//! Built-in handlers.

use super::traits::{Handler, HookContext};
use crate::error::{HookError, HookResult};
use crate::event::TypedEvent;
use async_trait::async_trait;
use chrono::Utc;

/// Answers CTCP VERSION, PING, TIME and CLIENTINFO.
#[derive(Debug, Clone)]
pub struct CtcpResponder {
    version: String,
}

impl CtcpResponder {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

impl Default for CtcpResponder {
    fn default() -> Self {
        Self::new(concat!("slirc-bot ", env!("CARGO_PKG_VERSION")))
    }
}

#[async_trait]
impl Handler for CtcpResponder {
    fn name(&self) -> &str {
        "ctcp"
    }

    async fn on_ctcp_request(&self, ctx: &HookContext, event: &TypedEvent) -> HookResult {
        let Some((command, params)) = event.ctcp() else {
            return Ok(());
        };
        let target = event.speaker.nick.as_str();
        let out = &ctx.outbound;

        let sent = match command.to_ascii_uppercase().as_str() {
            "VERSION" => out.ctcp_reply(target, "VERSION", Some(self.version.as_str())).await,
            "PING" => out.ctcp_reply(target, "PING", params).await,
            "TIME" => {
                let now = Utc::now().to_rfc2822();
                out.ctcp_reply(target, "TIME", Some(now.as_str())).await
            }
            "CLIENTINFO" => {
                out.ctcp_reply(target, "CLIENTINFO", Some("CLIENTINFO PING TIME VERSION"))
                    .await
            }
            _ => return Ok(()),
        };
        sent.map_err(HookError::from)
    }
}
