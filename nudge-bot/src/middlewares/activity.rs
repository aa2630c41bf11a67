use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{error, info};

use crate::{
    context::BotContext,
    handler::{middleware, BoxedHandler, Handler, Middleware},
};

/// Log who invoked which handler, and any failure on the way out. Never
/// swallows the error.
pub fn track_activity() -> Middleware {
    middleware(|inner: BoxedHandler| -> BoxedHandler { Arc::new(ActivityTracker { inner }) })
}

struct ActivityTracker {
    inner: BoxedHandler,
}

#[async_trait]
impl Handler for ActivityTracker {
    async fn handle(&self, ctx: &mut BotContext) -> Result<()> {
        let actor = &ctx.event.actor;
        info!(
            handler = self.inner.name(),
            actor_id = actor.id,
            username = actor.username.as_deref().unwrap_or("-"),
            at = %Utc::now(),
            "handler invoked"
        );
        let actor_id = actor.id;

        match self.inner.handle(ctx).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(
                    handler = self.inner.name(),
                    actor_id,
                    error = %format!("{:#}", e),
                    "handler failed"
                );
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{compose, handler_fn, HandlerFut};
    use crate::testing::{context, failing_handler, message_event, RecordingTransport};
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn logs_invocation_and_forwards() {
        let handler = handler_fn("stats", |ctx: &mut BotContext| -> HandlerFut<'_> {
            Box::pin(async move {
                ctx.reply("3 follow-ups pending").await?;
                Ok(())
            })
        });
        let composed = compose(handler, &[track_activity()]);

        let transport = RecordingTransport::new();
        let mut ctx = context(message_event("/stats"), &transport);
        composed.handle(&mut ctx).await.unwrap();

        assert_eq!(transport.sent().len(), 1);
        assert!(logs_contain("handler invoked"));
        assert!(logs_contain("stats"));
        assert!(!logs_contain("handler failed"));
    }

    #[tokio::test]
    #[traced_test]
    async fn rethrows_failures() {
        let composed = compose(failing_handler("broken", "database offline"), &[track_activity()]);

        let transport = RecordingTransport::new();
        let mut ctx = context(message_event("/broken"), &transport);
        let err = composed.handle(&mut ctx).await.unwrap_err();

        assert_eq!(err.to_string(), "database offline");
        assert!(logs_contain("handler failed"));
    }
}
