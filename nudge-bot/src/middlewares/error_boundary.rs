use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use nudge_core::NudgeError;
use tracing::{error, warn};

use crate::{
    context::BotContext,
    handler::{middleware, BoxedHandler, Handler, Middleware},
    messages::user_message,
    transport::AnswerOptions,
};

/// Catch every error from the wrapped handler and turn it into one user message.
/// Nothing escapes past this layer.
pub fn error_boundary() -> Middleware {
    middleware(|inner: BoxedHandler| -> BoxedHandler { Arc::new(ErrorBoundary { inner }) })
}

struct ErrorBoundary {
    inner: BoxedHandler,
}

impl ErrorBoundary {
    async fn notify(&self, ctx: &mut BotContext, text: &str) -> Result<()> {
        if ctx.reply(text).await? {
            return Ok(());
        }
        if ctx.event.is_callback() && !ctx.is_answered() {
            ctx.answer(AnswerOptions::alert(text)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for ErrorBoundary {
    async fn handle(&self, ctx: &mut BotContext) -> Result<()> {
        let Err(e) = self.inner.handle(ctx).await else {
            return Ok(());
        };

        error!(
            handler = self.inner.name(),
            actor_id = ctx.event.actor.id,
            kind = NudgeError::kind_of(&e).code(),
            error = %format!("{:#}", e),
            "unhandled handler error"
        );

        if let Err(send_err) = self.notify(ctx, &user_message(&e)).await {
            warn!(handler = self.inner.name(), error = %send_err, "could not deliver error message");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
