use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::{
    context::BotContext,
    handler::{middleware, BoxedHandler, Handler, Middleware},
    messages::{callback_failure_detail, CALLBACK_FAILED},
    transport::AnswerOptions,
};

/// Make sure a callback query is answered exactly once, whatever the handler does.
///
/// On failure the query is answered with an alert and the error is rethrown.
/// With `report_errors` the detailed failure text is also sent to the chat;
/// leave it off when an error boundary sits outside and will send its own.
pub fn acknowledge_callback(report_errors: bool) -> Middleware {
    middleware(move |inner: BoxedHandler| -> BoxedHandler {
        Arc::new(CallbackAck {
            report_errors,
            inner,
        })
    })
}

struct CallbackAck {
    report_errors: bool,
    inner: BoxedHandler,
}

#[async_trait]
impl Handler for CallbackAck {
    async fn handle(&self, ctx: &mut BotContext) -> Result<()> {
        match self.inner.handle(ctx).await {
            Ok(()) => {
                ctx.answer(AnswerOptions::default()).await?;
                Ok(())
            }
            Err(e) => {
                if let Err(ack_err) = ctx.answer(AnswerOptions::alert(CALLBACK_FAILED)).await {
                    warn!(handler = self.inner.name(), error = %ack_err, "could not answer callback");
                }
                if self.report_errors {
                    if let Err(send_err) = ctx.reply(&callback_failure_detail(&e)).await {
                        warn!(handler = self.inner.name(), error = %send_err, "could not report callback failure");
                    }
                }
                Err(e)
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
