use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::{
    context::BotContext,
    event::InboundEvent,
    handler::{middleware, BoxedHandler, Handler, Middleware},
    transport::AnswerOptions,
};

/// A field an inbound event must carry before the handler runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredParam {
    Text,
    Attachment,
    CallbackData,
}

impl RequiredParam {
    fn is_present(self, event: &InboundEvent) -> bool {
        match self {
            RequiredParam::Text => event.text().is_some(),
            RequiredParam::Attachment => event.attachment.is_some(),
            RequiredParam::CallbackData => event.callback_data().is_some(),
        }
    }

    /// What the user is told when the field is missing
    pub fn rejection(self) -> &'static str {
        match self {
            RequiredParam::Text => "Please send a text message.",
            RequiredParam::Attachment => "Please attach a file.",
            RequiredParam::CallbackData => "This button is no longer valid.",
        }
    }
}

/// Short-circuit with a rejection message when any of `params` is missing.
///
/// The inner handler is not called and no error is raised.
pub fn require_params(params: Vec<RequiredParam>) -> Middleware {
    let params: Arc<[RequiredParam]> = params.into();
    middleware(move |inner: BoxedHandler| -> BoxedHandler {
        Arc::new(ParamValidator {
            params: params.clone(),
            inner,
        })
    })
}

struct ParamValidator {
    params: Arc<[RequiredParam]>,
    inner: BoxedHandler,
}

#[async_trait]
impl Handler for ParamValidator {
    async fn handle(&self, ctx: &mut BotContext) -> Result<()> {
        let missing = self.params.iter().copied().find(|p| !p.is_present(&ctx.event));

        let Some(param) = missing else {
            return self.inner.handle(ctx).await;
        };

        debug!(handler = self.inner.name(), missing = ?param, "rejected before handler");
        if !ctx.reply(param.rejection()).await? {
            ctx.answer(AnswerOptions::alert(param.rejection())).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
