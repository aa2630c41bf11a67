use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::BotContext;

/// Boxed future returned by closure handlers
pub type HandlerFut<'a> = BoxFuture<'a, Result<()>>;

/// Something that reacts to one inbound interaction.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &mut BotContext) -> Result<()>;

    /// Name used in activity logs
    fn name(&self) -> &str {
        "handler"
    }
}

pub type BoxedHandler = Arc<dyn Handler>;

/// Turns a handler into a handler with one more behavior around it
pub type Middleware = Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>;

/// Wrap `handler` so that `middlewares[0]` is outermost:
/// `[A, B, C]` around `H` yields `A(B(C(H)))`.
pub fn compose(handler: BoxedHandler, middlewares: &[Middleware]) -> BoxedHandler {
    middlewares
        .iter()
        .rev()
        .fold(handler, |inner, middleware| middleware(inner))
}

/// Build a [`Middleware`] from a plain function
pub fn middleware<F>(f: F) -> Middleware
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    Arc::new(f)
}

struct FnHandler<F> {
    name: String,
    call: F,
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut BotContext) -> HandlerFut<'a> + Send + Sync,
{
    async fn handle(&self, ctx: &mut BotContext) -> Result<()> {
        (self.call)(ctx).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Adapt a closure into a named handler:
///
/// ```rust
/// use nudge_bot::{handler_fn, BotContext, Handler, HandlerFut};
///
/// let start = handler_fn("start", |ctx: &mut BotContext| -> HandlerFut<'_> {
///     Box::pin(async move {
///         ctx.reply("Welcome!").await?;
///         Ok(())
///     })
/// });
/// assert_eq!(start.name(), "start");
/// ```
pub fn handler_fn<F>(name: impl Into<String>, call: F) -> BoxedHandler
where
    F: for<'a> Fn(&'a mut BotContext) -> HandlerFut<'a> + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        call,
    })
}
