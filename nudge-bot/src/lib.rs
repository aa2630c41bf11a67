//! # nudge-bot
//!
//! Middleware pipeline for chat-bot handlers. A handler is wrapped in an
//! ordered stack of behaviors: activity logging, required-field validation,
//! callback acknowledgment and a final error boundary that turns any failure
//! into exactly one user-facing message.
//!
//! ```rust,no_run
//! use nudge_bot::{handler_fn, with_middleware, BotContext, HandlerFut, HandlerOptions, RequiredParam};
//!
//! let note = handler_fn("note", |ctx: &mut BotContext| -> HandlerFut<'_> {
//!     Box::pin(async move {
//!         let text = ctx.event.text().unwrap_or_default().to_string();
//!         ctx.reply(&format!("Saved: {}", text)).await?;
//!         Ok(())
//!     })
//! });
//!
//! let note = with_middleware(note, &HandlerOptions::new().require(RequiredParam::Text));
//! ```

pub mod context;
pub mod event;
pub mod handler;
pub mod messages;
pub mod middlewares;
pub mod pipeline;
pub mod transport;

#[cfg(test)]
mod testing;

pub use context::BotContext;
pub use event::{Actor, Attachment, EventKind, InboundEvent};
pub use handler::{compose, handler_fn, middleware, BoxedHandler, Handler, HandlerFut, Middleware};
pub use messages::{callback_failure_detail, user_message, CALLBACK_FAILED};
pub use middlewares::{acknowledge_callback, error_boundary, require_params, track_activity, RequiredParam};
pub use pipeline::{with_middleware, HandlerOptions};
pub use transport::{AnswerOptions, Transport};
