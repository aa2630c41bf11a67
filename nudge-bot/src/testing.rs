//! In-memory doubles shared by the unit tests.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    context::BotContext,
    event::{Actor, InboundEvent},
    handler::{handler_fn, BoxedHandler, HandlerFut},
    transport::{AnswerOptions, Transport},
};

#[derive(Default)]
pub(crate) struct RecordingTransport {
    sent: Mutex<Vec<(i64, String)>>,
    answers: Mutex<Vec<(String, AnswerOptions)>>,
    fail_sends: AtomicBool,
}

impl RecordingTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().clone()
    }

    pub(crate) fn answers(&self) -> Vec<(String, AnswerOptions)> {
        self.answers.lock().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send_message(&self, chat_id: i64, text: &str) -> anyhow::Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("transport closed");
        }
        self.sent.lock().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn answer_callback(&self, callback_id: &str, options: AnswerOptions) -> anyhow::Result<()> {
        self.answers.lock().push((callback_id.to_string(), options));
        Ok(())
    }
}

pub(crate) fn message_event(text: &str) -> InboundEvent {
    InboundEvent::message(Actor::new(42).with_username("dana"), 7, text)
}

pub(crate) fn callback_event(data: &str) -> InboundEvent {
    InboundEvent::callback(Actor::new(42), Some(7), "cb-1").with_callback_data(data)
}

pub(crate) fn context(event: InboundEvent, transport: &Arc<RecordingTransport>) -> BotContext {
    BotContext::new(event, transport.clone())
}

pub(crate) fn failing_handler(name: &str, message: &'static str) -> BoxedHandler {
    handler_fn(name, move |_ctx: &mut BotContext| -> HandlerFut<'_> {
        Box::pin(async move { Err(anyhow::anyhow!(message)) })
    })
}

/// Handler that only counts its invocations
pub(crate) fn counting_handler(name: &str) -> (BoxedHandler, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let handler = handler_fn(name, move |_ctx: &mut BotContext| -> HandlerFut<'_> {
        counter.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Ok(()) })
    });
    (handler, calls)
}
