use std::sync::Arc;

use crate::{
    event::InboundEvent,
    transport::{AnswerOptions, Transport},
};

/// State of a single interaction, passed by `&mut` through the middleware chain.
pub struct BotContext {
    pub event: InboundEvent,
    transport: Arc<dyn Transport>,
    answered: bool,
}

impl BotContext {
    pub fn new(event: InboundEvent, transport: Arc<dyn Transport>) -> Self {
        Self {
            event,
            transport,
            answered: false,
        }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.event.chat_id
    }

    /// Whether the callback query was already answered
    pub fn is_answered(&self) -> bool {
        self.answered
    }

    /// Send `text` to the originating conversation.
    /// Returns `false` when there is no conversation to reply into.
    pub async fn reply(&self, text: &str) -> anyhow::Result<bool> {
        match self.event.chat_id {
            Some(chat_id) => {
                self.transport.send_message(chat_id, text).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Answer the callback query at most once per interaction.
    ///
    /// Returns `false` when it was already answered or the event is not a
    /// callback query. A failed attempt still counts as the answer.
    pub async fn answer(&mut self, options: AnswerOptions) -> anyhow::Result<bool> {
        if self.answered {
            return Ok(false);
        }
        let Some(callback_id) = self.event.callback_id.clone() else {
            return Ok(false);
        };

        self.answered = true;
        self.transport.answer_callback(&callback_id, options).await?;
        Ok(true)
    }
}
