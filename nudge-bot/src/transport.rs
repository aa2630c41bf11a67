use async_trait::async_trait;

/// How a callback query is answered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerOptions {
    pub text: Option<String>,
    /// Modal alert instead of a transient toast
    pub show_alert: bool,
}

impl AnswerOptions {
    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            show_alert: true,
        }
    }
}

/// Outbound side of the chat client
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> anyhow::Result<()>;

    async fn answer_callback(&self, callback_id: &str, options: AnswerOptions) -> anyhow::Result<()>;
}
