use crate::client::LlmClient;
use crate::error::{LlmError, Result};
use crate::types::ChatMessage;

/// Conversation bookkeeping over an [`LlmClient`].
///
/// Keeps the running transcript, seeds it with a system message, and
/// records both sides of every exchange.
pub struct ChatSession {
    client: LlmClient,
    system: String,
    history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(client: LlmClient, system: impl Into<String>) -> Self {
        let mut session = Self {
            client,
            system: system.into(),
            history: Vec::new(),
        };
        session.reset_history();
        session
    }

    fn reset_history(&mut self) {
        self.history.clear();
        if !self.system.is_empty() {
            self.history.push(ChatMessage::system(self.system.clone()));
        }
    }

    /// Ask a question and return the assistant's reply.
    ///
    /// The question stays in the transcript even when the call fails, so a
    /// retry continues the same conversation.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(LlmError::InvalidInput("empty question".to_string()));
        }

        self.history.push(ChatMessage::user(question));
        let response = self.client.chat(&self.history).await?;
        let reply = response.message.content.clone();
        self.history.push(response.message);
        Ok(reply)
    }

    /// Drop the transcript, keeping the system message.
    pub fn clear(&mut self) {
        self.reset_history();
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Swap the underlying client; the transcript carries over.
    pub fn set_client(&mut self, client: LlmClient) {
        self.client = client;
    }
}
