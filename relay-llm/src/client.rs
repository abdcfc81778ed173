use crate::anthropic::AnthropicClient;
use crate::error::{LlmError, Result};
use crate::huggingface::HuggingFaceClient;
use crate::openai::OpenAiClient;
use crate::types::{ChatMessage, ChatResponse, StreamChunk};
use futures_util::Stream;
use std::pin::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Anthropic,
    HuggingFace,
}

impl Provider {
    /// Service name used for credential lookup.
    pub fn service_name(self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::HuggingFace => "huggingface",
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    provider: Provider,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl LlmClient {
    /// Client for `model`, with the provider detected from the model name.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::for_provider(detect_provider(model), api_key, model)
    }

    /// Client with the provider pinned explicitly.
    pub fn for_provider(provider: Provider, api_key: &str, model: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self {
            provider,
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        }
    }

    /// Client for `model` with the key taken from a credential registry.
    pub fn from_registry(registry: &relay_keys::KeyRegistry, model: &str) -> Result<Self> {
        let provider = detect_provider(model);
        let api_key = registry.get_api_key(provider.service_name())?;
        Ok(Self::for_provider(provider, &api_key, model))
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        match self.provider {
            Provider::OpenAI => {
                let c = OpenAiClient::new(self.client.clone(), &self.api_key, &self.model);
                c.chat(messages).await
            }
            Provider::Anthropic => {
                let c = AnthropicClient::new(self.client.clone(), &self.api_key, &self.model);
                c.chat(messages).await
            }
            Provider::HuggingFace => {
                let c = HuggingFaceClient::new(self.client.clone(), &self.api_key, &self.model);
                c.chat(messages).await
            }
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        match self.provider {
            Provider::OpenAI => {
                let c = OpenAiClient::new(self.client.clone(), &self.api_key, &self.model);
                c.chat_stream(messages).await
            }
            Provider::Anthropic => {
                let c = AnthropicClient::new(self.client.clone(), &self.api_key, &self.model);
                c.chat_stream(messages).await
            }
            Provider::HuggingFace => Err(LlmError::Unsupported(
                "huggingface inference does not stream".to_string(),
            )),
        }
    }
}

fn detect_provider(model: &str) -> Provider {
    let m = model.to_ascii_lowercase();
    if m.starts_with("claude-") {
        return Provider::Anthropic;
    }
    // Hub model ids are namespaced, e.g. "google/flan-t5-xl".
    if m.contains('/') {
        return Provider::HuggingFace;
    }
    Provider::OpenAI
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_detection_follows_model_name_shape() {
        assert_eq!(detect_provider("claude-3-opus-20240229"), Provider::Anthropic);
        assert_eq!(detect_provider("Claude-3-Haiku"), Provider::Anthropic);
        assert_eq!(detect_provider("google/flan-t5-xl"), Provider::HuggingFace);
        assert_eq!(detect_provider("gpt-4"), Provider::OpenAI);
        assert_eq!(detect_provider("o3-mini"), Provider::OpenAI);
    }

    #[test]
    fn service_names_match_the_credential_registry() {
        assert_eq!(Provider::OpenAI.service_name(), "openai");
        assert_eq!(Provider::Anthropic.service_name(), "anthropic");
        assert_eq!(Provider::HuggingFace.service_name(), "huggingface");
    }
}
