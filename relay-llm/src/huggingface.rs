use crate::error::{LlmError, Result};
use crate::types::{ChatMessage, ChatResponse, Usage};
use serde::{Deserialize, Serialize};

const HF_INFERENCE_BASE_URL: &str = "https://api-inference.huggingface.co/models";

#[derive(Clone)]
pub struct HuggingFaceClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl HuggingFaceClient {
    pub fn new(http: reqwest::Client, api_key: &str, model: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        let req = HfRequest {
            inputs: flatten_prompt(messages),
        };

        let response = self
            .http
            .post(format!("{HF_INFERENCE_BASE_URL}/{}", self.model))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Http(format!(
                "huggingface inference status={status} body={body}"
            )));
        }

        let parsed: Vec<HfGeneration> = serde_json::from_str(&body)?;
        let text = parsed
            .into_iter()
            .next()
            .map(|generation| generation.generated_text)
            .ok_or_else(|| {
                LlmError::ResponseFormat("huggingface response missing generations".to_string())
            })?;

        // The inference API reports no token usage.
        Ok(ChatResponse {
            message: ChatMessage::assistant(text),
            usage: Usage::default(),
            finish_reason: "stop".to_string(),
        })
    }
}

/// The text-generation inference endpoint takes one raw prompt, so the
/// transcript is flattened into paragraph-separated turns.
fn flatten_prompt(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .map(|m| m.content.as_str())
        .filter(|content| !content.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Serialize)]
struct HfRequest {
    inputs: String,
}

#[derive(Debug, Deserialize)]
struct HfGeneration {
    #[serde(default)]
    generated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_flattens_nonempty_turns() {
        let messages = vec![
            ChatMessage::system("be brief"),
            ChatMessage::user(""),
            ChatMessage::user("finish this sentence"),
        ];
        assert_eq!(flatten_prompt(&messages), "be brief\n\nfinish this sentence");
    }

    #[test]
    fn generations_parse_as_a_list() {
        let body = r#"[{"generated_text": "the quick brown fox"}]"#;
        let parsed: Vec<HfGeneration> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed[0].generated_text, "the quick brown fox");
    }
}
