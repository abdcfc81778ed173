use crate::error::{LlmError, Result};
use crate::sse::decode_sse;
use crate::types::{ChatMessage, ChatResponse, Role, StreamChunk, Usage};
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

#[derive(Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client, api_key: &str, model: &str) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse> {
        let req = AnthropicRequest::new(&self.model, messages, false);

        let response = self
            .http
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(LlmError::Http(format!(
                "anthropic chat status={status} body={body}"
            )));
        }

        let parsed: AnthropicResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_chat_response())
    }

    #[tracing::instrument(level = "info", skip_all)]
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>> {
        let req = AnthropicRequest::new(&self.model, messages, true);

        let response = self
            .http
            .post(ANTHROPIC_MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http(format!(
                "anthropic stream status={status} body={body}"
            )));
        }

        let sse = Box::pin(decode_sse(response.bytes_stream()));

        let stream = futures_util::stream::unfold(
            (sse, Usage::default()),
            |(mut sse, mut usage)| async move {
                loop {
                    let next = sse.as_mut().next().await?;
                    let (event, data) = match next {
                        Ok(v) => v,
                        Err(e) => return Some((Err(e), (sse, usage))),
                    };

                    match event.as_str() {
                        "message_start" => {
                            if let Ok(v) = serde_json::from_str::<AnthropicMessageStart>(&data) {
                                usage.prompt_tokens = v.message.usage.input_tokens;
                                usage.completion_tokens = v.message.usage.output_tokens;
                            }
                        }
                        "content_block_delta" => {
                            let v: AnthropicContentBlockDelta = match serde_json::from_str(&data) {
                                Ok(v) => v,
                                Err(e) => {
                                    return Some((
                                        Err(LlmError::StreamParse(format!(
                                            "anthropic delta json error={e} data={data}"
                                        ))),
                                        (sse, usage),
                                    ));
                                }
                            };
                            if !v.delta.text.is_empty() {
                                return Some((
                                    Ok(StreamChunk::Delta {
                                        content: v.delta.text,
                                    }),
                                    (sse, usage),
                                ));
                            }
                        }
                        "message_delta" => {
                            if let Ok(v) = serde_json::from_str::<AnthropicMessageDelta>(&data) {
                                if let Some(u) = v.usage {
                                    usage.prompt_tokens = u.input_tokens;
                                    usage.completion_tokens = u.output_tokens;
                                }
                            }
                        }
                        "message_stop" => {
                            let done = usage.clone();
                            return Some((Ok(StreamChunk::Done { usage: done }), (sse, usage)));
                        }
                        _ => {}
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

impl AnthropicRequest {
    /// System messages are collected into the top-level `system` field; the
    /// remaining turns keep their order.
    fn new(model: &str, messages: &[ChatMessage], stream: bool) -> Self {
        let mut system = String::new();
        let mut out_messages = Vec::new();

        for m in messages {
            match m.role {
                Role::System => {
                    if !system.is_empty() {
                        system.push('\n');
                    }
                    system.push_str(m.content.trim());
                }
                Role::User => out_messages.push(AnthropicMessage {
                    role: "user".to_string(),
                    content: m.content.clone(),
                }),
                Role::Assistant => out_messages.push(AnthropicMessage {
                    role: "assistant".to_string(),
                    content: m.content.clone(),
                }),
            }
        }

        Self {
            model: model.to_string(),
            max_tokens: MAX_TOKENS,
            system,
            messages: out_messages,
            stream: if stream { Some(true) } else { None },
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<AnthropicContentBlock>,
    #[serde(default)]
    stop_reason: String,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl AnthropicResponse {
    fn into_chat_response(self) -> ChatResponse {
        let mut content = String::new();
        for block in self.content {
            if block.kind == "text" {
                content.push_str(&block.text);
            }
        }

        ChatResponse {
            message: ChatMessage {
                role: Role::Assistant,
                content,
            },
            usage: Usage {
                prompt_tokens: self.usage.input_tokens,
                completion_tokens: self.usage.output_tokens,
            },
            finish_reason: self.stop_reason,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageStart {
    message: AnthropicMessageStartMessage,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageStartMessage {
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlockDelta {
    delta: AnthropicDelta,
}

#[derive(Debug, Deserialize)]
struct AnthropicDelta {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicMessageDelta {
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_collapse_into_the_system_field() {
        let messages = vec![
            ChatMessage::system("first rule"),
            ChatMessage::user("hello"),
            ChatMessage::system("second rule"),
            ChatMessage::assistant("hi"),
        ];
        let req = AnthropicRequest::new("claude-3-opus", &messages, false);

        assert_eq!(req.system, "first rule\nsecond rule");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "user");
        assert_eq!(req.messages[1].role, "assistant");
        assert!(req.stream.is_none());
    }

    #[test]
    fn response_concatenates_text_blocks() {
        let body = r#"{
            "content": [
                {"type": "text", "text": "hello "},
                {"type": "tool_use", "id": "x", "name": "n", "input": {}},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 4}
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(body).unwrap();
        let response = parsed.into_chat_response();

        assert_eq!(response.message.content, "hello world");
        assert_eq!(response.usage.prompt_tokens, 10);
        assert_eq!(response.usage.completion_tokens, 4);
        assert_eq!(response.finish_reason, "end_turn");
    }
}
