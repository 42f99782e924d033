use std::time::Duration;

use ar7_core::{ChatMessage, GenerationParams, LanguageModel, LanguageModelError, Role};
use log::warn;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::http::{build_client, non_empty, send_json};
use crate::params::adapt_params;
use crate::provider::ProviderKind;

const ANTHROPIC_VERSION: &str = "2023-06-01";
/// The Messages API requires `max_tokens`.
const DEFAULT_MAX_TOKENS: u32 = 4096;

pub struct AnthropicAdapter {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl AnthropicAdapter {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        if model.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "Anthropic model name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: build_client(timeout)?,
            url: format!("{}/messages", base_url.trim_end_matches('/')),
            api_key,
            model,
            timeout,
        })
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        params: &GenerationParams,
    ) -> MessagesRequest<'a> {
        let wire = adapt_params(ProviderKind::Anthropic, &self.model, params);
        let system: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        MessagesRequest {
            model: &self.model,
            max_tokens: wire.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| MessageRequest {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: wire.temperature,
        }
    }

    fn invoke_once(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, AdapterError> {
        let body = self.request_body(messages, params);
        let request = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let parsed: MessagesResponse = send_json(request, &body, self.timeout)?;
        parse_messages_response(parsed)
    }
}

impl LanguageModel for AnthropicAdapter {
    fn invoke(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, LanguageModelError> {
        self.invoke_once(messages, params)
            .map_err(LanguageModelError::new)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<MessageRequest<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

fn parse_messages_response(response: MessagesResponse) -> Result<String, AdapterError> {
    if response.stop_reason.as_deref() == Some("max_tokens") {
        warn!("Anthropic response truncated due to max_tokens limit");
    }
    let text: String = response
        .content
        .into_iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text),
            ContentBlock::Other => None,
        })
        .collect();
    non_empty(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> AnthropicAdapter {
        AnthropicAdapter::new(
            ProviderKind::Anthropic.default_base_url(),
            "key".into(),
            "claude-haiku-4-5-20251001".into(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn system_messages_move_to_top_level() {
        let adapter = adapter();
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let body = serde_json::to_value(
            adapter.request_body(&messages, &GenerationParams::new(0.5, 35000).json()),
        )
        .unwrap();
        assert_eq!(
            body,
            json!({
                "model": "claude-haiku-4-5-20251001",
                "max_tokens": 16000,
                "system": "be brief",
                "messages": [{"role": "user", "content": "hi"}],
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn text_blocks_are_joined() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn"
        }))
        .unwrap();
        assert_eq!(parse_messages_response(response).unwrap(), "Hello world");
    }

    #[test]
    fn empty_content_is_an_error() {
        let response: MessagesResponse =
            serde_json::from_value(json!({"content": []})).unwrap();
        assert!(matches!(
            parse_messages_response(response),
            Err(AdapterError::EmptyResponse)
        ));
    }
}
