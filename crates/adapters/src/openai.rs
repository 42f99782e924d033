use std::time::Duration;

use ar7_core::{ChatMessage, GenerationParams, LanguageModel, LanguageModelError};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::http::{build_client, non_empty, send_json};
use crate::params::adapt_params;
use crate::provider::ProviderKind;

/// Chat-completions adapter shared by every OpenAI-compatible provider.
pub struct OpenAiCompatibleAdapter {
    client: Client,
    url: String,
    api_key: String,
    provider: ProviderKind,
    model: String,
    timeout: Duration,
}

impl OpenAiCompatibleAdapter {
    pub fn new(
        provider: ProviderKind,
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        if base_url.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "base_url must not be empty".to_string(),
            ));
        }
        if model.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "model name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: build_client(timeout)?,
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            provider,
            model,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_body<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        params: &GenerationParams,
    ) -> ChatCompletionRequest<'a> {
        let wire = adapt_params(self.provider, &self.model, params);
        ChatCompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|message| ChatMessageRequest {
                    role: message.role.as_str(),
                    content: &message.content,
                })
                .collect(),
            temperature: wire.temperature,
            max_tokens: wire.max_tokens,
            max_completion_tokens: wire.max_completion_tokens,
            response_format: wire.json_response.then_some(ResponseFormat {
                kind: "json_object",
            }),
        }
    }

    fn invoke_once(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, AdapterError> {
        let body = self.request_body(messages, params);
        let request = self.client.post(&self.url).bearer_auth(&self.api_key);
        let parsed: ChatCompletionResponse = send_json(request, &body, self.timeout)?;
        extract_choice_content(parsed).ok_or(AdapterError::EmptyResponse)
    }
}

impl LanguageModel for OpenAiCompatibleAdapter {
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
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessageRequest<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatReply>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

fn extract_choice_content(response: ChatCompletionResponse) -> Option<String> {
    for choice in response.choices {
        if choice.finish_reason.as_deref() == Some("length") {
            log::warn!("chat completion truncated at max_tokens");
        }
        let content = choice
            .message
            .and_then(|message| message.content)
            .or(choice.text);
        if let Some(content) = content.and_then(|c| non_empty(c).ok()) {
            return Some(content);
        }
    }
    None
}
