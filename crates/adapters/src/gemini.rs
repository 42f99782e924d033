use std::time::Duration;

use ar7_core::{ChatMessage, GenerationParams, LanguageModel, LanguageModelError, Role};
use log::warn;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::http::{build_client, non_empty, send_json};
use crate::params::adapt_params;
use crate::provider::ProviderKind;

pub struct GeminiAdapter {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl GeminiAdapter {
    pub fn new(
        base_url: &str,
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        if model.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(
                "Gemini model name must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client: build_client(timeout)?,
            url: format!(
                "{}/models/{model}:generateContent",
                base_url.trim_end_matches('/')
            ),
            api_key,
            model,
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_body<'a>(
        &self,
        messages: &'a [ChatMessage],
        params: &GenerationParams,
    ) -> GeminiRequest<'a> {
        let wire = adapt_params(ProviderKind::Gemini, &self.model, params);
        let system_parts: Vec<GeminiRequestPart<'a>> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| GeminiRequestPart { text: &m.content })
            .collect();

        GeminiRequest {
            system_instruction: (!system_parts.is_empty()).then_some(GeminiSystemInstruction {
                parts: system_parts,
            }),
            contents: messages
                .iter()
                .filter(|m| m.role != Role::System)
                .map(|m| GeminiRequestContent {
                    role: if m.role == Role::Assistant {
                        "model"
                    } else {
                        "user"
                    },
                    parts: vec![GeminiRequestPart { text: &m.content }],
                })
                .collect(),
            generation_config: GeminiGenerationConfig {
                max_output_tokens: wire.max_tokens,
                temperature: wire.temperature,
                response_mime_type: wire.json_response.then_some("application/json"),
            },
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
            .header("x-goog-api-key", &self.api_key);
        let parsed: GeminiResponse = send_json(request, &body, self.timeout)?;
        parse_gemini_response(parsed)
    }
}

impl LanguageModel for GeminiAdapter {
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
struct GeminiRequest<'a> {
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction<'a>>,
    contents: Vec<GeminiRequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiSystemInstruction<'a> {
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestContent<'a> {
    role: &'static str,
    parts: Vec<GeminiRequestPart<'a>>,
}

#[derive(Serialize)]
struct GeminiRequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens", skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text { text: String },
    Other(serde_json::Value),
}

fn parse_gemini_response(response: GeminiResponse) -> Result<String, AdapterError> {
    for candidate in response.candidates {
        match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => warn!("Gemini response truncated due to max_tokens limit"),
            Some("SAFETY") => warn!("Gemini response blocked by safety filters"),
            Some("RECITATION") => warn!("Gemini response blocked due to recitation concerns"),
            _ => {}
        }

        if let Some(content) = candidate.content {
            let text: String = content
                .parts
                .into_iter()
                .filter_map(|part| match part {
                    GeminiPart::Text { text } => Some(text),
                    GeminiPart::Other(_) => None,
                })
                .collect();
            if let Ok(text) = non_empty(text) {
                return Ok(text);
            }
        }
    }

    Err(AdapterError::EmptyResponse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::new(
            ProviderKind::Gemini.default_base_url(),
            "key".into(),
            "gemini-2.5-pro".into(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn api_key_stays_out_of_the_url() {
        let adapter = adapter();
        assert_eq!(
            adapter.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-pro:generateContent"
        );
        assert!(!adapter.url().contains("key"));
    }

    #[test]
    fn request_uses_system_instruction_and_json_mime_type() {
        let adapter = adapter();
        let messages = vec![ChatMessage::system("grade it"), ChatMessage::user("text")];
        let body = serde_json::to_value(
            adapter.request_body(&messages, &GenerationParams::new(0.25, 8192).json()),
        )
        .unwrap();
        assert_eq!(
            body,
            json!({
                "systemInstruction": {"parts": [{"text": "grade it"}]},
                "contents": [{"role": "user", "parts": [{"text": "text"}]}],
                "generationConfig": {
                    "maxOutputTokens": 8192,
                    "temperature": 0.25,
                    "responseMimeType": "application/json"
                }
            })
        );
    }

    #[test]
    fn skips_candidates_without_text() {
        let response: GeminiResponse = serde_json::from_value(json!({
            "candidates": [
                {"content": {"parts": [{"inlineData": {}}]}, "finishReason": "SAFETY"},
                {"content": {"parts": [{"text": "{\"ok\": "}, {"text": "true}"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(parse_gemini_response(response).unwrap(), "{\"ok\": true}");
    }

    #[test]
    fn no_candidates_is_empty_response() {
        let response: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(
            parse_gemini_response(response),
            Err(AdapterError::EmptyResponse)
        ));
    }
}
