//! Compatibility shim: parameters a provider or model family rejects are
//! dropped (or renamed) here instead of failing the call.

use ar7_core::GenerationParams;
use log::debug;

use crate::provider::ProviderKind;

/// Parameters as they go on the wire for one provider/model pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WireParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Sent instead of `max_tokens` by OpenAI reasoning models.
    pub max_completion_tokens: Option<u32>,
    pub json_response: bool,
}

pub fn is_reasoning_model(model: &str) -> bool {
    let model = model.to_ascii_lowercase();
    ["gpt-5", "o1", "o3", "o4"]
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

pub fn adapt_params(provider: ProviderKind, model: &str, params: &GenerationParams) -> WireParams {
    let mut wire = WireParams {
        temperature: params.temperature,
        max_tokens: params.max_tokens,
        max_completion_tokens: None,
        json_response: params.json_response,
    };

    let ceiling = provider.max_tokens_ceiling();
    if let Some(requested) = wire.max_tokens.filter(|tokens| *tokens > ceiling) {
        debug!("{provider}/{model}: clamping max_tokens {requested} to {ceiling}");
        wire.max_tokens = Some(ceiling);
    }

    if provider == ProviderKind::OpenAi && is_reasoning_model(model) {
        if let Some(temperature) = wire.temperature.take() {
            debug!("{provider}/{model}: dropping unsupported temperature {temperature}");
        }
        wire.max_completion_tokens = wire.max_tokens.take();
    }

    if wire.json_response && !provider.supports_json_response() {
        debug!("{provider}/{model}: dropping unsupported JSON response format");
        wire.json_response = false;
    }

    wire
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_models_lose_temperature() {
        let wire = adapt_params(
            ProviderKind::OpenAi,
            "gpt-5-mini",
            &GenerationParams::new(0.3, 12000),
        );
        assert_eq!(wire.temperature, None);
        assert_eq!(wire.max_tokens, None);
        assert_eq!(wire.max_completion_tokens, Some(12000));
    }

    #[test]
    fn max_tokens_is_clamped() {
        let wire = adapt_params(
            ProviderKind::DeepInfra,
            "Qwen/Qwen2.5-7B-Instruct",
            &GenerationParams::new(0.3, 35000),
        );
        assert_eq!(wire.temperature, Some(0.3));
        assert_eq!(wire.max_tokens, Some(16000));
        assert_eq!(wire.max_completion_tokens, None);
    }

    #[test]
    fn json_mode_only_where_supported() {
        let params = GenerationParams::new(0.2, 4000).json();
        assert!(adapt_params(ProviderKind::Gemini, "gemini-2.5-pro", &params).json_response);
        assert!(adapt_params(ProviderKind::Xai, "grok-3-latest", &params).json_response);
        assert!(!adapt_params(ProviderKind::Anthropic, "claude-haiku-4-5", &params).json_response);
        assert!(!adapt_params(ProviderKind::Mistral, "mistral-large", &params).json_response);
    }

    #[test]
    fn non_openai_provider_keeps_temperature_for_o_named_models() {
        let wire = adapt_params(
            ProviderKind::TogetherAi,
            "o1-lookalike",
            &GenerationParams::new(0.5, 100),
        );
        assert_eq!(wire.temperature, Some(0.5));
    }
}
