use std::fmt;

use crate::error::AdapterError;

/// Wire protocol spoken by a provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiFamily {
    OpenAiCompatible,
    Anthropic,
    Gemini,
}

/// Provider tag taken from the prefix of a model name (`deepinfra/Qwen/...`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Xai,
    DeepInfra,
    TogetherAi,
    HuggingFace,
    DeepSeek,
    Mistral,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 9] = [
        ProviderKind::OpenAi,
        ProviderKind::Xai,
        ProviderKind::DeepInfra,
        ProviderKind::TogetherAi,
        ProviderKind::HuggingFace,
        ProviderKind::DeepSeek,
        ProviderKind::Mistral,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Xai => "xai",
            Self::DeepInfra => "deepinfra",
            Self::TogetherAi => "together_ai",
            Self::HuggingFace => "huggingface",
            Self::DeepSeek => "deepseek",
            Self::Mistral => "mistral",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    pub fn family(&self) -> ApiFamily {
        match self {
            Self::Anthropic => ApiFamily::Anthropic,
            Self::Gemini => ApiFamily::Gemini,
            _ => ApiFamily::OpenAiCompatible,
        }
    }

    pub fn credential_key(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Xai => "XAI_API_KEY",
            Self::DeepInfra => "DEEPINFRA_API_KEY",
            Self::TogetherAi => "TOGETHER_AI_API_KEY",
            Self::HuggingFace => "HUGGINGFACE_API_KEY",
            Self::DeepSeek => "DEEPSEEK_API_KEY",
            Self::Mistral => "MISTRAL_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Xai => "https://api.x.ai/v1",
            Self::DeepInfra => "https://api.deepinfra.com/v1/openai",
            Self::TogetherAi => "https://api.together.xyz/v1",
            Self::HuggingFace => "https://router.huggingface.co/v1",
            Self::DeepSeek => "https://api.deepseek.com/v1",
            Self::Mistral => "https://api.mistral.ai/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
        }
    }

    /// Version segment appended to an override URL that carries none.
    pub fn api_version(&self) -> &'static str {
        match self {
            Self::Gemini => "v1beta",
            _ => "v1",
        }
    }

    pub fn supports_json_response(&self) -> bool {
        matches!(self, Self::OpenAi | Self::Xai | Self::Gemini)
    }

    pub fn max_tokens_ceiling(&self) -> u32 {
        match self {
            Self::HuggingFace | Self::DeepSeek => 8192,
            _ => 16000,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A provider-qualified model name split into its provider and the model id
/// the provider expects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelRoute {
    pub provider: ProviderKind,
    pub model: String,
}

impl ModelRoute {
    pub fn parse(name: &str) -> Result<Self, AdapterError> {
        let name = name.trim();
        let (tag, model) = name
            .split_once('/')
            .ok_or_else(|| AdapterError::UnknownProvider(name.to_string()))?;
        let provider =
            ProviderKind::from_tag(tag).ok_or_else(|| AdapterError::UnknownProvider(tag.to_string()))?;
        if model.trim().is_empty() {
            return Err(AdapterError::InvalidConfig(format!(
                "model name `{name}` has no model after the provider tag"
            )));
        }
        Ok(Self {
            provider,
            model: model.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_credential_key_is_read_from_the_environment() {
        for kind in ProviderKind::ALL {
            assert!(
                ar7_core::PROVIDER_KEYS.contains(&kind.credential_key()),
                "{kind} key not loaded"
            );
        }
    }

    #[test]
    fn splits_on_first_slash_only() {
        let route = ModelRoute::parse("deepinfra/Qwen/Qwen2.5-7B-Instruct").unwrap();
        assert_eq!(route.provider, ProviderKind::DeepInfra);
        assert_eq!(route.model, "Qwen/Qwen2.5-7B-Instruct");
    }

    #[test]
    fn rejects_unknown_and_untagged_names() {
        assert!(matches!(
            ModelRoute::parse("replicate/falcon"),
            Err(AdapterError::UnknownProvider(tag)) if tag == "replicate"
        ));
        assert!(matches!(
            ModelRoute::parse("gpt-5"),
            Err(AdapterError::UnknownProvider(_))
        ));
        assert!(matches!(
            ModelRoute::parse("openai/"),
            Err(AdapterError::InvalidConfig(_))
        ));
    }

    #[test]
    fn families_and_json_support() {
        assert_eq!(ProviderKind::Anthropic.family(), ApiFamily::Anthropic);
        assert_eq!(ProviderKind::Gemini.family(), ApiFamily::Gemini);
        assert_eq!(ProviderKind::Mistral.family(), ApiFamily::OpenAiCompatible);
        assert!(ProviderKind::Xai.supports_json_response());
        assert!(!ProviderKind::DeepInfra.supports_json_response());
        assert_eq!(ProviderKind::from_tag("Together_AI"), Some(ProviderKind::TogetherAi));
    }
}
