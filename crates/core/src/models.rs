use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Lite,
    Full,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Lite => "lite",
            Tier::Full => "full",
        }
    }

    /// Pause between successive chapters of one model.
    pub fn default_delay_secs(&self) -> u64 {
        match self {
            Tier::Lite => 1,
            Tier::Full => 2,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tier {
    type Err = ModelRegistryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lite" | "flash" | "validation" => Ok(Tier::Lite),
            "full" | "premium" | "complete" => Ok(Tier::Full),
            other => Err(ModelRegistryError::UnknownTier(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelRegistryError {
    #[error("unknown model id `{0}`")]
    UnknownModel(String),
    #[error("unknown tier `{0}` (expected lite or full)")]
    UnknownTier(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub id: String,
    /// Provider-qualified model name such as `openai/gpt-5-mini`.
    pub name: String,
    pub provider: String,
    pub nation: String,
    pub company: String,
    pub tier: Tier,
}

struct DefaultModel {
    id: &'static str,
    lite: &'static str,
    full: &'static str,
    provider: &'static str,
    nation: &'static str,
    company: &'static str,
}

const AR7_MODELS: &[DefaultModel] = &[
    DefaultModel {
        id: "openai_gpt5",
        lite: "openai/gpt-5-mini",
        full: "openai/gpt-5",
        provider: "USA - OpenAI",
        nation: "USA",
        company: "OpenAI",
    },
    DefaultModel {
        id: "anthropic_haiku45",
        lite: "anthropic/claude-haiku-4-5-20251001",
        full: "anthropic/claude-sonnet-4-20250514",
        provider: "USA - Anthropic",
        nation: "USA",
        company: "Anthropic",
    },
    DefaultModel {
        id: "xai_grok3",
        lite: "xai/grok-3-latest",
        full: "xai/grok-3-latest",
        provider: "USA - xAI (Elon Musk)",
        nation: "USA",
        company: "xAI",
    },
    DefaultModel {
        id: "google_gemini",
        lite: "gemini/gemini-2.5-flash",
        full: "gemini/gemini-2.5-pro",
        provider: "USA - Google",
        nation: "USA",
        company: "Google",
    },
    DefaultModel {
        id: "deepseek",
        lite: "huggingface/deepseek-ai/DeepSeek-R1-Distill-Qwen-7B",
        full: "huggingface/deepseek-ai/DeepSeek-R1-Distill-Qwen-32B",
        provider: "China - DeepSeek",
        nation: "China",
        company: "DeepSeek",
    },
    DefaultModel {
        id: "mistral",
        lite: "deepinfra/mistralai/Mistral-7B-Instruct-v0.3",
        full: "deepinfra/mistralai/Mixtral-8x7B-Instruct-v0.1",
        provider: "Europe - Mistral (France)",
        nation: "France",
        company: "Mistral AI",
    },
    DefaultModel {
        id: "qwen",
        lite: "deepinfra/Qwen/Qwen2.5-7B-Instruct",
        full: "deepinfra/Qwen/QwQ-32B-Preview",
        provider: "China - Qwen (Alibaba)",
        nation: "China",
        company: "Alibaba",
    },
];

/// Ordered, immutable set of models taking part in a run.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    models: Vec<ModelSpec>,
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelSpec>) -> Self {
        Self { models }
    }

    pub fn ar7_defaults(tier: Tier) -> Self {
        let models = AR7_MODELS
            .iter()
            .map(|model| ModelSpec {
                id: model.id.to_string(),
                name: match tier {
                    Tier::Lite => model.lite,
                    Tier::Full => model.full,
                }
                .to_string(),
                provider: model.provider.to_string(),
                nation: model.nation.to_string(),
                company: model.company.to_string(),
                tier,
            })
            .collect();
        Self { models }
    }

    pub fn get(&self, id: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|model| model.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|model| model.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn as_slice(&self) -> &[ModelSpec] {
        &self.models
    }

    /// Narrows the registry to `ids`, keeping registry order.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Result<Self, ModelRegistryError> {
        for id in ids {
            if self.get(id.as_ref()).is_none() {
                return Err(ModelRegistryError::UnknownModel(id.as_ref().to_string()));
            }
        }
        let models = self
            .models
            .iter()
            .filter(|model| ids.iter().any(|id| id.as_ref() == model.id))
            .cloned()
            .collect();
        Ok(Self { models })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_names_by_tier() {
        let lite = ModelRegistry::ar7_defaults(Tier::Lite);
        let full = ModelRegistry::ar7_defaults(Tier::Full);

        assert_eq!(lite.len(), 7);
        assert_eq!(
            lite.get("openai_gpt5").map(|m| m.name.as_str()),
            Some("openai/gpt-5-mini")
        );
        assert_eq!(
            full.get("google_gemini").map(|m| m.name.as_str()),
            Some("gemini/gemini-2.5-pro")
        );
        assert!(full.iter().all(|m| m.tier == Tier::Full));
    }

    #[test]
    fn select_keeps_registry_order() {
        let registry = ModelRegistry::ar7_defaults(Tier::Lite);
        let picked = registry.select(&["qwen", "openai_gpt5"]).unwrap();
        let ids: Vec<&str> = picked.ids().collect();
        assert_eq!(ids, vec!["openai_gpt5", "qwen"]);
    }

    #[test]
    fn select_rejects_unknown_ids() {
        let registry = ModelRegistry::ar7_defaults(Tier::Lite);
        let err = registry.select(&["llama"]).unwrap_err();
        assert_eq!(err, ModelRegistryError::UnknownModel("llama".into()));
    }

    #[test]
    fn tier_aliases_parse() {
        assert_eq!("premium".parse::<Tier>().unwrap(), Tier::Full);
        assert_eq!("Flash".parse::<Tier>().unwrap(), Tier::Lite);
        assert!("medium".parse::<Tier>().is_err());
    }
}
