use std::collections::BTreeMap;
use std::time::Duration;

use ar7_core::{Config, Credentials, LanguageModel, LanguageModelError, LanguageModelProvider};
use log::debug;

use crate::anthropic::AnthropicAdapter;
use crate::endpoint::resolve_base_url;
use crate::error::AdapterError;
use crate::gemini::GeminiAdapter;
use crate::openai::OpenAiCompatibleAdapter;
use crate::provider::{ApiFamily, ModelRoute, ProviderKind};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Builds an adapter for a provider-qualified model name. The provider is
/// resolved once, when the model is built.
#[derive(Clone, Debug)]
pub struct ProviderRegistry {
    credentials: Credentials,
    endpoints: BTreeMap<String, String>,
    timeout: Duration,
}

impl ProviderRegistry {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Endpoint overrides and the generation timeout come from `config`.
    pub fn from_config(config: &Config, credentials: Credentials) -> Self {
        Self {
            credentials,
            endpoints: config.endpoints.clone(),
            timeout: config.generation.request_timeout(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_endpoint(mut self, provider: &str, base_url: impl Into<String>) -> Self {
        self.endpoints.insert(provider.to_string(), base_url.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn base_url(&self, provider: ProviderKind) -> String {
        resolve_base_url(
            provider,
            self.endpoints.get(provider.tag()).map(String::as_str),
        )
    }

    pub fn api_key(&self, provider: ProviderKind) -> Result<String, AdapterError> {
        let key = provider.credential_key();
        self.credentials
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::MissingCredential {
                provider: provider.tag().to_string(),
                key: key.to_string(),
            })
    }

    pub fn build(&self, name: &str) -> Result<Box<dyn LanguageModel>, AdapterError> {
        let route = ModelRoute::parse(name)?;
        let api_key = self.api_key(route.provider)?;
        let base_url = self.base_url(route.provider);
        debug!(
            "building {} adapter for `{}` at {base_url}",
            route.provider, route.model
        );

        match route.provider.family() {
            ApiFamily::OpenAiCompatible => Ok(Box::new(OpenAiCompatibleAdapter::new(
                route.provider,
                &base_url,
                api_key,
                route.model,
                self.timeout,
            )?)),
            ApiFamily::Anthropic => Ok(Box::new(AnthropicAdapter::new(
                &base_url,
                api_key,
                route.model,
                self.timeout,
            )?)),
            ApiFamily::Gemini => Ok(Box::new(GeminiAdapter::new(
                &base_url,
                api_key,
                route.model,
                self.timeout,
            )?)),
        }
    }
}

impl LanguageModelProvider for ProviderRegistry {
    fn model(&self, name: &str) -> Result<Box<dyn LanguageModel>, LanguageModelError> {
        self.build(name).map_err(LanguageModelError::new)
    }
}
