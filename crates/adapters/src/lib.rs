mod anthropic;
mod endpoint;
mod error;
mod gemini;
mod http;
pub mod keys;
mod openai;
mod params;
mod provider;
mod registry;
mod render;

pub use anthropic::AnthropicAdapter;
pub use endpoint::{normalize_base_url, resolve_base_url};
pub use error::{AdapterError, FailureCategory};
pub use gemini::GeminiAdapter;
pub use keys::{KeyTestReport, KeyTestResult};
pub use openai::OpenAiCompatibleAdapter;
pub use params::{adapt_params, is_reasoning_model, WireParams};
pub use provider::{ApiFamily, ModelRoute, ProviderKind};
pub use registry::ProviderRegistry;
pub use render::PandocRenderer;
