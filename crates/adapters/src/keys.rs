//! One-sentence request per model to confirm its key and parameters work.

use std::time::{Duration, Instant};

use ar7_core::{
    ChatMessage, GenerationParams, LanguageModelError, LanguageModelProvider, LogLevel, LogRecord,
    LogSink, ModelSpec,
};
use serde::{Deserialize, Serialize};

use crate::error::{AdapterError, FailureCategory};

pub const KEY_TEST_PROMPT: &str = "Write a single sentence about climate change.";
pub const KEY_TEST_MAX_TOKENS: u32 = 50;
pub const KEY_TEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const KEY_TEST_RESULTS_FILE: &str = "api_key_test_results.json";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyTestResult {
    pub model_id: String,
    pub model_name: String,
    pub provider: String,
    pub success: bool,
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<FailureCategory>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyTestReport {
    pub tested_at: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<KeyTestResult>,
}

impl KeyTestReport {
    pub fn new(tested_at: impl Into<String>, results: Vec<KeyTestResult>) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            tested_at: tested_at.into(),
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}

/// Sorts a provider failure into a smoke-test bucket. Adapter errors carry
/// enough structure to classify; anything else falls back to its message.
pub fn categorize(err: &LanguageModelError) -> FailureCategory {
    match err.downcast_ref::<AdapterError>() {
        Some(adapter) => adapter.category(),
        None => FailureCategory::from_message(&err.to_string()),
    }
}

pub fn test_model(provider: &dyn LanguageModelProvider, spec: &ModelSpec) -> KeyTestResult {
    let started = Instant::now();
    let outcome = provider.model(&spec.name).and_then(|model| {
        model.invoke(
            &[ChatMessage::user(KEY_TEST_PROMPT)],
            &GenerationParams {
                temperature: None,
                max_tokens: Some(KEY_TEST_MAX_TOKENS),
                json_response: false,
            },
        )
    });
    let duration = started.elapsed().as_secs_f64();

    let mut result = KeyTestResult {
        model_id: spec.id.clone(),
        model_name: spec.name.clone(),
        provider: spec.provider.clone(),
        success: false,
        duration,
        response: None,
        error: None,
        category: None,
    };
    match outcome {
        Ok(text) => {
            result.success = true;
            result.response = Some(text.trim().to_string());
        }
        Err(err) => {
            result.category = Some(categorize(&err));
            result.error = Some(err.to_string());
        }
    }
    result
}

pub fn test_models(
    provider: &dyn LanguageModelProvider,
    specs: &[ModelSpec],
    sink: &dyn LogSink,
    tested_at: &str,
) -> KeyTestReport {
    let results = specs
        .iter()
        .map(|spec| {
            let result = test_model(provider, spec);
            let record = match (&result.error, result.category) {
                (Some(error), Some(category)) => LogRecord::new(
                    LogLevel::Error,
                    format!("{} ({}): {} - {error}", spec.id, spec.name, category.label()),
                ),
                _ => LogRecord::new(
                    LogLevel::Info,
                    format!("{} ({}): ok in {:.1}s", spec.id, spec.name, result.duration),
                ),
            };
            sink.log(record);
            result
        })
        .collect();
    KeyTestReport::new(tested_at, results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ar7_core::{LanguageModel, ModelRegistry, Tier, VecLogSink};
    use reqwest::StatusCode;

    struct Canned;

    struct Echo;

    impl LanguageModel for Echo {
        fn invoke(
            &self,
            messages: &[ChatMessage],
            params: &GenerationParams,
        ) -> Result<String, LanguageModelError> {
            assert_eq!(params.max_tokens, Some(KEY_TEST_MAX_TOKENS));
            Ok(format!(" {} ", messages[0].content))
        }
    }

    impl LanguageModelProvider for Canned {
        fn model(&self, name: &str) -> Result<Box<dyn LanguageModel>, LanguageModelError> {
            if name.starts_with("openai/") {
                Err(LanguageModelError::new(AdapterError::MissingCredential {
                    provider: "openai".into(),
                    key: "OPENAI_API_KEY".into(),
                }))
            } else if name.starts_with("xai/") {
                Err(LanguageModelError::new(AdapterError::HttpStatus {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    body: "slow down".into(),
                }))
            } else {
                Ok(Box::new(Echo))
            }
        }
    }

    #[test]
    fn report_tallies_and_categorises() {
        let registry = ModelRegistry::ar7_defaults(Tier::Lite)
            .select(&["openai_gpt5", "xai_grok3", "qwen"])
            .unwrap();
        let sink = VecLogSink::new();
        let report = test_models(&Canned, registry.as_slice(), &sink, "now");

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 1);
        assert!(!report.all_passed());
        assert_eq!(
            report.results[0].category,
            Some(FailureCategory::Authentication)
        );
        assert_eq!(report.results[1].category, Some(FailureCategory::RateLimit));
        assert_eq!(report.results[2].response.as_deref(), Some(KEY_TEST_PROMPT));
        assert_eq!(sink.count(LogLevel::Error), 2);
        assert_eq!(sink.records().len(), 3);
    }

    #[test]
    fn foreign_errors_fall_back_to_message() {
        let err = LanguageModelError::msg("request timed out");
        assert_eq!(categorize(&err), FailureCategory::Timeout);
    }

    #[test]
    fn category_serialises_with_readable_label() {
        let json = serde_json::to_string(&FailureCategory::ParameterRestriction).unwrap();
        assert_eq!(json, "\"Parameter Restriction\"");
    }
}
