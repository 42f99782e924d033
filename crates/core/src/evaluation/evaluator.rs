use chrono::Utc;

use super::verdict::{truncate_words, EvaluationKind, EvaluationVerdict};
use super::EvaluationError;
use crate::config::EvaluationSettings;
use crate::generation::{chapter_title, count_words};
use crate::llm::{ChatMessage, GenerationParams, LanguageModel};
use crate::prompts::{PromptArguments, RubricRegistry, FACT_CHECK_RUBRIC, QUALITY_RUBRIC};

/// One chapter to grade plus any optional rubric context
/// (`generation_stats`, `fact_check_summary`, `comparison_word_counts`).
#[derive(Clone, Debug)]
pub struct EvaluationRequest<'r> {
    pub kind: EvaluationKind,
    pub model_id: &'r str,
    pub chapter_key: &'r str,
    pub content: &'r str,
    pub context: PromptArguments,
}

impl<'r> EvaluationRequest<'r> {
    pub fn new(
        kind: EvaluationKind,
        model_id: &'r str,
        chapter_key: &'r str,
        content: &'r str,
    ) -> Self {
        Self {
            kind,
            model_id,
            chapter_key,
            content,
            context: PromptArguments::new(),
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<String>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }
}

/// Submits chapter text with a rubric to the grading model.
pub struct Evaluator<'a> {
    model: &'a dyn LanguageModel,
    model_name: String,
    rubrics: &'a RubricRegistry,
    settings: &'a EvaluationSettings,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        model_name: impl Into<String>,
        rubrics: &'a RubricRegistry,
        settings: &'a EvaluationSettings,
    ) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            rubrics,
            settings,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn settings(&self) -> &EvaluationSettings {
        self.settings
    }

    /// Only a rubric that cannot be rendered is an `Err`. Provider failures
    /// and unreadable replies come back as error or degraded verdicts.
    pub fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<EvaluationVerdict, EvaluationError> {
        let (rubric, budget) = match request.kind {
            EvaluationKind::FactCheck => (FACT_CHECK_RUBRIC, self.settings.fact_check_word_budget),
            EvaluationKind::QualityScore => (QUALITY_RUBRIC, self.settings.quality_word_budget),
        };

        let word_count = count_words(request.content);
        let (content, truncated) = truncate_words(request.content, budget, request.kind);

        let mut arguments = request.context.clone();
        arguments.insert("chapter_name".into(), chapter_title(request.chapter_key));
        arguments.insert("model_name".into(), request.model_id.to_string());
        arguments.insert("word_count".into(), word_count.to_string());
        arguments.insert("content".into(), content);
        let prompt = self.rubrics.format(rubric, &arguments)?;

        let params = GenerationParams::new(self.settings.temperature, self.settings.max_tokens).json();
        let verdict = EvaluationVerdict::pending(
            request.kind,
            request.model_id,
            request.chapter_key,
            self.model_name.as_str(),
        );
        let mut verdict = match self.model.invoke(&[ChatMessage::user(prompt)], &params) {
            Ok(reply) => verdict.with_response(&reply),
            Err(err) => verdict.with_error(err),
        };
        verdict.word_count = word_count;
        verdict.truncated = truncated;
        verdict.evaluated_at = Utc::now().to_rfc3339();
        Ok(verdict)
    }
}
