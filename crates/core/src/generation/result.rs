use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::models::{ModelSpec, Tier};
use crate::prompts::PromptParams;

/// Number of whitespace-separated tokens.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Outcome of one (model, chapter) attempt.
///
/// `success` holds exactly when non-empty text was produced. The text itself
/// lives in the artifact store and is not part of the serialized summary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub chapter_key: String,
    #[serde(default)]
    pub model_id: String,
    pub success: bool,
    #[serde(skip)]
    text: Option<String>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub duration: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    pub(crate) fn succeeded(
        model_id: &str,
        chapter_key: &str,
        text: String,
        duration: f64,
        output_file: PathBuf,
    ) -> Self {
        Self {
            chapter_key: chapter_key.to_string(),
            model_id: model_id.to_string(),
            success: true,
            word_count: count_words(&text),
            text: Some(text),
            duration: duration.max(0.0),
            output_file: Some(output_file),
            error: None,
        }
    }

    /// Success rebuilt from a chapter persisted by an earlier run.
    pub(crate) fn restored(text: String, metadata: &ChapterMetadata, output_file: PathBuf) -> Self {
        Self {
            chapter_key: metadata.chapter_key.clone(),
            model_id: metadata.model_id.clone(),
            success: true,
            word_count: metadata.word_count,
            text: Some(text),
            duration: metadata.duration_seconds.max(0.0),
            output_file: Some(output_file),
            error: None,
        }
    }

    pub fn failed(
        model_id: &str,
        chapter_key: &str,
        error: impl Into<String>,
        duration: f64,
    ) -> Self {
        Self {
            chapter_key: chapter_key.to_string(),
            model_id: model_id.to_string(),
            success: false,
            text: None,
            word_count: 0,
            duration: duration.max(0.0),
            output_file: None,
            error: Some(error.into()),
        }
    }

    /// Generated text, present only on results produced in this process.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn words_per_second(&self) -> f64 {
        if self.success && self.duration > 0.0 {
            self.word_count as f64 / self.duration
        } else {
            0.0
        }
    }
}

/// Sidecar record written next to each chapter text file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChapterMetadata {
    pub chapter_key: String,
    pub model: String,
    pub model_id: String,
    pub tier: Tier,
    pub generated_at: String,
    pub duration_seconds: f64,
    pub word_count: usize,
    pub params: PromptParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelRunSummary {
    pub model_id: String,
    pub model_name: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub nation: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub tier: Tier,
    pub total_chapters: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_words: usize,
    pub total_time: f64,
    pub avg_words: f64,
    pub results: Vec<GenerationResult>,
}

impl ModelRunSummary {
    /// Aggregates over successful results only; zero successes give zero
    /// averages.
    pub fn from_results(spec: &ModelSpec, results: Vec<GenerationResult>) -> Self {
        let successful = results.iter().filter(|r| r.success).count();
        let total_words: usize = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.word_count)
            .sum();
        let total_time: f64 = results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.duration)
            .sum();
        let avg_words = if successful == 0 {
            0.0
        } else {
            total_words as f64 / successful as f64
        };

        Self {
            model_id: spec.id.clone(),
            model_name: spec.name.clone(),
            provider: spec.provider.clone(),
            nation: spec.nation.clone(),
            company: spec.company.clone(),
            tier: spec.tier,
            total_chapters: results.len(),
            successful,
            failed: results.len() - successful,
            total_words,
            total_time,
            avg_words,
            results,
        }
    }

    pub fn successes(&self) -> impl Iterator<Item = &GenerationResult> {
        self.results.iter().filter(|r| r.success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &GenerationResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn result_for(&self, chapter_key: &str) -> Option<&GenerationResult> {
        self.results.iter().find(|r| r.chapter_key == chapter_key)
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_chapters == 0 {
            0.0
        } else {
            self.successful as f64 / self.total_chapters as f64
        }
    }

    pub fn words_per_second(&self) -> f64 {
        if self.total_time > 0.0 {
            self.total_words as f64 / self.total_time
        } else {
            0.0
        }
    }
}
