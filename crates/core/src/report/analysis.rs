use serde::{Deserialize, Serialize};

use crate::generation::ModelRunSummary;
use crate::models::Tier;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Success,
    Failed,
}

impl ModelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "✅ Success",
            Self::Failed => "❌ Failed",
        }
    }
}

/// One model measured against the minimum-words threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelAnalysis {
    pub model_id: String,
    pub model_name: String,
    pub provider: String,
    pub nation: String,
    pub company: String,
    pub tier: Tier,
    pub status: ModelStatus,
    pub total_chapters: usize,
    pub chapters_generated: usize,
    pub chapters_below_threshold: usize,
    pub total_words: usize,
    pub avg_words_per_chapter: f64,
    pub total_time: f64,
    pub words_per_second: f64,
    pub success_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ModelAnalysis {
    /// A model fails when nothing was generated, when its average over
    /// successful chapters is under `min_words`, or when more than half of
    /// those chapters are under it.
    pub fn from_summary(summary: &ModelRunSummary, min_words: usize) -> Self {
        let generated = summary.successes().count();
        let below = summary
            .successes()
            .filter(|r| r.word_count < min_words)
            .count();
        let avg = if generated == 0 {
            0.0
        } else {
            summary.total_words as f64 / generated as f64
        };

        let failure_reason = if generated == 0 {
            Some("no_chapters_generated".to_string())
        } else if avg < min_words as f64 {
            Some(format!("avg_words_too_low ({avg:.0} < {min_words})"))
        } else if below * 2 > generated {
            Some(format!(
                "too_many_short_chapters ({below} of {generated} below {min_words})"
            ))
        } else {
            None
        };

        Self {
            model_id: summary.model_id.clone(),
            model_name: summary.model_name.clone(),
            provider: summary.provider.clone(),
            nation: summary.nation.clone(),
            company: summary.company.clone(),
            tier: summary.tier,
            status: if failure_reason.is_none() {
                ModelStatus::Success
            } else {
                ModelStatus::Failed
            },
            total_chapters: summary.total_chapters,
            chapters_generated: generated,
            chapters_below_threshold: below,
            total_words: summary.total_words,
            avg_words_per_chapter: avg,
            total_time: summary.total_time,
            words_per_second: summary.words_per_second(),
            success_rate: summary.success_rate(),
            failure_reason,
        }
    }

    pub fn passed(&self) -> bool {
        self.status == ModelStatus::Success
    }
}

/// `comparison/results.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResults {
    pub generated_at: String,
    pub min_words_threshold: usize,
    pub total_models: usize,
    pub successful_models: usize,
    pub failed_models: usize,
    /// Totals over threshold-passing models only.
    pub total_chapters: usize,
    pub total_words: usize,
    pub models: Vec<ModelAnalysis>,
}

impl ComparisonResults {
    /// Models are ordered by id.
    pub fn from_summaries(
        summaries: &[ModelRunSummary],
        min_words: usize,
        generated_at: &str,
    ) -> Self {
        let mut models: Vec<ModelAnalysis> = summaries
            .iter()
            .map(|summary| ModelAnalysis::from_summary(summary, min_words))
            .collect();
        models.sort_by(|a, b| a.model_id.cmp(&b.model_id));

        let passing = models.iter().filter(|m| m.passed());
        let total_chapters = passing.clone().map(|m| m.chapters_generated).sum();
        let total_words = passing.map(|m| m.total_words).sum();
        let successful_models = models.iter().filter(|m| m.passed()).count();

        Self {
            generated_at: generated_at.to_string(),
            min_words_threshold: min_words,
            total_models: models.len(),
            successful_models,
            failed_models: models.len() - successful_models,
            total_chapters,
            total_words,
            models,
        }
    }

    pub fn get(&self, model_id: &str) -> Option<&ModelAnalysis> {
        self.models.iter().find(|m| m.model_id == model_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GenerationResult;
    use crate::models::{ModelRegistry, ModelSpec};

    fn spec(id: &str) -> ModelSpec {
        ModelRegistry::ar7_defaults(Tier::Lite)
            .get(id)
            .cloned()
            .unwrap()
    }

    fn words(n: usize) -> String {
        vec!["w"; n].join(" ")
    }

    fn summary(id: &str, counts: &[usize]) -> ModelRunSummary {
        let results = counts
            .iter()
            .enumerate()
            .map(|(i, n)| {
                GenerationResult::succeeded(id, &format!("c{i}"), words(*n), 1.0, "x.txt".into())
            })
            .collect();
        ModelRunSummary::from_results(&spec(id), results)
    }

    #[test]
    fn average_below_threshold_fails() {
        let analysis = ModelAnalysis::from_summary(&summary("qwen", &[100, 200]), 500);
        assert_eq!(analysis.status, ModelStatus::Failed);
        assert!(analysis
            .failure_reason
            .as_deref()
            .unwrap()
            .starts_with("avg_words_too_low"));
    }

    #[test]
    fn too_many_short_chapters_fails_despite_average() {
        let analysis = ModelAnalysis::from_summary(&summary("qwen", &[2000, 100, 100]), 500);
        assert!(analysis.avg_words_per_chapter > 500.0);
        assert_eq!(analysis.chapters_below_threshold, 2);
        assert_eq!(analysis.status, ModelStatus::Failed);
    }

    #[test]
    fn totals_cover_passing_models_only() {
        let results = ComparisonResults::from_summaries(
            &[summary("qwen", &[600, 700]), summary("mistral", &[10])],
            500,
            "now",
        );
        assert_eq!(results.models[0].model_id, "mistral");
        assert_eq!(results.successful_models, 1);
        assert_eq!(results.failed_models, 1);
        assert_eq!(results.total_words, 1300);
        assert_eq!(results.total_chapters, 2);
    }
}
