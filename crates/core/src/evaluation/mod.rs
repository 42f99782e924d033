//! Second-pass grading of stored chapters: fact-checking and quality scoring.

mod evaluator;
mod runner;
mod summary;
mod verdict;

use thiserror::Error;

use crate::prompts::PromptError;
use crate::store::StoreError;

pub use evaluator::{EvaluationRequest, Evaluator};
pub use runner::{
    EvaluationRunner, FactCheckRun, QualityRun, FACT_CHECK_REPORT_FILE, FACT_CHECK_SUMMARY_FILE,
    QUALITY_REPORT_FILE, QUALITY_SCORES_FILE,
};
pub use summary::{
    average_scores, dimension_label, dimension_table, star_rating, FactCheckModelSummary,
    FactCheckSummary, QualityModelSummary, QualitySummary, LIKERT_LEGEND,
};
pub use verdict::{
    strip_json_fences, truncate_words, EvaluationKind, EvaluationVerdict, Issue, VerdictState,
    FACT_CHECK_COUNTS, OVERALL_SCORE, QUALITY_DIMENSIONS,
};

/// Chapters fact-checked when none are named, in sampling order.
pub const FACT_CHECK_DEFAULT_CHAPTERS: &[&str] = &[
    "summary_for_policymakers",
    "technical_summary",
    "chapter_2_vulnerabilities_impacts_risks",
    "chapter_7_africa",
    "chapter_16_water",
];

/// Chapters quality-scored when none are named, in sampling order.
pub const QUALITY_DEFAULT_CHAPTERS: &[&str] = &[
    "summary_for_policymakers",
    "technical_summary",
    "chapter_2_vulnerabilities_impacts_risks",
    "chapter_7_africa",
    "chapter_14_terrestrial_ecosystems",
    "chapter_16_water",
    "chapter_19_health_wellbeing",
];

/// The first `samples` entries of a default chapter list.
pub fn sample_chapters(defaults: &[&str], samples: usize) -> Vec<String> {
    defaults
        .iter()
        .take(samples)
        .map(|key| key.to_string())
        .collect()
}

/// Setup failures only; per-chapter problems become verdicts.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
