//! Cross-model comparison documents built from stored summaries and verdicts.

mod analysis;
mod markdown;

use std::path::{Path, PathBuf};

use crate::evaluation::{
    EvaluationVerdict, FactCheckSummary, QualitySummary, FACT_CHECK_SUMMARY_FILE,
    QUALITY_SCORES_FILE,
};
use crate::generation::ModelRunSummary;
use crate::store::{
    ArtifactStore, StoreError, COMPARISON_DIR_NAME, FACT_CHECK_DIR_NAME, QUALITY_DIR_NAME,
};

pub use analysis::{ComparisonResults, ModelAnalysis, ModelStatus};
pub use markdown::{
    compile_master_index, compile_report, sort_chapter_rows, thousands, ChapterRow, ReportOptions,
    COMPARISON_REPORT_FILE, COMPARISON_RESULTS_FILE, MASTER_INDEX_FILE,
};

#[derive(Clone, Debug)]
pub struct ReportFiles {
    pub report: PathBuf,
    pub results: PathBuf,
    pub index: PathBuf,
    pub comparison: ComparisonResults,
}

/// Verdicts from any stored fact-check and quality summaries.
pub fn load_verdicts(store: &ArtifactStore) -> Result<Vec<EvaluationVerdict>, StoreError> {
    let mut verdicts = Vec::new();
    let fact_check: Option<FactCheckSummary> =
        store.read_json(Path::new(FACT_CHECK_DIR_NAME).join(FACT_CHECK_SUMMARY_FILE))?;
    if let Some(summary) = fact_check {
        verdicts.extend(summary.results);
    }
    let quality: Option<QualitySummary> =
        store.read_json(Path::new(QUALITY_DIR_NAME).join(QUALITY_SCORES_FILE))?;
    if let Some(summary) = quality {
        verdicts.extend(summary.results);
    }
    Ok(verdicts)
}

/// Writes the comparison report, its JSON form and the master index. The
/// index is written last so it can link the other two.
pub fn write_reports(
    store: &ArtifactStore,
    summaries: &[ModelRunSummary],
    verdicts: &[EvaluationVerdict],
    options: &ReportOptions,
) -> Result<ReportFiles, StoreError> {
    let comparison_dir = Path::new(COMPARISON_DIR_NAME);
    let report = store.write_text(
        comparison_dir.join(COMPARISON_REPORT_FILE),
        &compile_report(summaries, verdicts, options),
    )?;
    let comparison =
        ComparisonResults::from_summaries(summaries, options.min_words, &options.generated_at);
    let results = store.write_json(comparison_dir.join(COMPARISON_RESULTS_FILE), &comparison)?;
    let index = store.write_text(
        MASTER_INDEX_FILE,
        &compile_master_index(summaries, &options.output_root, &options.generated_at),
    )?;
    Ok(ReportFiles {
        report,
        results,
        index,
        comparison,
    })
}
