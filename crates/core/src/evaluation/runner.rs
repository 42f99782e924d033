use chrono::Utc;
use std::path::{Path, PathBuf};

use super::evaluator::{EvaluationRequest, Evaluator};
use super::summary::{FactCheckSummary, QualitySummary};
use super::verdict::{EvaluationKind, EvaluationVerdict, VerdictState};
use super::EvaluationError;
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::store::{ArtifactStore, FACT_CHECK_DIR_NAME, QUALITY_DIR_NAME};

pub const FACT_CHECK_SUMMARY_FILE: &str = "fact_check_summary.json";
pub const FACT_CHECK_REPORT_FILE: &str = "fact_check_report.md";
pub const QUALITY_SCORES_FILE: &str = "quality_scores.json";
pub const QUALITY_REPORT_FILE: &str = "quality_report.md";

const NOT_AVAILABLE: &str = "Not available";

#[derive(Clone, Debug)]
pub struct FactCheckRun {
    pub summary: FactCheckSummary,
    pub summary_file: PathBuf,
    pub report_file: PathBuf,
}

impl FactCheckRun {
    pub fn failed_units(&self) -> usize {
        failed_units(&self.summary.results)
    }
}

#[derive(Clone, Debug)]
pub struct QualityRun {
    pub summary: QualitySummary,
    pub scores_file: PathBuf,
    pub report_file: PathBuf,
}

impl QualityRun {
    pub fn failed_units(&self) -> usize {
        failed_units(&self.summary.results)
    }
}

fn verdict_path(verdict: &EvaluationVerdict) -> PathBuf {
    let (dir, suffix) = match verdict.kind {
        EvaluationKind::FactCheck => (FACT_CHECK_DIR_NAME, "factcheck"),
        EvaluationKind::QualityScore => (QUALITY_DIR_NAME, "quality"),
    };
    Path::new(dir).join(format!(
        "{}_{}_{suffix}.json",
        verdict.model_id, verdict.chapter_key
    ))
}

fn failed_units(results: &[EvaluationVerdict]) -> usize {
    results
        .iter()
        .filter(|v| matches!(v.state, VerdictState::Degraded | VerdictState::Error))
        .count()
}

/// Grades chapters already in the store. Nothing is ever generated here.
pub struct EvaluationRunner<'a> {
    store: &'a ArtifactStore,
    evaluator: &'a Evaluator<'a>,
    sink: &'a dyn LogSink,
}

impl<'a> EvaluationRunner<'a> {
    pub fn new(store: &'a ArtifactStore, evaluator: &'a Evaluator<'a>, sink: &'a dyn LogSink) -> Self {
        Self {
            store,
            evaluator,
            sink,
        }
    }

    pub fn fact_check(
        &self,
        model_ids: &[String],
        chapter_keys: &[String],
    ) -> Result<FactCheckRun, EvaluationError> {
        let mut results = Vec::new();
        for model_id in model_ids {
            self.log(LogLevel::Info, format!("fact-checking {model_id}"));
            for chapter_key in chapter_keys {
                let Some(content) = self.load(model_id, chapter_key)? else {
                    continue;
                };
                let generation_stats = match self.store.read_metadata(model_id, chapter_key)? {
                    Some(meta) => format!(
                        "{} words in {:.1}s by {} ({} tier)",
                        meta.word_count, meta.duration_seconds, meta.model, meta.tier
                    ),
                    None => NOT_AVAILABLE.to_string(),
                };
                let request =
                    EvaluationRequest::new(EvaluationKind::FactCheck, model_id, chapter_key, &content)
                        .with_context("generation_stats", generation_stats);

                let verdict = self.evaluator.evaluate(&request)?;
                self.record(&verdict)?;
                results.push(verdict);
            }
        }

        let summary = FactCheckSummary::from_verdicts(
            Utc::now().to_rfc3339(),
            self.evaluator.model_name().to_string(),
            chapter_keys.to_vec(),
            results,
        );
        let summary_file = self
            .store
            .write_json(Path::new(FACT_CHECK_DIR_NAME).join(FACT_CHECK_SUMMARY_FILE), &summary)?;
        let report_file = self.store.write_text(
            Path::new(FACT_CHECK_DIR_NAME).join(FACT_CHECK_REPORT_FILE),
            &summary.to_markdown(),
        )?;

        self.log(
            LogLevel::Info,
            format!(
                "fact-check complete: {} chapter(s), {} issue(s), error rate {:.1}%",
                summary.total_chapters_checked,
                summary.errors_found,
                summary.error_rate * 100.0
            ),
        );
        Ok(FactCheckRun {
            summary,
            summary_file,
            report_file,
        })
    }

    /// A prior fact-check summary, when given, fills the rubric's
    /// `fact_check_summary` slot for each model.
    pub fn quality(
        &self,
        model_ids: &[String],
        chapter_keys: &[String],
        fact_check: Option<&FactCheckSummary>,
    ) -> Result<QualityRun, EvaluationError> {
        let mut results = Vec::new();
        for model_id in model_ids {
            self.log(LogLevel::Info, format!("scoring {model_id}"));
            let fact_check_text = fact_check
                .map(|summary| summary.describe_model(model_id))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string());

            for chapter_key in chapter_keys {
                let Some(content) = self.load(model_id, chapter_key)? else {
                    continue;
                };
                let request = EvaluationRequest::new(
                    EvaluationKind::QualityScore,
                    model_id,
                    chapter_key,
                    &content,
                )
                .with_context("fact_check_summary", fact_check_text.as_str())
                .with_context(
                    "comparison_word_counts",
                    self.comparison_word_counts(model_ids, model_id, chapter_key)?,
                );

                let verdict = self.evaluator.evaluate(&request)?;
                self.record(&verdict)?;
                results.push(verdict);
            }
        }

        let summary = QualitySummary::from_verdicts(
            Utc::now().to_rfc3339(),
            self.evaluator.model_name().to_string(),
            chapter_keys.to_vec(),
            results,
        );
        let scores_file = self
            .store
            .write_json(Path::new(QUALITY_DIR_NAME).join(QUALITY_SCORES_FILE), &summary)?;
        let report_file = self.store.write_text(
            Path::new(QUALITY_DIR_NAME).join(QUALITY_REPORT_FILE),
            &summary.to_markdown(),
        )?;

        self.log(
            LogLevel::Info,
            format!("quality scoring complete: {} verdict(s)", summary.results.len()),
        );
        Ok(QualityRun {
            summary,
            scores_file,
            report_file,
        })
    }

    fn load(&self, model_id: &str, chapter_key: &str) -> Result<Option<String>, EvaluationError> {
        let Some(content) = self.store.read_chapter(model_id, chapter_key)? else {
            self.log(
                LogLevel::Warn,
                format!("{model_id}/{chapter_key}: file not found, skipping"),
            );
            return Ok(None);
        };
        let min_chars = self.evaluator.settings().min_content_chars;
        if content.trim().chars().count() < min_chars {
            self.log(
                LogLevel::Warn,
                format!("{model_id}/{chapter_key}: shorter than {min_chars} characters, skipping"),
            );
            return Ok(None);
        }
        Ok(Some(content))
    }

    /// `other_model: words` for every other model with this chapter stored.
    fn comparison_word_counts(
        &self,
        model_ids: &[String],
        current: &str,
        chapter_key: &str,
    ) -> Result<String, EvaluationError> {
        let mut parts = Vec::new();
        for other in model_ids.iter().filter(|id| id.as_str() != current) {
            if let Some(meta) = self.store.read_metadata(other, chapter_key)? {
                parts.push(format!("{other}: {}", meta.word_count));
            }
        }
        Ok(if parts.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            parts.join(", ")
        })
    }

    /// Logs the verdict and writes it as `<model>_<chapter>_<suffix>.json`
    /// under the kind's output directory.
    fn record(&self, verdict: &EvaluationVerdict) -> Result<(), EvaluationError> {
        self.report_verdict(verdict);
        self.store.write_json(verdict_path(verdict), verdict)?;
        Ok(())
    }

    fn report_verdict(&self, verdict: &EvaluationVerdict) {
        let subject = format!("{}/{}", verdict.model_id, verdict.chapter_key);
        match verdict.state {
            VerdictState::Parsed => match verdict.kind {
                EvaluationKind::FactCheck => self.log(
                    LogLevel::Info,
                    format!(
                        "{subject}: {} issue(s), {} critical, {} major",
                        verdict.total_issues(),
                        verdict.count("critical_issues"),
                        verdict.count("major_issues")
                    ),
                ),
                EvaluationKind::QualityScore => self.log(
                    LogLevel::Info,
                    format!("{subject}: overall {:.1}/7.0", verdict.overall_score()),
                ),
            },
            VerdictState::Degraded => self.log(
                LogLevel::Warn,
                format!("{subject}: {}", verdict.overall_assessment),
            ),
            VerdictState::Error | VerdictState::Pending => self.log(
                LogLevel::Error,
                format!(
                    "{subject}: {}",
                    verdict.error.as_deref().unwrap_or("evaluation failed")
                ),
            ),
        }
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EvaluationSettings;
    use crate::generation::ChapterMetadata;
    use crate::llm::{ChatMessage, GenerationParams, LanguageModel, LanguageModelError};
    use crate::logging::VecLogSink;
    use crate::models::Tier;
    use crate::prompts::{PromptParams, RubricRegistry};
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<&str, &str>>) -> Self {
            Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| r.map(str::to_string).map_err(str::to_string))
                        .collect(),
                ),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LanguageModel for Scripted {
        fn invoke(
            &self,
            messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<String, LanguageModelError> {
            self.prompts.lock().unwrap().push(messages[0].content.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted reply".to_string()))
                .map_err(LanguageModelError::msg)
        }
    }

    fn seed(store: &ArtifactStore, model_id: &str, key: &str, words: usize) {
        let text = vec!["warming"; words].join(" ");
        let meta = ChapterMetadata {
            chapter_key: key.into(),
            model: format!("provider/{model_id}"),
            model_id: model_id.into(),
            tier: Tier::Lite,
            generated_at: "2026-10-17T00:00:00+00:00".into(),
            duration_seconds: 3.0,
            word_count: words,
            params: PromptParams::default(),
        };
        store.write_chapter(model_id, key, &text, &meta, false).unwrap();
    }

    #[test]
    fn fact_check_skips_missing_and_short_chapters() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        seed(&store, "qwen", "chapter_7_africa", 40);
        seed(&store, "qwen", "chapter_16_water", 3);

        let rubrics = RubricRegistry::new().unwrap();
        let settings = EvaluationSettings::default();
        let model = Scripted::new(vec![Ok(r#"{"total_issues": 1, "major_issues": 1}"#)]);
        let evaluator = Evaluator::new(&model, "judge", &rubrics, &settings);
        let sink = VecLogSink::new();

        let run = EvaluationRunner::new(&store, &evaluator, &sink)
            .fact_check(
                &["qwen".to_string()],
                &[
                    "chapter_7_africa".to_string(),
                    "chapter_16_water".to_string(),
                    "technical_summary".to_string(),
                ],
            )
            .unwrap();

        assert_eq!(run.summary.results.len(), 1);
        assert_eq!(run.summary.error_rate, 1.0);
        assert_eq!(run.failed_units(), 0);
        assert!(temp
            .path()
            .join("fact_checking/qwen_chapter_7_africa_factcheck.json")
            .is_file());
        assert!(run.report_file.is_file());
        assert!(sink.contains("shorter than 100 characters"));
        assert!(sink.contains("technical_summary: file not found"));
        assert!(model.prompts.lock().unwrap()[0].contains("40 words in 3.0s"));
    }

    #[test]
    fn quality_uses_prior_fact_check_and_peer_counts() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        seed(&store, "qwen", "chapter_7_africa", 40);
        seed(&store, "mistral", "chapter_7_africa", 60);

        let rubrics = RubricRegistry::new().unwrap();
        let settings = EvaluationSettings::default();
        let model = Scripted::new(vec![
            Ok(r#"{"accuracy": 5, "overall_score": 5}"#),
            Ok("unparseable"),
        ]);
        let evaluator = Evaluator::new(&model, "judge", &rubrics, &settings);
        let sink = VecLogSink::new();
        let prior = FactCheckSummary::from_verdicts(
            "t".into(),
            "judge".into(),
            vec![],
            vec![EvaluationVerdict::pending(
                EvaluationKind::FactCheck,
                "qwen",
                "chapter_7_africa",
                "judge",
            )
            .with_response(r#"{"total_issues": 0}"#)],
        );

        let run = EvaluationRunner::new(&store, &evaluator, &sink)
            .quality(
                &["qwen".to_string(), "mistral".to_string()],
                &["chapter_7_africa".to_string()],
                Some(&prior),
            )
            .unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("mistral: 60"));
        assert!(prompts[0].contains("1 chapter(s) fact-checked"));
        assert!(prompts[1].contains("qwen: 40"));
        assert!(prompts[1].contains("FACT-CHECKING RESULTS:\nNot available"));

        assert_eq!(run.failed_units(), 1);
        assert_eq!(run.summary.models["qwen"].average("accuracy"), Some(5.0));
        assert_eq!(run.summary.models["mistral"].chapters_scored, 0);
        assert!(run.scores_file.is_file());

        let stored: EvaluationVerdict = store
            .read_json("quality_scoring/qwen_chapter_7_africa_quality.json")
            .unwrap()
            .unwrap();
        assert_eq!(stored.state, VerdictState::Parsed);
        assert_eq!(stored.score("accuracy"), Some(5.0));
        let degraded: EvaluationVerdict = store
            .read_json("quality_scoring/mistral_chapter_7_africa_quality.json")
            .unwrap()
            .unwrap();
        assert_eq!(degraded.state, VerdictState::Degraded);
    }

    #[test]
    fn chapter_without_metadata_reports_stats_as_not_available() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        std::fs::create_dir_all(store.model_dir("qwen")).unwrap();
        std::fs::write(
            store.chapter_path("qwen", "chapter_7_africa"),
            vec!["warming"; 40].join(" "),
        )
        .unwrap();

        let rubrics = RubricRegistry::new().unwrap();
        let settings = EvaluationSettings::default();
        let model = Scripted::new(vec![Ok(r#"{"total_issues": 0}"#)]);
        let evaluator = Evaluator::new(&model, "judge", &rubrics, &settings);

        EvaluationRunner::new(&store, &evaluator, &VecLogSink::new())
            .fact_check(&["qwen".to_string()], &["chapter_7_africa".to_string()])
            .unwrap();

        assert!(model.prompts.lock().unwrap()[0].contains("GENERATION: Not available\n"));
    }
}
