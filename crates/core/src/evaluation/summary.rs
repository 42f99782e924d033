use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::verdict::{EvaluationVerdict, VerdictState, OVERALL_SCORE, QUALITY_DIMENSIONS};
use crate::generation::chapter_title;

/// Fixed-threshold rating used by every score table.
pub fn star_rating(average: f64) -> &'static str {
    if average >= 6.0 {
        "⭐⭐⭐⭐⭐ Excellent"
    } else if average >= 5.0 {
        "⭐⭐⭐⭐ Good"
    } else if average >= 4.0 {
        "⭐⭐⭐ Adequate"
    } else {
        "⭐⭐ Needs Improvement"
    }
}

pub const LIKERT_LEGEND: &str = "\
- **7**: Exceptional, world-class quality
- **6**: Excellent, very high quality
- **5**: Good, professional quality
- **4**: Adequate, meets basic standards
- **3**: Below average, needs improvement
- **2**: Poor, significant issues
- **1**: Unacceptable, major problems
";

/// Display label for a score key, e.g. `ipcc_style` -> `IPCC Style`.
pub fn dimension_label(key: &str) -> String {
    match key {
        OVERALL_SCORE => "Overall Score".to_string(),
        "ipcc_style" => "IPCC Style".to_string(),
        other => chapter_title(other),
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FactCheckModelSummary {
    pub chapters_checked: usize,
    pub failed_checks: usize,
    pub total_issues: usize,
    pub critical_issues: usize,
    pub major_issues: usize,
    pub minor_issues: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_confidence: Option<f64>,
    pub chapters_with_serious_issues: usize,
    pub error_rate: f64,
}

/// Written as `fact_checking/fact_check_summary.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FactCheckSummary {
    pub generated_at: String,
    pub evaluator_model: String,
    pub chapters: Vec<String>,
    pub total_chapters_checked: usize,
    pub errors_found: usize,
    pub chapters_with_serious_issues: usize,
    /// Share of checked chapters with at least one critical or major issue.
    pub error_rate: f64,
    pub models: BTreeMap<String, FactCheckModelSummary>,
    pub results: Vec<EvaluationVerdict>,
}

impl FactCheckSummary {
    /// Only parsed verdicts feed the counts; the rest are tallied as failed.
    pub fn from_verdicts(
        generated_at: String,
        evaluator_model: String,
        chapters: Vec<String>,
        results: Vec<EvaluationVerdict>,
    ) -> Self {
        let mut models: BTreeMap<String, FactCheckModelSummary> = BTreeMap::new();
        let mut confidences: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for verdict in &results {
            let entry = models.entry(verdict.model_id.clone()).or_default();
            if !verdict.is_parsed() {
                entry.failed_checks += 1;
                continue;
            }
            entry.chapters_checked += 1;
            entry.total_issues += verdict.total_issues();
            entry.critical_issues += verdict.count("critical_issues");
            entry.major_issues += verdict.count("major_issues");
            entry.minor_issues += verdict.count("minor_issues");
            if verdict.has_serious_issues() {
                entry.chapters_with_serious_issues += 1;
            }
            if let Some(confidence) = verdict.confidence_score {
                confidences
                    .entry(verdict.model_id.clone())
                    .or_default()
                    .push(confidence);
            }
        }
        for (model_id, entry) in models.iter_mut() {
            entry.error_rate = ratio(entry.chapters_with_serious_issues, entry.chapters_checked);
            entry.avg_confidence = confidences
                .get(model_id)
                .filter(|values| !values.is_empty())
                .map(|values| values.iter().sum::<f64>() / values.len() as f64);
        }

        let total_chapters_checked = models.values().map(|m| m.chapters_checked).sum();
        let chapters_with_serious_issues =
            models.values().map(|m| m.chapters_with_serious_issues).sum();
        Self {
            generated_at,
            evaluator_model,
            chapters,
            total_chapters_checked,
            errors_found: models.values().map(|m| m.total_issues).sum(),
            chapters_with_serious_issues,
            error_rate: ratio(chapters_with_serious_issues, total_chapters_checked),
            models,
            results,
        }
    }

    /// Context line handed to the quality rubric for one model.
    pub fn describe_model(&self, model_id: &str) -> String {
        match self.models.get(model_id) {
            Some(m) if m.chapters_checked > 0 => format!(
                "{} chapter(s) fact-checked: {} issue(s) ({} critical, {} major, {} minor); error rate {:.0}%",
                m.chapters_checked,
                m.total_issues,
                m.critical_issues,
                m.major_issues,
                m.minor_issues,
                m.error_rate * 100.0
            ),
            _ => "Not available".to_string(),
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::from("# AR7 Fact-Checking Report\n\n");
        let _ = writeln!(md, "**Generated**: {}", self.generated_at);
        let _ = writeln!(md, "**Evaluator Model**: {}", self.evaluator_model);
        let _ = writeln!(md, "**Chapters Checked**: {}", self.total_chapters_checked);
        let _ = writeln!(
            md,
            "**Error Rate**: {:.1}% of chapters with critical or major issues\n",
            self.error_rate * 100.0
        );
        md.push_str("## Summary by Model\n\n");

        for (model_id, m) in &self.models {
            let _ = writeln!(md, "### {model_id}\n");
            let _ = writeln!(md, "- Chapters checked: {}", m.chapters_checked);
            if m.failed_checks > 0 {
                let _ = writeln!(md, "- Checks failed: {}", m.failed_checks);
            }
            let _ = writeln!(md, "- Total issues: {}", m.total_issues);
            let _ = writeln!(md, "- Critical: {} 🔴", m.critical_issues);
            let _ = writeln!(md, "- Major: {} 🟡", m.major_issues);
            let _ = writeln!(md, "- Minor: {} 🟢\n", m.minor_issues);

            let flagged: Vec<&EvaluationVerdict> = self
                .results
                .iter()
                .filter(|v| v.model_id == *model_id && v.is_parsed() && v.total_issues() > 0)
                .collect();
            if !flagged.is_empty() {
                md.push_str("**Issues by Chapter:**\n\n");
                for verdict in flagged {
                    let _ = writeln!(
                        md,
                        "- {}: {} issues",
                        chapter_title(&verdict.chapter_key),
                        verdict.total_issues()
                    );
                }
                md.push('\n');
            }
        }

        md.push_str("\n## Detailed Results\n\nSee `fact_check_summary.json` and the per-chapter `*_factcheck.json` files for complete details.\n");
        md
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityModelSummary {
    pub chapters_scored: usize,
    pub failed_scores: usize,
    /// Mean per dimension plus `overall_score`, over parsed verdicts only.
    /// A key no parsed verdict scored is absent.
    pub averages: BTreeMap<String, f64>,
}

impl QualityModelSummary {
    pub fn average(&self, key: &str) -> Option<f64> {
        self.averages.get(key).copied()
    }
}

/// Written as `quality_scoring/quality_scores.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub generated_at: String,
    pub evaluator_model: String,
    pub chapters: Vec<String>,
    pub models: BTreeMap<String, QualityModelSummary>,
    pub results: Vec<EvaluationVerdict>,
}

impl QualitySummary {
    pub fn from_verdicts(
        generated_at: String,
        evaluator_model: String,
        chapters: Vec<String>,
        results: Vec<EvaluationVerdict>,
    ) -> Self {
        let mut models: BTreeMap<String, QualityModelSummary> = BTreeMap::new();
        for verdict in &results {
            let entry = models.entry(verdict.model_id.clone()).or_default();
            if verdict.is_parsed() {
                entry.chapters_scored += 1;
            } else {
                entry.failed_scores += 1;
            }
        }
        for (model_id, entry) in models.iter_mut() {
            entry.averages = average_scores(results.iter().filter(|v| v.model_id == *model_id));
        }
        Self {
            generated_at,
            evaluator_model,
            chapters,
            models,
            results,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut md = String::from("# AR7 Quality Scoring Report\n\n");
        let _ = writeln!(md, "**Generated**: {}", self.generated_at);
        let _ = writeln!(md, "**Evaluator Model**: {}", self.evaluator_model);
        let _ = writeln!(md, "**Chapters Scored**: {}\n", self.chapters.len());
        md.push_str("## Scoring Scale (1-7 Likert)\n\n");
        md.push_str(LIKERT_LEGEND);
        md.push_str("\n## Summary by Model\n\n");

        for (model_id, summary) in &self.models {
            if summary.chapters_scored == 0 {
                continue;
            }
            let _ = writeln!(md, "### {model_id}\n");
            md.push_str(&dimension_table(&summary.averages));
            md.push('\n');

            let parsed = || {
                self.results
                    .iter()
                    .filter(move |v| v.model_id == *model_id && v.is_parsed())
            };
            let strengths = first_unique(parsed().flat_map(|v| v.strengths.iter()), 5);
            let weaknesses = first_unique(parsed().flat_map(|v| v.weaknesses.iter()), 5);
            if !strengths.is_empty() {
                md.push_str("**Common Strengths:**\n");
                for item in strengths {
                    let _ = writeln!(md, "- {item}");
                }
                md.push('\n');
            }
            if !weaknesses.is_empty() {
                md.push_str("**Common Weaknesses:**\n");
                for item in weaknesses {
                    let _ = writeln!(md, "- {item}");
                }
                md.push('\n');
            }
        }

        md.push_str("\n## Model Comparison\n\n");
        md.push_str("| Model | Overall | Accuracy | Style | Intelligence |\n");
        md.push_str("|-------|---------|----------|-------|--------------|\n");
        for (model_id, summary) in &self.models {
            if summary.chapters_scored == 0 {
                continue;
            }
            let _ = writeln!(
                md,
                "| {model_id} | {} | {} | {} | {} |",
                score_cell(summary.average(OVERALL_SCORE)),
                score_cell(summary.average("accuracy")),
                score_cell(summary.average("ipcc_style")),
                score_cell(summary.average("intelligence")),
            );
        }
        md.push_str("\n## Detailed Results\n\nSee `quality_scores.json` and the per-chapter `*_quality.json` files for complete details and justifications.\n");
        md
    }
}

/// Means over parsed verdicts for every quality dimension and the overall
/// score. Each key is averaged over the verdicts that carry it and left out
/// when none do.
pub fn average_scores<'v>(
    verdicts: impl Iterator<Item = &'v EvaluationVerdict>,
) -> BTreeMap<String, f64> {
    let parsed: Vec<&EvaluationVerdict> = verdicts
        .filter(|v| v.state == VerdictState::Parsed)
        .collect();
    let mut averages = BTreeMap::new();
    for key in std::iter::once(OVERALL_SCORE).chain(QUALITY_DIMENSIONS.iter().copied()) {
        let scores: Vec<f64> = parsed.iter().filter_map(|v| v.score(key)).collect();
        if !scores.is_empty() {
            averages.insert(key.to_string(), scores.iter().sum::<f64>() / scores.len() as f64);
        }
    }
    averages
}

/// `| Metric | Average | Rating |` rows for the overall score and each dimension.
pub fn dimension_table(averages: &BTreeMap<String, f64>) -> String {
    let mut md = String::from("| Metric | Average | Rating |\n|--------|---------|--------|\n");
    for key in std::iter::once(OVERALL_SCORE).chain(QUALITY_DIMENSIONS.iter().copied()) {
        let label = dimension_label(key);
        let _ = match averages.get(key) {
            Some(avg) => writeln!(md, "| {label} | {avg:.2}/7.0 | {} |", star_rating(*avg)),
            None => writeln!(md, "| {label} | N/A | N/A |"),
        };
    }
    md
}

fn score_cell(average: Option<f64>) -> String {
    average
        .map(|avg| format!("{avg:.2}"))
        .unwrap_or_else(|| "N/A".to_string())
}

fn first_unique<'s>(items: impl Iterator<Item = &'s String>, limit: usize) -> Vec<&'s str> {
    let mut seen: Vec<&str> = Vec::new();
    for item in items {
        if seen.len() == limit {
            break;
        }
        if !item.trim().is_empty() && !seen.contains(&item.as_str()) {
            seen.push(item.as_str());
        }
    }
    seen
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
