use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use super::analysis::ComparisonResults;
use crate::evaluation::{
    average_scores, dimension_table, EvaluationKind, EvaluationVerdict, FactCheckSummary,
    LIKERT_LEGEND,
};
use crate::generation::{book_file_name, chapter_title, ModelRunSummary};
use crate::store::{
    COMPARISON_DIR_NAME, FACT_CHECK_DIR_NAME, PDF_DIR_NAME, QUALITY_DIR_NAME, SUMMARY_FILE_NAME,
};

pub const COMPARISON_REPORT_FILE: &str = "comparison_report.md";
pub const COMPARISON_RESULTS_FILE: &str = "results.json";
pub const MASTER_INDEX_FILE: &str = "MASTER_INDEX.md";

#[derive(Clone, Debug)]
pub struct ReportOptions {
    pub generated_at: String,
    pub min_words: usize,
    /// Only consulted to decide which artifact links exist.
    pub output_root: PathBuf,
}

/// `1234567` -> `1,234,567`.
pub fn thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// One line of a chapter table.
#[derive(Clone, Debug, PartialEq)]
pub struct ChapterRow {
    pub model_id: String,
    /// `None` when the model has no successful result for the chapter.
    pub words: Option<usize>,
    pub duration: f64,
}

/// Words descending, then model id ascending; rows without words sort last.
pub fn sort_chapter_rows(rows: &mut [ChapterRow]) {
    rows.sort_by(|a, b| match (a.words, b.words) {
        (Some(x), Some(y)) => y.cmp(&x).then_with(|| a.model_id.cmp(&b.model_id)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.model_id.cmp(&b.model_id),
    });
}

/// Cross-model comparison document. Output depends only on the arguments
/// and on which artifact files exist under `options.output_root`.
pub fn compile_report(
    summaries: &[ModelRunSummary],
    verdicts: &[EvaluationVerdict],
    options: &ReportOptions,
) -> String {
    let results =
        ComparisonResults::from_summaries(summaries, options.min_words, &options.generated_at);
    let mut summaries: Vec<&ModelRunSummary> = summaries.iter().collect();
    summaries.sort_by(|a, b| a.model_id.cmp(&b.model_id));

    let mut md = String::from("# AR7 Model Comparison Report\n\n");
    let _ = writeln!(md, "**Generated:** {}", options.generated_at);
    let _ = writeln!(
        md,
        "**Minimum Words Threshold:** {} per chapter\n",
        options.min_words
    );

    overall_section(&mut md, &results);
    performance_section(&mut md, &results);
    nation_section(&mut md, &results);
    chapter_section(&mut md, &summaries, options.min_words);
    books_section(&mut md, &summaries, &options.output_root);

    let quality: Vec<&EvaluationVerdict> = verdicts
        .iter()
        .filter(|v| v.kind == EvaluationKind::QualityScore)
        .collect();
    if !quality.is_empty() {
        quality_section(&mut md, &quality);
    }

    let fact_checks: Vec<EvaluationVerdict> = verdicts
        .iter()
        .filter(|v| v.kind == EvaluationKind::FactCheck)
        .cloned()
        .collect();
    if !fact_checks.is_empty() {
        fact_check_section(&mut md, fact_checks, &options.generated_at);
    }

    md
}

fn overall_section(md: &mut String, results: &ComparisonResults) {
    md.push_str("## Overall Summary\n\n");
    let _ = writeln!(md, "- **Total Models:** {}", results.total_models);
    let _ = writeln!(md, "- **Successful:** {} ✅", results.successful_models);
    let _ = writeln!(md, "- **Failed:** {} ❌", results.failed_models);
    let _ = writeln!(
        md,
        "- **Total Chapters (from successful models):** {}",
        results.total_chapters
    );
    let _ = writeln!(
        md,
        "- **Total Words (from successful models):** {}\n",
        thousands(results.total_words)
    );
}

fn performance_section(md: &mut String, results: &ComparisonResults) {
    md.push_str("## Model Performance\n\n");
    md.push_str("| Model | Provider | Status | Total Words | Avg Words/Chapter | Total Time (min) | Words/Second | Success Rate |\n");
    md.push_str("|-------|----------|--------|-------------|-------------------|------------------|--------------|--------------|\n");
    for m in &results.models {
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} | {:.0} | {:.1} | {:.1} | {:.0}% |",
            m.model_id,
            m.provider,
            m.status.label(),
            thousands(m.total_words),
            m.avg_words_per_chapter,
            m.total_time / 60.0,
            m.words_per_second,
            m.success_rate * 100.0
        );
    }

    let failures: Vec<_> = results
        .models
        .iter()
        .filter_map(|m| m.failure_reason.as_deref().map(|r| (&m.model_id, r)))
        .collect();
    if !failures.is_empty() {
        md.push_str("\n**Failure reasons:**\n\n");
        for (model_id, reason) in failures {
            let _ = writeln!(md, "- {model_id}: {reason}");
        }
    }
    md.push('\n');
}

fn nation_section(md: &mut String, results: &ComparisonResults) {
    md.push_str("## Performance by Nation\n\n");
    let mut by_nation: BTreeMap<&str, (usize, usize, usize)> = BTreeMap::new();
    for m in results.models.iter().filter(|m| m.passed()) {
        let entry = by_nation.entry(m.nation.as_str()).or_default();
        entry.0 += 1;
        entry.1 += m.chapters_generated;
        entry.2 += m.total_words;
    }

    if by_nation.is_empty() {
        md.push_str("⚠️ No models met the success criteria.\n\n");
        return;
    }

    let _ = writeln!(
        md,
        "Only models averaging at least {} words per chapter are included.\n",
        results.min_words_threshold
    );
    md.push_str("| Nation | Models | Total Chapters | Total Words | Avg Words/Model |\n");
    md.push_str("|--------|--------|----------------|-------------|-----------------|\n");
    for (nation, (models, chapters, words)) in by_nation {
        let _ = writeln!(
            md,
            "| {nation} | {models} | {chapters} | {} | {} |",
            thousands(words),
            thousands(words / models)
        );
    }
    md.push('\n');
}

fn chapter_section(md: &mut String, summaries: &[&ModelRunSummary], min_words: usize) {
    let mut chapters: Vec<&str> = Vec::new();
    for summary in summaries {
        for result in &summary.results {
            if !chapters.contains(&result.chapter_key.as_str()) {
                chapters.push(result.chapter_key.as_str());
            }
        }
    }
    if chapters.is_empty() {
        return;
    }

    md.push_str("## Chapter-by-Chapter Comparison\n\n");
    for chapter in chapters {
        let mut rows: Vec<ChapterRow> = summaries
            .iter()
            .map(|summary| match summary.result_for(chapter) {
                Some(result) if result.success => ChapterRow {
                    model_id: summary.model_id.clone(),
                    words: Some(result.word_count),
                    duration: result.duration,
                },
                _ => ChapterRow {
                    model_id: summary.model_id.clone(),
                    words: None,
                    duration: 0.0,
                },
            })
            .collect();
        sort_chapter_rows(&mut rows);

        let _ = writeln!(md, "### {}\n", chapter_title(chapter));
        md.push_str("| Model | Words | Time (s) | Words/Sec | Status |\n");
        md.push_str("|-------|-------|----------|-----------|--------|\n");
        for row in rows {
            match row.words {
                Some(words) => {
                    let rate = if row.duration > 0.0 {
                        words as f64 / row.duration
                    } else {
                        0.0
                    };
                    let status = if words < min_words {
                        "⚠️ Short"
                    } else {
                        "✅ OK"
                    };
                    let _ = writeln!(
                        md,
                        "| {} | {} | {:.1} | {rate:.1} | {status} |",
                        row.model_id,
                        thousands(words),
                        row.duration
                    );
                }
                None => {
                    let _ = writeln!(md, "| {} | N/A | N/A | N/A | ❌ Failed |", row.model_id);
                }
            }
        }
        md.push('\n');
    }
}

fn books_section(md: &mut String, summaries: &[&ModelRunSummary], root: &Path) {
    let links: Vec<(String, String)> = summaries
        .iter()
        .filter_map(|s| {
            let relative = format!("{}/{}", s.model_id, book_file_name(&s.model_id, s.tier));
            root.join(&relative)
                .is_file()
                .then(|| (s.model_id.clone(), relative))
        })
        .collect();
    if links.is_empty() {
        return;
    }
    md.push_str("## Generated Books\n\n");
    for (model_id, relative) in links {
        let _ = writeln!(md, "- [{model_id}](../{relative})");
    }
    md.push('\n');
}

fn quality_section(md: &mut String, verdicts: &[&EvaluationVerdict]) {
    md.push_str("## Quality Scores\n\n");
    md.push_str("### Scoring Scale (1-7 Likert)\n\n");
    md.push_str(LIKERT_LEGEND);
    md.push('\n');

    md.push_str("### All Models\n\n");
    md.push_str(&dimension_table(&average_scores(verdicts.iter().copied())));
    md.push('\n');

    let mut model_ids: Vec<&str> = verdicts.iter().map(|v| v.model_id.as_str()).collect();
    model_ids.sort_unstable();
    model_ids.dedup();
    for model_id in model_ids {
        let averages = average_scores(verdicts.iter().copied().filter(|v| v.model_id == model_id));
        let _ = writeln!(md, "### {model_id}\n");
        if averages.is_empty() {
            md.push_str("No parsed quality verdicts.\n\n");
            continue;
        }
        md.push_str(&dimension_table(&averages));
        md.push('\n');
    }
}

fn fact_check_section(md: &mut String, verdicts: Vec<EvaluationVerdict>, generated_at: &str) {
    let summary =
        FactCheckSummary::from_verdicts(generated_at.to_string(), String::new(), Vec::new(), verdicts);
    md.push_str("## Fact-Check Results\n\n");
    md.push_str("| Model | Chapters | Total | Critical | Major | Minor | Avg Confidence |\n");
    md.push_str("|-------|----------|-------|----------|-------|-------|----------------|\n");
    for (model_id, m) in &summary.models {
        let confidence = m
            .avg_confidence
            .map(|c| format!("{c:.0}"))
            .unwrap_or_else(|| "N/A".to_string());
        let _ = writeln!(
            md,
            "| {model_id} | {} | {} | {} | {} | {} | {confidence} |",
            m.chapters_checked, m.total_issues, m.critical_issues, m.major_issues, m.minor_issues
        );
    }
    let _ = writeln!(
        md,
        "\nError rate: {:.1}% of checked chapters have a critical or major issue.\n",
        summary.error_rate * 100.0
    );
}

/// Links to every artifact that exists under `root`.
pub fn compile_master_index(
    summaries: &[ModelRunSummary],
    root: &Path,
    generated_at: &str,
) -> String {
    let mut summaries: Vec<&ModelRunSummary> = summaries.iter().collect();
    summaries.sort_by(|a, b| a.model_id.cmp(&b.model_id));
    let exists = |relative: &str| root.join(relative).is_file();

    let mut md = String::from("# AR7 Model Comparison - Master Index\n\n");
    let _ = writeln!(md, "**Generated**: {generated_at}\n");

    let books: Vec<String> = summaries
        .iter()
        .map(|s| format!("{}/{}", s.model_id, book_file_name(&s.model_id, s.tier)))
        .filter(|relative| exists(relative))
        .collect();
    link_list(&mut md, "Generated Books", &books);

    let pdfs: Vec<String> = summaries
        .iter()
        .map(|s| {
            let stem = book_file_name(&s.model_id, s.tier);
            format!("{PDF_DIR_NAME}/{}", stem.replace(".md", ".pdf"))
        })
        .filter(|relative| exists(relative))
        .collect();
    link_list(&mut md, "PDFs", &pdfs);

    md.push_str("## Individual Chapters\n\n");
    for summary in &summaries {
        let _ = writeln!(md, "### {}\n", summary.model_id);
        for result in summary.successes() {
            let relative = format!("{}/{}.txt", summary.model_id, result.chapter_key);
            if exists(&relative) {
                let _ = writeln!(
                    md,
                    "- [{}]({relative}) - {} words",
                    result.chapter_key,
                    thousands(result.word_count)
                );
            }
        }
        md.push('\n');
    }

    let summary_files: Vec<String> = summaries
        .iter()
        .map(|s| format!("{}/{SUMMARY_FILE_NAME}", s.model_id))
        .filter(|relative| exists(relative))
        .collect();
    link_list(&mut md, "Summary Files", &summary_files);

    let reports: Vec<String> = [
        format!("{COMPARISON_DIR_NAME}/{COMPARISON_REPORT_FILE}"),
        format!("{COMPARISON_DIR_NAME}/{COMPARISON_RESULTS_FILE}"),
        "run_summary.json".to_string(),
    ]
    .into_iter()
    .filter(|relative| exists(relative))
    .collect();
    link_list(&mut md, "Reports", &reports);

    let evaluations: Vec<String> = [
        format!("{FACT_CHECK_DIR_NAME}/fact_check_report.md"),
        format!("{FACT_CHECK_DIR_NAME}/fact_check_summary.json"),
        format!("{QUALITY_DIR_NAME}/quality_report.md"),
        format!("{QUALITY_DIR_NAME}/quality_scores.json"),
    ]
    .into_iter()
    .filter(|relative| exists(relative))
    .collect();
    link_list(&mut md, "Evaluations", &evaluations);

    md
}

fn link_list(md: &mut String, heading: &str, links: &[String]) {
    if links.is_empty() {
        return;
    }
    let _ = writeln!(md, "## {heading}\n");
    for relative in links {
        let name = relative.rsplit('/').next().unwrap_or(relative);
        let _ = writeln!(md, "- [{name}]({relative})");
    }
    md.push('\n');
}
