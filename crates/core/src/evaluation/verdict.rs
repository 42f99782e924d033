use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use crate::generation::count_words;

/// Rubric dimensions scored 1-7 by the quality evaluator, in report order.
pub const QUALITY_DIMENSIONS: &[&str] = &[
    "accuracy",
    "ipcc_style",
    "intelligence",
    "comprehensiveness",
    "uncertainty_language",
    "citation_quality",
    "synthesis_quality",
];

pub const OVERALL_SCORE: &str = "overall_score";

/// Valid rubric scores. Anything outside is ignored.
pub const SCORE_RANGE: RangeInclusive<f64> = 1.0..=7.0;

/// Issue counters reported by the fact-check evaluator.
pub const FACT_CHECK_COUNTS: &[&str] = &[
    "total_issues",
    "critical_issues",
    "major_issues",
    "minor_issues",
];

const FACT_CHECK_TRUNCATION: &str = "\n\n[Content truncated for fact-checking...]";
const QUALITY_TRUNCATION: &str = "\n\n[Content truncated for evaluation...]";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationKind {
    FactCheck,
    QualityScore,
}

impl EvaluationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FactCheck => "fact-check",
            Self::QualityScore => "quality",
        }
    }

    pub fn truncation_marker(&self) -> &'static str {
        match self {
            Self::FactCheck => FACT_CHECK_TRUNCATION,
            Self::QualityScore => QUALITY_TRUNCATION,
        }
    }

    fn score_keys(&self) -> &'static [&'static str] {
        match self {
            Self::FactCheck => FACT_CHECK_COUNTS,
            Self::QualityScore => QUALITY_DIMENSIONS,
        }
    }
}

impl fmt::Display for EvaluationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `Pending -> {Parsed | Degraded | Error}`. Only `Parsed` scores are
/// trusted downstream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerdictState {
    #[default]
    Pending,
    Parsed,
    Degraded,
    Error,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub location: String,
    #[serde(default, rename = "type")]
    pub category: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub correction: String,
}

impl Issue {
    fn has_severity(&self, severity: &str) -> bool {
        self.severity.trim().eq_ignore_ascii_case(severity)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationVerdict {
    pub kind: EvaluationKind,
    pub model_id: String,
    pub chapter_key: String,
    pub evaluator: String,
    pub state: VerdictState,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub justifications: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub strengths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub overall_assessment: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub evaluated_at: String,
}

impl EvaluationVerdict {
    pub fn pending(
        kind: EvaluationKind,
        model_id: impl Into<String>,
        chapter_key: impl Into<String>,
        evaluator: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            model_id: model_id.into(),
            chapter_key: chapter_key.into(),
            evaluator: evaluator.into(),
            state: VerdictState::Pending,
            word_count: 0,
            truncated: false,
            scores: BTreeMap::new(),
            justifications: BTreeMap::new(),
            issues: Vec::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            overall_assessment: String::new(),
            confidence_score: None,
            raw_response: None,
            error: None,
            evaluated_at: String::new(),
        }
    }

    /// Parses the evaluator's reply. Anything that is not a usable JSON
    /// object yields a degraded verdict that keeps the raw text.
    pub fn with_response(mut self, raw: &str) -> Self {
        match parse_object(raw).and_then(|object| self.apply(&object).then_some(())) {
            Some(()) => self.state = VerdictState::Parsed,
            None => self.degrade(raw),
        }
        self
    }

    /// The evaluator call itself failed.
    pub fn with_error(mut self, error: impl fmt::Display) -> Self {
        let message = error.to_string();
        self.zero_scores();
        self.overall_assessment = format!("{} failed: {message}", self.kind.label());
        self.error = Some(message);
        self.state = VerdictState::Error;
        self
    }

    pub fn is_parsed(&self) -> bool {
        self.state == VerdictState::Parsed
    }

    pub fn score(&self, key: &str) -> Option<f64> {
        self.scores.get(key).copied()
    }

    pub fn overall_score(&self) -> f64 {
        self.score(OVERALL_SCORE).unwrap_or(0.0)
    }

    pub fn count(&self, key: &str) -> usize {
        self.score(key).map(|v| v.max(0.0).round() as usize).unwrap_or(0)
    }

    pub fn total_issues(&self) -> usize {
        self.count("total_issues")
    }

    /// At least one critical or major issue.
    pub fn has_serious_issues(&self) -> bool {
        self.count("critical_issues") + self.count("major_issues") > 0
    }

    fn apply(&mut self, object: &Map<String, Value>) -> bool {
        match self.kind {
            EvaluationKind::QualityScore => self.apply_quality(object),
            EvaluationKind::FactCheck => {
                self.apply_fact_check(object);
                true
            }
        }
    }

    fn apply_quality(&mut self, object: &Map<String, Value>) -> bool {
        let mut found = Vec::new();
        for dim in QUALITY_DIMENSIONS {
            if let Some(score) = object.get(*dim).and_then(rubric_score) {
                self.scores.insert(dim.to_string(), score);
                found.push(score);
            }
            if let Some(text) = object
                .get(&format!("{dim}_justification"))
                .and_then(Value::as_str)
            {
                self.justifications.insert(dim.to_string(), text.to_string());
            }
        }
        if found.is_empty() {
            return false;
        }

        let overall = object
            .get(OVERALL_SCORE)
            .and_then(rubric_score)
            .unwrap_or_else(|| found.iter().sum::<f64>() / found.len() as f64);
        self.scores.insert(OVERALL_SCORE.to_string(), overall);
        self.strengths = string_list(object.get("strengths"));
        self.weaknesses = string_list(object.get("weaknesses"));
        self.overall_assessment = text(object.get("overall_assessment"));
        true
    }

    fn apply_fact_check(&mut self, object: &Map<String, Value>) {
        self.issues = object
            .get("issues")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(issue).collect())
            .unwrap_or_default();

        let by_severity = |severity: &str| {
            self.issues
                .iter()
                .filter(|issue| issue.has_severity(severity))
                .count() as f64
        };
        let fallback = [
            ("total_issues", self.issues.len() as f64),
            ("critical_issues", by_severity("critical")),
            ("major_issues", by_severity("major")),
            ("minor_issues", by_severity("minor")),
        ];
        for (key, derived) in fallback {
            let value = object.get(key).and_then(number).unwrap_or(derived);
            self.scores.insert(key.to_string(), value);
        }

        self.overall_assessment = text(object.get("overall_assessment"));
        self.confidence_score = object.get("confidence_score").and_then(number);
    }

    fn degrade(&mut self, raw: &str) {
        self.scores.clear();
        self.justifications.clear();
        self.issues.clear();
        self.strengths.clear();
        self.weaknesses.clear();
        self.zero_scores();
        self.overall_assessment = format!("Error parsing {} response", self.kind.label());
        self.raw_response = Some(raw.to_string());
        self.state = VerdictState::Degraded;
    }

    fn zero_scores(&mut self) {
        for key in self.kind.score_keys() {
            self.scores.insert(key.to_string(), 0.0);
        }
        if self.kind == EvaluationKind::QualityScore {
            self.scores.insert(OVERALL_SCORE.to_string(), 0.0);
        }
    }
}

/// Keeps the first `budget` words and appends the kind's truncation marker.
/// Returns the text to submit and whether it was cut.
pub fn truncate_words(text: &str, budget: usize, kind: EvaluationKind) -> (String, bool) {
    if count_words(text) <= budget {
        return (text.to_string(), false);
    }
    let mut kept = text
        .split_whitespace()
        .take(budget)
        .collect::<Vec<_>>()
        .join(" ");
    kept.push_str(kind.truncation_marker());
    (kept, true)
}

/// Strips ```json ... ``` or ``` ... ``` fences around a model reply.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let inner = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```JSON"))
        .or_else(|| text.strip_prefix("```"));
    match inner {
        Some(stripped) => {
            let stripped = stripped.trim_start();
            stripped
                .strip_suffix("```")
                .map(str::trim)
                .unwrap_or(stripped)
        }
        None => text,
    }
}

fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(strip_json_fences(raw)) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn rubric_score(value: &Value) -> Option<f64> {
    number(value).filter(|score| SCORE_RANGE.contains(score))
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(|item| text(Some(item))).collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn issue(value: &Value) -> Option<Issue> {
    let object = value.as_object()?;
    Some(Issue {
        location: text(object.get("location")),
        category: text(object.get("type")),
        severity: text(object.get("severity")),
        description: text(object.get("description").or_else(|| object.get("issue"))),
        correction: text(object.get("correction")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quality() -> EvaluationVerdict {
        EvaluationVerdict::pending(
            EvaluationKind::QualityScore,
            "qwen",
            "chapter_7_africa",
            "gemini/gemini-2.5-pro",
        )
    }

    fn fact_check() -> EvaluationVerdict {
        EvaluationVerdict::pending(
            EvaluationKind::FactCheck,
            "qwen",
            "chapter_7_africa",
            "gemini/gemini-2.5-pro",
        )
    }

    #[test]
    fn fenced_quality_reply_is_parsed() {
        let raw = "```json\n{\"accuracy\": 6, \"accuracy_justification\": \"solid\", \
                   \"ipcc_style\": 4, \"strengths\": [\"clear\"], \"overall_assessment\": \"ok\"}\n```";
        let verdict = quality().with_response(raw);

        assert_eq!(verdict.state, VerdictState::Parsed);
        assert_eq!(verdict.score("accuracy"), Some(6.0));
        assert_eq!(verdict.overall_score(), 5.0);
        assert_eq!(verdict.justifications["accuracy"], "solid");
        assert_eq!(verdict.strengths, vec!["clear"]);
        assert!(verdict.raw_response.is_none());
    }

    #[test]
    fn non_json_reply_degrades() {
        let verdict = quality().with_response("I cannot score this chapter.");

        assert_eq!(verdict.state, VerdictState::Degraded);
        assert_eq!(verdict.overall_assessment, "Error parsing quality response");
        assert_eq!(
            verdict.raw_response.as_deref(),
            Some("I cannot score this chapter.")
        );
        assert!(QUALITY_DIMENSIONS
            .iter()
            .all(|dim| verdict.score(dim) == Some(0.0)));
    }

    #[test]
    fn quality_object_without_scores_degrades() {
        let verdict = quality().with_response("{\"note\": \"nothing\"}");
        assert_eq!(verdict.state, VerdictState::Degraded);
    }

    #[test]
    fn scores_outside_the_rubric_scale_are_ignored() {
        let verdict = quality().with_response(
            r#"{"accuracy": 70, "ipcc_style": -3, "intelligence": 5, "overall_score": 33.5}"#,
        );

        assert_eq!(verdict.state, VerdictState::Parsed);
        assert_eq!(verdict.score("accuracy"), None);
        assert_eq!(verdict.score("ipcc_style"), None);
        assert_eq!(verdict.score("intelligence"), Some(5.0));
        assert_eq!(verdict.overall_score(), 5.0);
    }

    #[test]
    fn only_out_of_range_scores_degrade() {
        let verdict = quality().with_response(r#"{"accuracy": 70, "ipcc_style": 0}"#);

        assert_eq!(verdict.state, VerdictState::Degraded);
        assert_eq!(verdict.overall_score(), 0.0);
        assert!(verdict.raw_response.is_some());
    }

    #[test]
    fn fact_check_counts_fall_back_to_issue_list() {
        let raw = r#"{
            "issues": [
                {"location": "para 2", "type": "factual", "severity": "Critical", "description": "wrong", "correction": "right"},
                {"location": "para 5", "type": "style", "severity": "minor", "description": "vague"}
            ],
            "overall_assessment": "two issues",
            "confidence_score": 80
        }"#;
        let verdict = fact_check().with_response(raw);

        assert!(verdict.is_parsed());
        assert_eq!(verdict.total_issues(), 2);
        assert_eq!(verdict.count("critical_issues"), 1);
        assert_eq!(verdict.count("minor_issues"), 1);
        assert_eq!(verdict.issues[0].category, "factual");
        assert_eq!(verdict.confidence_score, Some(80.0));
        assert!(verdict.has_serious_issues());
    }

    #[test]
    fn provider_failure_is_an_error_verdict() {
        let verdict = fact_check().with_error("request timeout after 300s");
        assert_eq!(verdict.state, VerdictState::Error);
        assert_eq!(verdict.error.as_deref(), Some("request timeout after 300s"));
        assert_eq!(verdict.total_issues(), 0);
    }

    #[test]
    fn truncation_keeps_prefix_and_marks_it() {
        let (text, cut) = truncate_words("a b c d e", 3, EvaluationKind::FactCheck);
        assert!(cut);
        assert_eq!(text, "a b c\n\n[Content truncated for fact-checking...]");

        let (text, cut) = truncate_words("a b", 3, EvaluationKind::QualityScore);
        assert!(!cut);
        assert_eq!(text, "a b");
    }

    #[test]
    fn strips_fences() {
        assert_eq!(strip_json_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_json_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_json_fences("  {} "), "{}");
    }
}
