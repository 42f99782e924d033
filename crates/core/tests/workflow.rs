use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use ar7_core::report::{compile_report, write_reports, ReportOptions};
use ar7_core::{
    ArtifactStore, ChatMessage, CrossModelRunner, EvaluationKind, EvaluationRequest,
    EvaluationSettings, Evaluator, GenerationParams, LanguageModel, LanguageModelError,
    LanguageModelProvider, ModelRegistry, ModelRunner, ModelSpec, PromptParams, PromptSpec,
    PromptStore, RubricRegistry, Tier, VecLogSink, VerdictState,
};
use tempfile::tempdir;

struct MockLanguageModel {
    responses: Mutex<VecDeque<Result<String, io::Error>>>,
}

impl MockLanguageModel {
    fn replying<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
        }
    }

    fn failing(error: io::Error) -> Self {
        Self {
            responses: Mutex::new(VecDeque::from([Err(error)])),
        }
    }

    fn assert_empty(&self) {
        let guard = self.responses.lock().expect("mock mutex poisoned");
        assert!(
            guard.is_empty(),
            "expected all mock responses to be consumed"
        );
    }
}

impl LanguageModel for MockLanguageModel {
    fn invoke(
        &self,
        _messages: &[ChatMessage],
        _params: &GenerationParams,
    ) -> Result<String, LanguageModelError> {
        let mut guard = self.responses.lock().expect("mock mutex poisoned");
        match guard.pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(err)) => Err(LanguageModelError::new(err)),
            None => Err(LanguageModelError::new(io::Error::new(
                io::ErrorKind::Other,
                "mock language model has no remaining responses",
            ))),
        }
    }
}

/// Hands out a fixed reply per provider-qualified model name.
struct MockProvider {
    replies: Vec<(String, String)>,
}

impl LanguageModelProvider for MockProvider {
    fn model(&self, name: &str) -> Result<Box<dyn LanguageModel>, LanguageModelError> {
        let reply = self
            .replies
            .iter()
            .find(|(model, _)| model == name)
            .map(|(_, reply)| reply.clone())
            .ok_or_else(|| LanguageModelError::msg(format!("no mock for {name}")))?;
        Ok(Box::new(MockLanguageModel::replying(std::iter::repeat(reply).take(8))))
    }
}

fn intro_prompts() -> PromptStore {
    PromptStore::from_specs(vec![PromptSpec {
        chapter_key: "intro".to_string(),
        messages: vec![
            ChatMessage::system("You are an IPCC lead author."),
            ChatMessage::user("Write the introduction."),
        ],
        params: PromptParams::default(),
    }])
}

fn registry_spec(id: &str) -> ModelSpec {
    ModelRegistry::ar7_defaults(Tier::Lite)
        .get(id)
        .cloned()
        .expect("model in registry")
}

#[test]
fn single_chapter_success_is_counted_and_persisted() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let store = ArtifactStore::open(temp.path())?;
    let sink = VecLogSink::new();
    let model = MockLanguageModel::replying(["Hello world. This is a test."]);
    let spec = registry_spec("mistral");

    let summary = ModelRunner::new(&store, &sink).run_model(
        &model,
        &spec,
        &intro_prompts(),
        &["intro".to_string()],
    )?;
    model.assert_empty();

    let result = &summary.results[0];
    assert!(result.success);
    assert_eq!(result.word_count, 6);
    assert!(result.duration >= 0.0);
    assert_eq!(result.text(), Some("Hello world. This is a test."));
    assert_eq!(summary.total_words, 6);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 0);

    let text = fs::read_to_string(temp.path().join("mistral").join("intro.txt"))?;
    assert_eq!(text, "Hello world. This is a test.");
    let metadata = store.read_metadata("mistral", "intro")?.expect("metadata");
    assert_eq!(metadata.word_count, 6);
    assert_eq!(metadata.model, spec.name);

    let reloaded = store.read_summary("mistral")?.expect("summary on disk");
    assert_eq!(reloaded.total_words, summary.total_words);
    assert_eq!(reloaded.total_time, summary.total_time);
    assert_eq!(reloaded.successful, summary.successful);
    assert_eq!(reloaded.failed, summary.failed);
    assert_eq!(reloaded.results[0].word_count, 6);
    Ok(())
}

#[test]
fn provider_timeout_marks_chapter_failed_without_output() -> Result<(), Box<dyn std::error::Error>>
{
    let temp = tempdir()?;
    let store = ArtifactStore::open(temp.path())?;
    let sink = VecLogSink::new();
    let model = MockLanguageModel::failing(io::Error::new(
        io::ErrorKind::TimedOut,
        "request timeout after 600s",
    ));

    let summary = ModelRunner::new(&store, &sink).run_model(
        &model,
        &registry_spec("mistral"),
        &intro_prompts(),
        &["intro".to_string()],
    )?;

    let result = &summary.results[0];
    assert!(!result.success);
    assert!(result.text().is_none());
    assert!(result
        .error
        .as_deref()
        .is_some_and(|e| e.contains("timeout")));
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_words, 0);
    assert_eq!(summary.avg_words, 0.0);
    assert!(!temp.path().join("mistral").join("intro.txt").exists());
    assert!(!temp
        .path()
        .join("mistral")
        .join("intro_metadata.json")
        .exists());
    Ok(())
}

#[test]
fn two_models_are_compared_with_deterministic_order() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let store = ArtifactStore::open(temp.path())?;
    let sink = VecLogSink::new();
    let specs = ModelRegistry::ar7_defaults(Tier::Lite)
        .select(&["qwen", "mistral"])?
        .as_slice()
        .to_vec();
    let provider = MockProvider {
        replies: vec![
            (registry_spec("qwen").name, "alpha beta gamma".to_string()),
            (registry_spec("mistral").name, "one two three".to_string()),
        ],
    };

    let outcome = CrossModelRunner::new(&store, &sink).with_books(false).run_all(
        &provider,
        &specs,
        &intro_prompts(),
        &["intro".to_string()],
        None,
    )?;
    assert!(!outcome.had_failures());

    let options = ReportOptions {
        generated_at: "2026-10-17T00:00:00+00:00".to_string(),
        min_words: 1,
        output_root: temp.path().to_path_buf(),
    };
    let report = compile_report(&outcome.summaries, &[], &options);
    let mistral = report.find("| mistral | 3 |").expect("mistral row");
    let qwen = report.find("| qwen | 3 |").expect("qwen row");
    assert!(mistral < qwen, "equal word counts sort by model id");

    let files = write_reports(&store, &outcome.summaries, &[], &options)?;
    assert!(files.report.is_file());
    assert!(fs::read_to_string(&files.index)?.contains("comparison/comparison_report.md"));
    assert_eq!(files.comparison.total_words, 6);
    Ok(())
}

#[test]
fn repeated_runs_on_fresh_directories_agree() -> Result<(), Box<dyn std::error::Error>> {
    let run = |root: &Path| -> Result<String, Box<dyn std::error::Error>> {
        let store = ArtifactStore::open(root)?;
        let sink = VecLogSink::new();
        let model = MockLanguageModel::replying(["Deterministic stub output for the intro."]);
        ModelRunner::new(&store, &sink).run_model(
            &model,
            &registry_spec("qwen"),
            &intro_prompts(),
            &["intro".to_string()],
        )?;
        let summary = store.read_summary("qwen")?.expect("summary");
        let partition: Vec<(String, bool, usize)> = summary
            .results
            .iter()
            .map(|r| (r.chapter_key.clone(), r.success, r.word_count))
            .collect();
        Ok(format!(
            "{}:{}:{}:{:?}",
            summary.total_words, summary.successful, summary.failed, partition
        ))
    };

    let first = tempdir()?;
    let second = tempdir()?;
    assert_eq!(run(first.path())?, run(second.path())?);
    Ok(())
}

#[test]
fn unparseable_grading_reply_degrades_instead_of_failing() -> Result<(), Box<dyn std::error::Error>>
{
    let rubrics = RubricRegistry::new()?;
    let settings = EvaluationSettings::default();
    let grader = MockLanguageModel::replying(["Sorry, I can only answer in prose."]);
    let evaluator = Evaluator::new(&grader, "gemini/gemini-2.5-pro", &rubrics, &settings);

    let verdict = evaluator.evaluate(&EvaluationRequest::new(
        EvaluationKind::QualityScore,
        "qwen",
        "intro",
        "Hello world. This is a test.",
    ))?;

    assert_eq!(verdict.state, VerdictState::Degraded);
    assert_eq!(verdict.overall_score(), 0.0);
    assert_eq!(verdict.overall_assessment, "Error parsing quality response");
    assert_eq!(
        verdict.raw_response.as_deref(),
        Some("Sorry, I can only answer in prose.")
    );
    Ok(())
}

#[test]
fn rerun_without_overwrite_keeps_stored_summary() -> Result<(), Box<dyn std::error::Error>> {
    let temp = tempdir()?;
    let store = ArtifactStore::open(temp.path())?;
    let sink = VecLogSink::new();
    let spec = registry_spec("qwen");
    let chapters = ["intro".to_string()];

    let first = MockLanguageModel::replying(["one two three four"]);
    ModelRunner::new(&store, &sink).run_model(&first, &spec, &intro_prompts(), &chapters)?;

    let second = MockLanguageModel::replying(["second draft"]);
    let summary =
        ModelRunner::new(&store, &sink).run_model(&second, &spec, &intro_prompts(), &chapters)?;
    assert_eq!((summary.successful, summary.failed, summary.total_words), (1, 0, 4));

    let on_disk = store.read_summary("qwen")?.expect("summary persisted");
    assert_eq!(on_disk.successful, 1);
    assert_eq!(on_disk.failed, 0);
    assert_eq!(on_disk.total_words, 4);
    assert!(on_disk.results[0].success);
    assert_eq!(
        store.read_chapter("qwen", "intro")?.as_deref(),
        Some("one two three four")
    );

    ModelRunner::new(&store, &sink)
        .with_overwrite(true)
        .run_model(&second, &spec, &intro_prompts(), &chapters)?;
    second.assert_empty();
    assert_eq!(store.read_chapter("qwen", "intro")?.as_deref(), Some("second draft"));
    assert_eq!(store.read_summary("qwen")?.map(|s| s.total_words), Some(2));
    Ok(())
}
