use chrono::Utc;
use std::time::Instant;

use crate::generation::{count_words, ChapterMetadata, GenerationResult};
use crate::llm::{GenerationParams, LanguageModel};
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::models::ModelSpec;
use crate::prompts::PromptSpec;
use crate::store::ArtifactStore;

/// Produces one chapter for one model and persists it.
pub struct ChapterGenerator<'a> {
    store: &'a ArtifactStore,
    sink: &'a dyn LogSink,
    overwrite: bool,
}

impl<'a> ChapterGenerator<'a> {
    pub fn new(store: &'a ArtifactStore, sink: &'a dyn LogSink) -> Self {
        Self {
            store,
            sink,
            overwrite: false,
        }
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Never returns `Err`: every failure of the unit becomes a failed result.
    pub fn generate(
        &self,
        model: &dyn LanguageModel,
        spec: &ModelSpec,
        prompt: &PromptSpec,
    ) -> GenerationResult {
        let chapter_key = prompt.chapter_key.as_str();

        if let Some(existing) = self.existing(spec, chapter_key) {
            return existing;
        }

        if prompt.messages.is_empty() {
            self.log(
                LogLevel::Error,
                format!("{}/{chapter_key}: no messages in prompt", spec.id),
            );
            return GenerationResult::failed(&spec.id, chapter_key, "No messages", 0.0);
        }

        self.log(
            LogLevel::Info,
            format!("{}/{chapter_key}: generating with {}", spec.id, spec.name),
        );

        let params = GenerationParams::from(&prompt.params);
        let started = Instant::now();
        let response = model.invoke(&prompt.messages, &params);
        let duration = started.elapsed().as_secs_f64();

        let text = match response {
            Ok(text) if text.trim().is_empty() => {
                self.log(
                    LogLevel::Error,
                    format!("{}/{chapter_key}: empty response", spec.id),
                );
                return GenerationResult::failed(&spec.id, chapter_key, "empty response", duration);
            }
            Ok(text) => text,
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    format!("{}/{chapter_key}: failed: {err}", spec.id),
                );
                return GenerationResult::failed(&spec.id, chapter_key, err.to_string(), duration);
            }
        };

        let word_count = count_words(&text);
        let metadata = ChapterMetadata {
            chapter_key: chapter_key.to_string(),
            model: spec.name.clone(),
            model_id: spec.id.clone(),
            tier: spec.tier,
            generated_at: Utc::now().to_rfc3339(),
            duration_seconds: duration,
            word_count,
            params: prompt.params.clone(),
        };

        match self
            .store
            .write_chapter(&spec.id, chapter_key, &text, &metadata, self.overwrite)
        {
            Ok(path) => {
                self.log(
                    LogLevel::Info,
                    format!(
                        "{}/{chapter_key}: {word_count} words in {duration:.1}s",
                        spec.id
                    ),
                );
                GenerationResult::succeeded(&spec.id, chapter_key, text, duration, path)
            }
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    format!("{}/{chapter_key}: could not save output: {err}", spec.id),
                );
                GenerationResult::failed(&spec.id, chapter_key, err.to_string(), duration)
            }
        }
    }

    /// Result for a chapter already on disk, rebuilt from its metadata.
    /// `None` when the chapter should be generated.
    pub(crate) fn existing(&self, spec: &ModelSpec, chapter_key: &str) -> Option<GenerationResult> {
        if self.overwrite || !self.store.chapter_exists(&spec.id, chapter_key) {
            return None;
        }

        let stored = self
            .store
            .read_chapter(&spec.id, chapter_key)
            .and_then(|text| Ok((text, self.store.read_metadata(&spec.id, chapter_key)?)));
        let result = match stored {
            Ok((Some(text), Some(metadata))) => {
                self.log(
                    LogLevel::Info,
                    format!(
                        "{}/{chapter_key}: already present ({} words), keeping stored output",
                        spec.id, metadata.word_count
                    ),
                );
                GenerationResult::restored(
                    text,
                    &metadata,
                    self.store.chapter_path(&spec.id, chapter_key),
                )
            }
            Ok(_) => {
                self.log(
                    LogLevel::Warn,
                    format!("{}/{chapter_key}: stored output is incomplete", spec.id),
                );
                GenerationResult::failed(
                    &spec.id,
                    chapter_key,
                    "output already exists but is incomplete (use overwrite to regenerate)",
                    0.0,
                )
            }
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    format!("{}/{chapter_key}: could not read stored output: {err}", spec.id),
                );
                GenerationResult::failed(&spec.id, chapter_key, err.to_string(), 0.0)
            }
        };
        Some(result)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatMessage, LanguageModelError};
    use crate::logging::VecLogSink;
    use crate::models::{ModelRegistry, Tier};
    use crate::prompts::PromptParams;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct FixedModel {
        reply: Result<&'static str, &'static str>,
        calls: AtomicUsize,
    }

    impl FixedModel {
        fn ok(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
            }
        }

        fn err(message: &'static str) -> Self {
            Self {
                reply: Err(message),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl LanguageModel for FixedModel {
        fn invoke(
            &self,
            _messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<String, LanguageModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .map_err(LanguageModelError::msg)
        }
    }

    fn spec() -> ModelSpec {
        ModelRegistry::ar7_defaults(Tier::Lite)
            .get("qwen")
            .cloned()
            .unwrap()
    }

    fn prompt(messages: Vec<ChatMessage>) -> PromptSpec {
        PromptSpec {
            chapter_key: "technical_summary".into(),
            messages,
            params: PromptParams::default(),
        }
    }

    #[test]
    fn success_writes_text_and_metadata() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        let sink = VecLogSink::new();
        let model = FixedModel::ok("Warming is unequivocal.");

        let result = ChapterGenerator::new(&store, &sink).generate(
            &model,
            &spec(),
            &prompt(vec![ChatMessage::user("Write it.")]),
        );

        assert!(result.success);
        assert_eq!(result.word_count, 3);
        assert_eq!(result.text(), Some("Warming is unequivocal."));
        let meta = store.read_metadata("qwen", "technical_summary").unwrap().unwrap();
        assert_eq!(meta.word_count, 3);
        assert_eq!(meta.model, "deepinfra/Qwen/Qwen2.5-7B-Instruct");
    }

    #[test]
    fn empty_messages_skip_the_model() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        let model = FixedModel::ok("unused");

        let result =
            ChapterGenerator::new(&store, &VecLogSink::new()).generate(&model, &spec(), &prompt(vec![]));

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("No messages"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn whitespace_reply_is_a_failure() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        let model = FixedModel::ok("  \n ");

        let result = ChapterGenerator::new(&store, &VecLogSink::new()).generate(
            &model,
            &spec(),
            &prompt(vec![ChatMessage::user("Write it.")]),
        );

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("empty response"));
        assert!(!store.chapter_path("qwen", "technical_summary").exists());
    }

    #[test]
    fn provider_error_keeps_stale_file_untouched() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        let sink = VecLogSink::new();
        let messages = vec![ChatMessage::user("Write it.")];

        ChapterGenerator::new(&store, &sink).generate(
            &FixedModel::ok("old text"),
            &spec(),
            &prompt(messages.clone()),
        );
        let result = ChapterGenerator::new(&store, &sink)
            .with_overwrite(true)
            .generate(&FixedModel::err("rate limit"), &spec(), &prompt(messages));

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("rate limit"));
        assert_eq!(
            store.read_chapter("qwen", "technical_summary").unwrap().as_deref(),
            Some("old text")
        );
        assert!(sink.contains("rate limit"));
    }

    #[test]
    fn existing_output_is_reused_without_overwrite() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        let sink = VecLogSink::new();
        let messages = vec![ChatMessage::user("Write it.")];
        ChapterGenerator::new(&store, &sink).generate(
            &FixedModel::ok("first stored draft"),
            &spec(),
            &prompt(messages.clone()),
        );
        let stored = store.read_metadata("qwen", "technical_summary").unwrap().unwrap();

        let second = FixedModel::ok("second");
        let result = ChapterGenerator::new(&store, &sink).generate(&second, &spec(), &prompt(messages));

        assert!(result.success);
        assert_eq!(result.error, None);
        assert_eq!(result.word_count, 3);
        assert_eq!(result.duration, stored.duration_seconds);
        assert_eq!(result.text(), Some("first stored draft"));
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            store.read_chapter("qwen", "technical_summary").unwrap().as_deref(),
            Some("first stored draft")
        );
        assert!(sink.contains("already present"));
    }

    #[test]
    fn text_without_metadata_is_reported_incomplete() {
        let temp = tempdir().unwrap();
        let store = ArtifactStore::open(temp.path()).unwrap();
        std::fs::create_dir_all(store.model_dir("qwen")).unwrap();
        std::fs::write(store.chapter_path("qwen", "technical_summary"), "orphan").unwrap();
        let model = FixedModel::ok("fresh");

        let result = ChapterGenerator::new(&store, &VecLogSink::new()).generate(
            &model,
            &spec(),
            &prompt(vec![ChatMessage::user("Write it.")]),
        );

        assert!(!result.success);
        assert!(result.error.unwrap().contains("incomplete"));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }
}
