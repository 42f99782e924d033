use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use thiserror::Error;

use super::book::compile_book;
use super::chapter::ChapterGenerator;
use super::{GenerationResult, ModelRunSummary};
use crate::llm::{LanguageModel, LanguageModelProvider};
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::models::{ModelSpec, Tier};
use crate::prompts::PromptStore;
use crate::render::DocumentRenderer;
use crate::store::{ArtifactStore, StoreError, PDF_DIR_NAME, RUN_SUMMARY_FILE_NAME};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no chapters selected")]
    NoChapters,
    #[error("no models selected")]
    NoModels,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runs every requested chapter for a single model.
pub struct ModelRunner<'a> {
    store: &'a ArtifactStore,
    sink: &'a dyn LogSink,
    overwrite: bool,
    delay: Duration,
}

impl<'a> ModelRunner<'a> {
    pub fn new(store: &'a ArtifactStore, sink: &'a dyn LogSink) -> Self {
        Self {
            store,
            sink,
            overwrite: false,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Chapters are attempted in the given order. Keys the prompt store does
    /// not know are skipped with a warning. The summary is persisted once all
    /// chapters are done.
    pub fn run_model(
        &self,
        model: &dyn LanguageModel,
        spec: &ModelSpec,
        prompts: &PromptStore,
        chapter_keys: &[String],
    ) -> Result<ModelRunSummary, GenerationError> {
        self.log(
            LogLevel::Info,
            format!("{} ({}): {} chapter(s)", spec.id, spec.name, chapter_keys.len()),
        );

        let generator = ChapterGenerator::new(self.store, self.sink).with_overwrite(self.overwrite);
        let mut results = Vec::with_capacity(chapter_keys.len());
        for key in chapter_keys {
            let Some(prompt) = prompts.get(key) else {
                self.log(
                    LogLevel::Warn,
                    format!("{}: chapter `{key}` not found in prompts, skipping", spec.id),
                );
                continue;
            };
            if !results.is_empty() && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            results.push(generator.generate(model, spec, prompt));
        }

        self.finish(spec, results)
    }

    /// Records every known chapter as failed without calling any model.
    /// Chapters already stored are kept as they are unless overwriting.
    pub fn fail_model(
        &self,
        spec: &ModelSpec,
        prompts: &PromptStore,
        chapter_keys: &[String],
        reason: &str,
    ) -> Result<ModelRunSummary, GenerationError> {
        self.log(
            LogLevel::Error,
            format!("{}: model unavailable: {reason}", spec.id),
        );
        let generator = ChapterGenerator::new(self.store, self.sink).with_overwrite(self.overwrite);
        let results = chapter_keys
            .iter()
            .filter(|key| prompts.contains(key))
            .map(|key| {
                generator
                    .existing(spec, key)
                    .unwrap_or_else(|| GenerationResult::failed(&spec.id, key, reason, 0.0))
            })
            .collect();
        self.finish(spec, results)
    }

    fn finish(
        &self,
        spec: &ModelSpec,
        results: Vec<GenerationResult>,
    ) -> Result<ModelRunSummary, GenerationError> {
        let summary = ModelRunSummary::from_results(spec, results);
        self.store.write_summary(&summary)?;
        self.log(
            LogLevel::Info,
            format!(
                "{}: {}/{} succeeded, {} words",
                summary.model_id, summary.successful, summary.total_chapters, summary.total_words
            ),
        );
        Ok(summary)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message.into()));
    }
}

/// Top-level record written to `run_summary.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub tier: Tier,
    pub chapters: Vec<String>,
    pub models: Vec<ModelRunSummary>,
    pub total_models: usize,
    pub total_chapters: usize,
    pub total_words: usize,
}

impl RunSummary {
    pub fn new(
        generated_at: String,
        tier: Tier,
        chapters: Vec<String>,
        models: Vec<ModelRunSummary>,
    ) -> Self {
        Self {
            generated_at,
            tier,
            chapters,
            total_models: models.len(),
            total_chapters: models.iter().map(|m| m.total_chapters).sum(),
            total_words: models.iter().map(|m| m.total_words).sum(),
            models,
        }
    }
}

/// Books and PDFs produced after generation.
#[derive(Clone, Debug, Default)]
pub struct Publication {
    pub books: Vec<PathBuf>,
    pub pdfs: Vec<PathBuf>,
    /// Markdown file and the reason its PDF could not be produced.
    pub render_failures: Vec<(PathBuf, String)>,
}

#[derive(Clone, Debug, Default)]
pub struct RunOutcome {
    pub summaries: Vec<ModelRunSummary>,
    pub publication: Publication,
    pub summary_file: Option<PathBuf>,
}

impl RunOutcome {
    /// Render failures are not counted.
    pub fn had_failures(&self) -> bool {
        self.summaries.iter().any(|summary| summary.failed > 0)
    }

    pub fn total_words(&self) -> usize {
        self.summaries.iter().map(|s| s.total_words).sum()
    }
}

/// Runs models one after another; one model failing never stops the rest.
pub struct CrossModelRunner<'a> {
    store: &'a ArtifactStore,
    sink: &'a dyn LogSink,
    overwrite: bool,
    delay: Duration,
    compile_books: bool,
}

impl<'a> CrossModelRunner<'a> {
    pub fn new(store: &'a ArtifactStore, sink: &'a dyn LogSink) -> Self {
        Self {
            store,
            sink,
            overwrite: false,
            delay: Duration::ZERO,
            compile_books: true,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_books(mut self, compile_books: bool) -> Self {
        self.compile_books = compile_books;
        self
    }

    /// PDFs are rendered only when a renderer is given and books are enabled.
    pub fn run_all(
        &self,
        provider: &dyn LanguageModelProvider,
        specs: &[ModelSpec],
        prompts: &PromptStore,
        chapter_keys: &[String],
        renderer: Option<&dyn DocumentRenderer>,
    ) -> Result<RunOutcome, GenerationError> {
        if specs.is_empty() {
            return Err(GenerationError::NoModels);
        }
        if chapter_keys.is_empty() {
            return Err(GenerationError::NoChapters);
        }

        let generated_at = Utc::now().to_rfc3339();
        let tier = specs[0].tier;
        let runner = ModelRunner::new(self.store, self.sink)
            .with_delay(self.delay)
            .with_overwrite(self.overwrite);

        let mut summaries = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            self.log(
                LogLevel::Info,
                format!("[{}/{}] {} - {}", index + 1, specs.len(), spec.id, spec.provider),
            );
            let summary = match provider.model(&spec.name) {
                Ok(model) => runner.run_model(model.as_ref(), spec, prompts, chapter_keys)?,
                Err(err) => runner.fail_model(spec, prompts, chapter_keys, &err.to_string())?,
            };
            summaries.push(summary);
        }

        let publication = if self.compile_books {
            let model_ids: Vec<String> = summaries
                .iter()
                .filter(|s| s.successful > 0)
                .map(|s| s.model_id.clone())
                .collect();
            self.publish(&model_ids, tier, chapter_keys, renderer, &generated_at)?
        } else {
            Publication::default()
        };

        let run_summary = RunSummary::new(generated_at, tier, chapter_keys.to_vec(), summaries);
        let summary_file = self.store.write_json(RUN_SUMMARY_FILE_NAME, &run_summary)?;

        let succeeded = run_summary.models.iter().map(|m| m.successful).sum::<usize>();
        self.log(
            LogLevel::Info,
            format!(
                "run complete: {succeeded}/{} chapters, {} words across {} model(s)",
                run_summary.total_chapters, run_summary.total_words, run_summary.total_models
            ),
        );

        Ok(RunOutcome {
            summaries: run_summary.models,
            publication,
            summary_file: Some(summary_file),
        })
    }

    /// Compiles a book per model and, with a renderer, a PDF per book.
    /// Render failures are logged and recorded, never returned.
    pub fn publish(
        &self,
        model_ids: &[String],
        tier: Tier,
        chapter_keys: &[String],
        renderer: Option<&dyn DocumentRenderer>,
        generated_at: &str,
    ) -> Result<Publication, GenerationError> {
        let mut publication = Publication::default();
        for model_id in model_ids {
            match compile_book(self.store, model_id, tier, chapter_keys, generated_at)? {
                Some(path) => {
                    self.log(LogLevel::Info, format!("{model_id}: book {}", path.display()));
                    publication.books.push(path);
                }
                None => self.log(
                    LogLevel::Warn,
                    format!("{model_id}: no chapters to compile"),
                ),
            }
        }

        let Some(renderer) = renderer else {
            return Ok(publication);
        };
        let pdf_dir = self.store.path(PDF_DIR_NAME);
        for book in &publication.books {
            match renderer.render(book, &pdf_dir) {
                Ok(pdf) => {
                    self.log(LogLevel::Info, format!("PDF {}", pdf.display()));
                    publication.pdfs.push(pdf);
                }
                Err(err) => {
                    self.log(
                        LogLevel::Warn,
                        format!("PDF for {} skipped: {err}", book.display()),
                    );
                    publication
                        .render_failures
                        .push((book.clone(), err.to_string()));
                }
            }
        }
        Ok(publication)
    }

    fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.sink.log(LogRecord::new(level, message.into()));
    }
}
