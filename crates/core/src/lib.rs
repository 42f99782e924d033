pub mod config;
pub mod evaluation;
pub mod generation;
pub mod llm;
pub mod logging;
pub mod models;
pub mod prompts;
pub mod render;
pub mod report;
pub mod store;

pub use config::{
    Config, ConfigError, ConfigStore, CredentialError, CredentialReport, Credentials,
    EvaluationSettings, GenerationSettings, RenderSettings, ReportSettings, PROVIDER_KEYS,
    REQUIRED_KEYS,
};
pub use evaluation::{
    EvaluationError, EvaluationKind, EvaluationRequest, EvaluationRunner, EvaluationVerdict,
    Evaluator, FactCheckSummary, QualitySummary, VerdictState,
};
pub use generation::{
    compile_book, count_words, ChapterGenerator, ChapterMetadata, CrossModelRunner,
    GenerationError, GenerationResult, ModelRunSummary, ModelRunner, RunOutcome, RunSummary,
};
pub use llm::{
    ChatMessage, GenerationParams, LanguageModel, LanguageModelError, LanguageModelProvider, Role,
};
pub use logging::{LogLevel, LogRecord, LogSink, StdoutLogSink, VecLogSink};
pub use models::{ModelRegistry, ModelRegistryError, ModelSpec, Tier};
pub use prompts::{
    ChapterSelection, PromptError, PromptParams, PromptSpec, PromptStore, PromptStoreError,
    RubricRegistry,
};
pub use render::{DocumentRenderer, RenderError};
pub use report::{compile_master_index, compile_report, ComparisonResults, ReportOptions};
pub use store::{ArtifactStore, StoreError};
