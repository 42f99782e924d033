use std::path::PathBuf;
use thiserror::Error;

mod rubric;
mod store;
mod template;

pub use rubric::{RubricRegistry, FACT_CHECK_RUBRIC, QUALITY_RUBRIC};
pub use store::{
    ChapterSelection, PromptParams, PromptSpec, PromptStore, PromptStoreError,
    DEFAULT_TEST_CHAPTERS,
};
pub use template::{PromptArguments, PromptSource, PromptTemplate};

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("rubric `{0}` not found")]
    NotFound(String),
    #[error("missing argument `{argument}` when rendering rubric `{key}`")]
    MissingArgument { key: String, argument: String },
    #[error("rubric `{key}` declares required `{argument}` but has no such placeholder")]
    UnknownRequired { key: String, argument: String },
    #[error("failed to read rubric file `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse built-in rubrics: {0}")]
    ParseBuiltIn(toml::de::Error),
    #[error("failed to parse rubric file `{path}` as TOML: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to parse rubric file `{path}` as YAML: {source}")]
    ParseYaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}
