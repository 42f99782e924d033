use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::llm::{ChatMessage, GenerationParams};

/// Chapters used when a quick validation run asks for the first N.
pub const DEFAULT_TEST_CHAPTERS: &[&str] = &["summary_for_policymakers", "technical_summary"];

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    35_000
}

#[derive(Debug, Error)]
pub enum PromptStoreError {
    #[error("prompt file `{path}` could not be read: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("prompt file `{path}` is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("prompt document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("prompt document is malformed: {0}")]
    Invalid(String),
    #[error("chapter `{key}` has a malformed prompt: {source}")]
    Chapter {
        key: String,
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptParams {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for PromptParams {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl From<&PromptParams> for GenerationParams {
    fn from(params: &PromptParams) -> Self {
        GenerationParams::new(params.temperature, params.max_tokens)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PromptSpec {
    pub chapter_key: String,
    pub messages: Vec<ChatMessage>,
    pub params: PromptParams,
}

#[derive(Deserialize)]
struct RawPromptSpec {
    #[serde(default)]
    messages: Vec<ChatMessage>,
    #[serde(default)]
    params: PromptParams,
}

/// Which chapters a run should cover.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChapterSelection {
    Explicit(Vec<String>),
    /// The first N default test chapters.
    TestChapters(usize),
    All,
}

impl ChapterSelection {
    /// Parses a comma-separated list, dropping blanks.
    pub fn parse_list(list: &str) -> Self {
        ChapterSelection::Explicit(
            list.split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

/// Read-only chapter prompts, in the order the document lists them.
#[derive(Clone, Debug, Default)]
pub struct PromptStore {
    order: Vec<String>,
    prompts: BTreeMap<String, PromptSpec>,
}

impl PromptStore {
    pub fn from_path(path: &Path) -> Result<Self, PromptStoreError> {
        let data = fs::read_to_string(path).map_err(|source| PromptStoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_json::from_str(&data).map_err(|source| PromptStoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_value(value)
    }

    pub fn from_json_str(input: &str) -> Result<Self, PromptStoreError> {
        Self::from_value(serde_json::from_str(input)?)
    }

    pub fn from_value(value: Value) -> Result<Self, PromptStoreError> {
        let Value::Object(mut document) = value else {
            return Err(PromptStoreError::Invalid(
                "top level must be a JSON object".to_string(),
            ));
        };

        let order = take_prompt_keys(&mut document)?;
        let mut prompts = BTreeMap::new();
        for key in &order {
            let Some(body) = document.remove(key) else {
                continue;
            };
            let raw: RawPromptSpec = serde_json::from_value(body).map_err(|source| {
                PromptStoreError::Chapter {
                    key: key.clone(),
                    source,
                }
            })?;
            prompts.insert(
                key.clone(),
                PromptSpec {
                    chapter_key: key.clone(),
                    messages: raw.messages,
                    params: raw.params,
                },
            );
        }

        Ok(Self { order, prompts })
    }

    pub fn from_specs(specs: Vec<PromptSpec>) -> Self {
        let order = specs.iter().map(|spec| spec.chapter_key.clone()).collect();
        let prompts = specs
            .into_iter()
            .map(|spec| (spec.chapter_key.clone(), spec))
            .collect();
        Self { order, prompts }
    }

    pub fn get(&self, chapter_key: &str) -> Option<&PromptSpec> {
        self.prompts.get(chapter_key)
    }

    pub fn contains(&self, chapter_key: &str) -> bool {
        self.prompts.contains_key(chapter_key)
    }

    pub fn chapter_keys(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    /// Keys listed in `prompt_keys` that have no prompt body.
    pub fn missing_keys(&self) -> Vec<&str> {
        self.order
            .iter()
            .filter(|key| !self.prompts.contains_key(*key))
            .map(String::as_str)
            .collect()
    }

    pub fn resolve_chapters(&self, selection: &ChapterSelection) -> Vec<String> {
        match selection {
            ChapterSelection::Explicit(keys) => keys.clone(),
            ChapterSelection::TestChapters(count) => DEFAULT_TEST_CHAPTERS
                .iter()
                .take(*count)
                .map(|key| key.to_string())
                .collect(),
            ChapterSelection::All => self.order.clone(),
        }
    }
}

fn take_prompt_keys(document: &mut Map<String, Value>) -> Result<Vec<String>, PromptStoreError> {
    let keys = document
        .remove("prompt_keys")
        .ok_or_else(|| PromptStoreError::Invalid("missing `prompt_keys` array".to_string()))?;
    let Value::Array(items) = keys else {
        return Err(PromptStoreError::Invalid(
            "`prompt_keys` must be an array".to_string(),
        ));
    };

    let mut order: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::String(key) if !order.contains(&key) => order.push(key),
            Value::String(_) => {}
            other => {
                return Err(PromptStoreError::Invalid(format!(
                    "`prompt_keys` entries must be strings, found {other}"
                )))
            }
        }
    }
    Ok(order)
}
