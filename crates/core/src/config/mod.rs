use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::models::Tier;

mod credentials;

pub use credentials::{
    CredentialError, CredentialReport, Credentials, PROVIDER_KEYS, REQUIRED_KEYS,
};

fn default_prompts_file() -> PathBuf {
    PathBuf::from("prompts/ar7_model_comparison_prompts.json")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output/ar7_run")
}

fn default_generation_timeout() -> u64 {
    600
}

fn default_compile_books() -> bool {
    true
}

fn default_evaluator_model() -> String {
    "gemini/gemini-2.5-pro".to_string()
}

fn default_evaluation_temperature() -> f32 {
    0.2
}

fn default_fact_check_budget() -> usize {
    5000
}

fn default_quality_budget() -> usize {
    3000
}

fn default_min_content_chars() -> usize {
    100
}

fn default_evaluation_timeout() -> u64 {
    300
}

fn default_evaluation_max_tokens() -> u32 {
    8192
}

fn default_min_words() -> usize {
    500
}

fn default_pandoc_binary() -> String {
    "pandoc".to_string()
}

fn default_pdf_engine() -> String {
    "xelatex".to_string()
}

fn default_fallback_engine() -> Option<String> {
    Some("pdflatex".to_string())
}

fn default_render_timeout() -> u64 {
    300
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    #[serde(default)]
    pub tier: Tier,
    #[serde(default = "default_prompts_file")]
    pub prompts_file: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Unset means the tier's own pause.
    #[serde(default)]
    pub inter_call_delay_secs: Option<u64>,
    #[serde(default = "default_generation_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub overwrite: bool,
    #[serde(default = "default_compile_books")]
    pub compile_books: bool,
    #[serde(default)]
    pub render_pdf: bool,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tier: Tier::default(),
            prompts_file: default_prompts_file(),
            output_dir: default_output_dir(),
            inter_call_delay_secs: None,
            request_timeout_secs: default_generation_timeout(),
            overwrite: false,
            compile_books: default_compile_books(),
            render_pdf: false,
        }
    }
}

impl GenerationSettings {
    pub fn inter_call_delay(&self) -> Duration {
        Duration::from_secs(
            self.inter_call_delay_secs
                .unwrap_or_else(|| self.tier.default_delay_secs()),
        )
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EvaluationSettings {
    #[serde(default = "default_evaluator_model")]
    pub evaluator_model: String,
    #[serde(default = "default_evaluation_temperature")]
    pub temperature: f32,
    #[serde(default = "default_fact_check_budget")]
    pub fact_check_word_budget: usize,
    #[serde(default = "default_quality_budget")]
    pub quality_word_budget: usize,
    #[serde(default = "default_min_content_chars")]
    pub min_content_chars: usize,
    #[serde(default = "default_evaluation_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_evaluation_max_tokens")]
    pub max_tokens: u32,
    /// Extra directories holding rubric overrides (`.toml`, `.yaml`).
    #[serde(default)]
    pub rubric_directories: Vec<PathBuf>,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            evaluator_model: default_evaluator_model(),
            temperature: default_evaluation_temperature(),
            fact_check_word_budget: default_fact_check_budget(),
            quality_word_budget: default_quality_budget(),
            min_content_chars: default_min_content_chars(),
            request_timeout_secs: default_evaluation_timeout(),
            max_tokens: default_evaluation_max_tokens(),
            rubric_directories: Vec::new(),
        }
    }
}

impl EvaluationSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReportSettings {
    #[serde(default = "default_min_words")]
    pub min_words: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            min_words: default_min_words(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RenderSettings {
    #[serde(default = "default_pandoc_binary")]
    pub pandoc_binary: String,
    #[serde(default = "default_pdf_engine")]
    pub pdf_engine: String,
    #[serde(default = "default_fallback_engine")]
    pub fallback_engine: Option<String>,
    #[serde(default = "default_render_timeout")]
    pub timeout_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            pandoc_binary: default_pandoc_binary(),
            pdf_engine: default_pdf_engine(),
            fallback_engine: default_fallback_engine(),
            timeout_secs: default_render_timeout(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub generation: GenerationSettings,
    #[serde(default)]
    pub evaluation: EvaluationSettings,
    #[serde(default)]
    pub report: ReportSettings,
    #[serde(default)]
    pub render: RenderSettings,
    /// Base URL overrides keyed by provider tag (`openai`, `deepinfra`, ...).
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(&self, provider: &str) -> Option<&str> {
        self.endpoints
            .get(provider)
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
    }

    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(input)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn to_path(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Opens `path`, falling back to defaults when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let config = if path.exists() {
            Config::from_path(&path)?
        } else {
            Config::default()
        };

        Ok(Self { path, config })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        Config::from_path(path.as_ref())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        self.config.to_path(&self.path)
    }
}
