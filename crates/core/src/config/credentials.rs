use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Provider key names the default model registry needs.
pub const REQUIRED_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "XAI_API_KEY",
    "TOGETHER_AI_API_KEY",
    "DEEPINFRA_API_KEY",
    "HUGGINGFACE_API_KEY",
];

/// Every key a provider adapter can ask for: the required set plus the
/// direct DeepSeek and Mistral endpoints.
pub const PROVIDER_KEYS: &[&str] = &[
    "OPENAI_API_KEY",
    "ANTHROPIC_API_KEY",
    "GEMINI_API_KEY",
    "XAI_API_KEY",
    "TOGETHER_AI_API_KEY",
    "DEEPINFRA_API_KEY",
    "HUGGINGFACE_API_KEY",
    "DEEPSEEK_API_KEY",
    "MISTRAL_API_KEY",
];

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read credential file `{path}`: {source}")]
    Read {
        path: PathBuf,
        source: dotenvy::Error,
    },
}

/// API keys read once at startup and handed to the adapters by reference.
#[derive(Clone, Default)]
pub struct Credentials {
    values: BTreeMap<String, String>,
    source: Option<PathBuf>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("source", &self.source)
            .finish()
    }
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut credentials = Self::default();
        for (key, value) in pairs {
            credentials.insert(key, value);
        }
        credentials
    }

    /// Parses a `KEY=VALUE` file. Later lines override earlier ones and a
    /// missing file yields an empty set.
    pub fn from_env_file(path: &Path) -> Result<Self, CredentialError> {
        let mut credentials = Self::default();
        if !path.is_file() {
            return Ok(credentials);
        }

        let iter = dotenvy::from_path_iter(path).map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        for item in iter {
            let (key, value) = item.map_err(|source| CredentialError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            credentials.insert(key, value);
        }
        credentials.source = Some(path.to_path_buf());
        Ok(credentials)
    }

    /// Reads `path`, then fills provider keys the file left unset from the
    /// process environment.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        Ok(Self::from_env_file(path)?.with_process_env())
    }

    pub fn with_process_env(mut self) -> Self {
        for key in PROVIDER_KEYS {
            if self.get(key).is_none() {
                if let Ok(value) = std::env::var(key) {
                    self.insert(*key, value);
                }
            }
        }
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let key = key.into();
        if value.trim().is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn report(&self) -> CredentialReport {
        let (loaded, missing): (Vec<&str>, Vec<&str>) =
            REQUIRED_KEYS.iter().partition(|key| self.contains(key));
        CredentialReport {
            source: self.source.clone(),
            loaded: loaded.into_iter().map(str::to_string).collect(),
            missing: missing.into_iter().map(str::to_string).collect(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialReport {
    pub source: Option<PathBuf>,
    pub loaded: Vec<String>,
    pub missing: Vec<String>,
}

impl CredentialReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn parses_env_file_with_comments_and_overrides() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".env");
        fs::write(
            &path,
            "# provider keys\nOPENAI_API_KEY=first\n\nGEMINI_API_KEY=gem\nOPENAI_API_KEY=second\n",
        )
        .unwrap();

        let credentials = Credentials::from_env_file(&path).unwrap();
        assert_eq!(credentials.get("OPENAI_API_KEY"), Some("second"));
        assert_eq!(credentials.get("GEMINI_API_KEY"), Some("gem"));
        assert_eq!(credentials.source(), Some(path.as_path()));
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let temp = tempdir().unwrap();
        let credentials = Credentials::from_env_file(&temp.path().join(".env")).unwrap();
        assert_eq!(credentials.report().missing.len(), REQUIRED_KEYS.len());
        assert!(credentials.source().is_none());
    }

    #[test]
    fn report_partitions_required_keys() {
        let credentials = Credentials::from_pairs([
            ("ANTHROPIC_API_KEY", "a"),
            ("XAI_API_KEY", "x"),
            ("UNRELATED", "ignored"),
            ("DEEPINFRA_API_KEY", "  "),
        ]);
        let report = credentials.report();
        assert_eq!(report.loaded, vec!["ANTHROPIC_API_KEY", "XAI_API_KEY"]);
        assert_eq!(report.missing.len(), 5);
        assert!(report.missing.contains(&"DEEPINFRA_API_KEY".to_string()));
        assert!(!report.is_complete());
    }

    #[test]
    fn process_env_fills_every_provider_key() {
        std::env::set_var("MISTRAL_API_KEY", "from-env");
        let credentials = Credentials::from_pairs([("OPENAI_API_KEY", "file")]).with_process_env();

        assert_eq!(credentials.get("MISTRAL_API_KEY"), Some("from-env"));
        assert_eq!(credentials.get("OPENAI_API_KEY"), Some("file"));
        assert!(REQUIRED_KEYS.iter().all(|key| PROVIDER_KEYS.contains(key)));
    }

    #[test]
    fn debug_output_hides_values() {
        let credentials = Credentials::from_pairs([("OPENAI_API_KEY", "sk-secret")]);
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("OPENAI_API_KEY"));
        assert!(!rendered.contains("sk-secret"));
    }
}
