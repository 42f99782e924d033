use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::template::{PromptArguments, PromptSource, PromptTemplate};
use super::PromptError;

const BUILT_IN_RUBRICS: &str = include_str!("../../prompts/rubrics.toml");

pub const FACT_CHECK_RUBRIC: &str = "fact_check";
pub const QUALITY_RUBRIC: &str = "quality_score";

/// Evaluation rubrics keyed by name. Files in override directories replace
/// built-in entries with the same key; later files win.
#[derive(Debug)]
pub struct RubricRegistry {
    templates: BTreeMap<String, PromptTemplate>,
    directories: Vec<PathBuf>,
}

impl RubricRegistry {
    pub fn new() -> Result<Self, PromptError> {
        Self::with_directories(Vec::<PathBuf>::new())
    }

    pub fn with_directories<I, P>(directories: I) -> Result<Self, PromptError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut registry = Self {
            templates: BTreeMap::new(),
            directories: directories.into_iter().map(Into::into).collect(),
        };
        registry.reload()?;
        Ok(registry)
    }

    pub fn reload(&mut self) -> Result<(), PromptError> {
        let mut templates = BTreeMap::new();
        let built_in: RubricDocument =
            toml::from_str(BUILT_IN_RUBRICS).map_err(PromptError::ParseBuiltIn)?;
        insert_document(&mut templates, built_in, &PromptSource::BuiltIn)?;

        for dir in &self.directories {
            load_directory(dir, &mut templates)?;
        }

        self.templates = templates;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&PromptTemplate> {
        self.templates.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn format(&self, key: &str, arguments: &PromptArguments) -> Result<String, PromptError> {
        self.get(key)
            .ok_or_else(|| PromptError::NotFound(key.to_string()))?
            .render(arguments)
    }
}

fn load_directory(
    dir: &Path,
    templates: &mut BTreeMap<String, PromptTemplate>,
) -> Result<(), PromptError> {
    if !dir.is_dir() {
        return Ok(());
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    for path in files {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let document: RubricDocument = match ext.as_deref() {
            Some("toml") => {
                let contents = fs::read_to_string(&path).map_err(io_error(&path))?;
                toml::from_str(&contents).map_err(|source| PromptError::ParseToml {
                    path: path.clone(),
                    source,
                })?
            }
            Some("yaml") | Some("yml") => {
                let contents = fs::read_to_string(&path).map_err(io_error(&path))?;
                serde_yaml::from_str(&contents).map_err(|source| PromptError::ParseYaml {
                    path: path.clone(),
                    source,
                })?
            }
            _ => continue,
        };
        insert_document(templates, document, &PromptSource::File(path.clone()))?;
    }

    Ok(())
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> PromptError {
    let path = path.to_path_buf();
    move |source| PromptError::Io { path, source }
}

fn insert_document(
    templates: &mut BTreeMap<String, PromptTemplate>,
    document: RubricDocument,
    source: &PromptSource,
) -> Result<(), PromptError> {
    for (key, raw) in document.prompts {
        let template = PromptTemplate::parse(
            key.clone(),
            &raw.template,
            &raw.required,
            raw.description,
            source.clone(),
        )?;
        templates.insert(key, template);
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RubricDocument {
    #[serde(default)]
    prompts: BTreeMap<String, RawRubric>,
}

#[derive(Debug, Deserialize)]
struct RawRubric {
    #[serde(alias = "text")]
    template: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    required: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn fact_check_args() -> PromptArguments {
        PromptArguments::from([
            ("chapter_name".into(), "Chapter 7 Africa".into()),
            ("model_name".into(), "qwen".into()),
            ("word_count".into(), "4200".into()),
            ("content".into(), "Sahel rainfall ...".into()),
        ])
    }

    #[test]
    fn built_in_rubrics_are_available() {
        let registry = RubricRegistry::new().unwrap();
        assert!(registry.get(FACT_CHECK_RUBRIC).is_some());
        assert!(registry.get(QUALITY_RUBRIC).is_some());

        let prompt = registry.format(FACT_CHECK_RUBRIC, &fact_check_args()).unwrap();
        assert!(prompt.contains("CHAPTER: Chapter 7 Africa"));
        assert!(prompt.contains("\"total_issues\""));
        assert!(!prompt.contains("{{"));
    }

    #[test]
    fn quality_rubric_needs_content() {
        let registry = RubricRegistry::new().unwrap();
        let err = registry
            .format(QUALITY_RUBRIC, &PromptArguments::new())
            .unwrap_err();
        assert!(matches!(err, PromptError::MissingArgument { .. }));
    }

    #[test]
    fn toml_and_yaml_overrides_replace_built_ins() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.toml"),
            "[prompts.fact_check]\ntemplate = \"toml {content}\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("b.yaml"),
            "prompts:\n  quality_score:\n    template: \"yaml {content}\"\n",
        )
        .unwrap();

        let registry = RubricRegistry::with_directories([dir.path()]).unwrap();
        let args = PromptArguments::from([("content".into(), "x".into())]);
        assert_eq!(registry.format(FACT_CHECK_RUBRIC, &args).unwrap(), "toml x");
        assert_eq!(registry.format(QUALITY_RUBRIC, &args).unwrap(), "yaml x");
        assert!(registry
            .get(FACT_CHECK_RUBRIC)
            .and_then(|t| t.source().as_path())
            .is_some());
    }

    #[test]
    fn unknown_key_is_not_found() {
        let registry = RubricRegistry::new().unwrap();
        assert!(matches!(
            registry.format("peer_review", &PromptArguments::new()),
            Err(PromptError::NotFound(_))
        ));
    }
}
