//! File-backed artifact store.
//!
//! Each model owns a directory under the root. A chapter is a pair of files,
//! `<chapter>.txt` and `<chapter>_metadata.json`, which [`ArtifactStore::write_chapter`]
//! lands together or not at all.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::generation::{ChapterMetadata, ModelRunSummary};

pub const SUMMARY_FILE_NAME: &str = "generation_summary.json";
pub const RUN_SUMMARY_FILE_NAME: &str = "run_summary.json";
pub const PDF_DIR_NAME: &str = "pdfs";
pub const FACT_CHECK_DIR_NAME: &str = "fact_checking";
pub const QUALITY_DIR_NAME: &str = "quality_scoring";
pub const COMPARISON_DIR_NAME: &str = "comparison";

/// Directories under the root that never hold a model.
pub const RESERVED_DIRS: &[&str] = &[
    PDF_DIR_NAME,
    FACT_CHECK_DIR_NAME,
    QUALITY_DIR_NAME,
    COMPARISON_DIR_NAME,
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to read `{path}`: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to write `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to parse `{path}`: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize `{path}`: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("output for `{model_id}/{chapter_key}` already exists (enable overwrite to replace it)")]
    AlreadyExists {
        model_id: String,
        chapter_key: String,
    },
    #[error("`{0}` is not a valid artifact name")]
    InvalidName(String),
}

#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens the store at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        create_dir(&root)?;
        Ok(Self { root })
    }

    /// Opens an existing store without creating anything.
    pub fn existing(root: impl Into<PathBuf>) -> Option<Self> {
        let root = root.into();
        root.is_dir().then_some(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn model_dir(&self, model_id: &str) -> PathBuf {
        self.root.join(model_id)
    }

    pub fn chapter_path(&self, model_id: &str, chapter_key: &str) -> PathBuf {
        self.model_dir(model_id).join(format!("{chapter_key}.txt"))
    }

    pub fn metadata_path(&self, model_id: &str, chapter_key: &str) -> PathBuf {
        self.model_dir(model_id)
            .join(format!("{chapter_key}_metadata.json"))
    }

    pub fn summary_path(&self, model_id: &str) -> PathBuf {
        self.model_dir(model_id).join(SUMMARY_FILE_NAME)
    }

    pub fn chapter_exists(&self, model_id: &str, chapter_key: &str) -> bool {
        self.chapter_path(model_id, chapter_key).is_file()
            || self.metadata_path(model_id, chapter_key).is_file()
    }

    /// Writes the text and metadata pair. Both files are staged in the model
    /// directory first; if the second rename fails the first is removed, so a
    /// failure leaves neither file behind.
    pub fn write_chapter(
        &self,
        model_id: &str,
        chapter_key: &str,
        text: &str,
        metadata: &ChapterMetadata,
        overwrite: bool,
    ) -> Result<PathBuf, StoreError> {
        check_name(model_id)?;
        check_name(chapter_key)?;

        if !overwrite && self.chapter_exists(model_id, chapter_key) {
            return Err(StoreError::AlreadyExists {
                model_id: model_id.to_string(),
                chapter_key: chapter_key.to_string(),
            });
        }

        let dir = self.model_dir(model_id);
        create_dir(&dir)?;
        let text_path = self.chapter_path(model_id, chapter_key);
        let meta_path = self.metadata_path(model_id, chapter_key);

        let meta_json =
            serde_json::to_string_pretty(metadata).map_err(|source| StoreError::Serialize {
                path: meta_path.clone(),
                source,
            })?;

        let staged_text = stage(&dir, text.as_bytes())?;
        let staged_meta = stage(&dir, meta_json.as_bytes())?;

        staged_text
            .persist(&text_path)
            .map_err(|err| StoreError::Write {
                path: text_path.clone(),
                source: err.error,
            })?;

        if let Err(err) = staged_meta.persist(&meta_path) {
            let _ = fs::remove_file(&text_path);
            let _ = fs::remove_file(&meta_path);
            return Err(StoreError::Write {
                path: meta_path,
                source: err.error,
            });
        }

        Ok(text_path)
    }

    pub fn read_chapter(
        &self,
        model_id: &str,
        chapter_key: &str,
    ) -> Result<Option<String>, StoreError> {
        read_optional(&self.chapter_path(model_id, chapter_key))
    }

    pub fn read_metadata(
        &self,
        model_id: &str,
        chapter_key: &str,
    ) -> Result<Option<ChapterMetadata>, StoreError> {
        self.read_json_at(&self.metadata_path(model_id, chapter_key))
    }

    pub fn write_summary(&self, summary: &ModelRunSummary) -> Result<PathBuf, StoreError> {
        check_name(&summary.model_id)?;
        let path = self.summary_path(&summary.model_id);
        self.write_json_at(&path, summary)?;
        Ok(path)
    }

    pub fn read_summary(&self, model_id: &str) -> Result<Option<ModelRunSummary>, StoreError> {
        self.read_json_at(&self.summary_path(model_id))
    }

    /// Every stored summary, ordered by model id.
    pub fn read_summaries(&self) -> Result<Vec<ModelRunSummary>, StoreError> {
        let mut summaries = Vec::new();
        for model_id in self.list_models()? {
            if let Some(summary) = self.read_summary(&model_id)? {
                summaries.push(summary);
            }
        }
        Ok(summaries)
    }

    /// Model directories under the root, sorted.
    pub fn list_models(&self) -> Result<Vec<String>, StoreError> {
        let mut models = Vec::new();
        for entry in read_dir(&self.root)? {
            let path = entry;
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') || name.starts_with("__") || RESERVED_DIRS.contains(&name) {
                continue;
            }
            models.push(name.to_string());
        }
        models.sort();
        Ok(models)
    }

    /// Chapter keys with a text file for `model_id`, sorted.
    pub fn list_chapters(&self, model_id: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.model_dir(model_id);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut chapters: Vec<String> = read_dir(&dir)?
            .into_iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == "txt"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        chapters.sort();
        Ok(chapters)
    }

    pub fn write_json<T: Serialize>(
        &self,
        relative: impl AsRef<Path>,
        value: &T,
    ) -> Result<PathBuf, StoreError> {
        let path = self.path(relative);
        self.write_json_at(&path, value)?;
        Ok(path)
    }

    pub fn read_json<T: DeserializeOwned>(
        &self,
        relative: impl AsRef<Path>,
    ) -> Result<Option<T>, StoreError> {
        self.read_json_at(&self.path(relative))
    }

    pub fn write_text(
        &self,
        relative: impl AsRef<Path>,
        text: &str,
    ) -> Result<PathBuf, StoreError> {
        let path = self.path(relative);
        write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }

    fn write_json_at<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, json.as_bytes())
    }

    fn read_json_at<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, StoreError> {
        let Some(data) = read_optional(path)? else {
            return Ok(None);
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| StoreError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }
}

fn check_name(name: &str) -> Result<(), StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed == ".."
        || trimmed.contains(['/', '\\'])
        || RESERVED_DIRS.contains(&trimmed)
    {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(|source| StoreError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn read_dir(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let read_err = |source| StoreError::Read {
        path: dir.to_path_buf(),
        source,
    };
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(read_err)? {
        paths.push(entry.map_err(read_err)?.path());
    }
    Ok(paths)
}

fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(StoreError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn stage(dir: &Path, bytes: &[u8]) -> Result<NamedTempFile, StoreError> {
    let write_err = |source| StoreError::Write {
        path: dir.to_path_buf(),
        source,
    };
    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(bytes).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    Ok(file)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    create_dir(&dir)?;
    stage(&dir, bytes)?
        .persist(path)
        .map_err(|err| StoreError::Write {
            path: path.to_path_buf(),
            source: err.error,
        })?;
    Ok(())
}
