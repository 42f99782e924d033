use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("`{tool}` is not available: {reason}")]
    ToolUnavailable { tool: String, reason: String },
    #[error("PDF engine `{engine}` failed ({status}): {stderr}")]
    Failed {
        engine: String,
        status: String,
        stderr: String,
    },
    #[error("renderer timeout after {seconds}s")]
    TimedOut { seconds: u64 },
    #[error("render I/O error on `{path}`: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Turns a markdown document into a PDF inside `pdf_dir`.
pub trait DocumentRenderer {
    fn render(&self, markdown: &Path, pdf_dir: &Path) -> Result<PathBuf, RenderError>;
}

/// `<pdf_dir>/<markdown stem>.pdf`.
pub fn pdf_path_for(markdown: &Path, pdf_dir: &Path) -> PathBuf {
    let stem = markdown
        .file_stem()
        .map(|stem| stem.to_os_string())
        .unwrap_or_else(|| "document".into());
    let mut path = pdf_dir.join(stem);
    path.set_extension("pdf");
    path
}
