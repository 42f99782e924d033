use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use ar7_core::render::pdf_path_for;
use ar7_core::{DocumentRenderer, RenderError, RenderSettings};
use log::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Markdown to PDF through an external `pandoc` binary.
#[derive(Clone, Debug)]
pub struct PandocRenderer {
    binary: String,
    engine: String,
    fallback_engine: Option<String>,
    timeout: Duration,
}

impl PandocRenderer {
    pub fn new(binary: impl Into<String>, engine: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            engine: engine.into(),
            fallback_engine: None,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self {
            binary: settings.pandoc_binary.clone(),
            engine: settings.pdf_engine.clone(),
            fallback_engine: settings
                .fallback_engine
                .clone()
                .filter(|engine| !engine.trim().is_empty()),
            timeout: Duration::from_secs(settings.timeout_secs.max(1)),
        }
    }

    pub fn with_fallback(mut self, engine: impl Into<String>) -> Self {
        self.fallback_engine = Some(engine.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First line of `pandoc --version`.
    pub fn check_available(&self) -> Result<String, RenderError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .output()
            .map_err(|err| RenderError::ToolUnavailable {
                tool: self.binary.clone(),
                reason: err.to_string(),
            })?;
        if !output.status.success() {
            return Err(RenderError::ToolUnavailable {
                tool: self.binary.clone(),
                reason: format!("`--version` exited with {}", output.status),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    pub fn command(&self, markdown: &Path, pdf: &Path, engine: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(markdown)
            .arg("-o")
            .arg(pdf)
            .arg(format!("--pdf-engine={engine}"))
            .args(["-V", "geometry:margin=1in"])
            .args(["-V", "fontsize=11pt"])
            .args(["-V", "documentclass=report"])
            .args(["--toc", "--toc-depth=2"])
            .args(["-V", "linkcolor=blue"])
            .args(["-V", "urlcolor=blue"]);
        cmd
    }

    fn run_engine(&self, markdown: &Path, pdf: &Path, engine: &str) -> Result<(), RenderError> {
        let mut cmd = self.command(markdown, pdf, engine);
        debug!("pandoc command: {:?}", cmd);

        let mut child = cmd
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| RenderError::ToolUnavailable {
                tool: self.binary.clone(),
                reason: err.to_string(),
            })?;

        // Drained on a thread so a chatty LaTeX run cannot fill the pipe.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buffer = String::new();
                let _ = pipe.read_to_string(&mut buffer);
                buffer
            })
        });
        let status = wait_with_timeout(&mut child, self.timeout)?;
        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();

        if status.success() {
            Ok(())
        } else {
            Err(RenderError::Failed {
                engine: engine.to_string(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            })
        }
    }
}

impl DocumentRenderer for PandocRenderer {
    fn render(&self, markdown: &Path, pdf_dir: &Path) -> Result<PathBuf, RenderError> {
        let version = self.check_available()?;
        debug!("using {version}");

        fs::create_dir_all(pdf_dir).map_err(|source| RenderError::Io {
            path: pdf_dir.to_path_buf(),
            source,
        })?;
        let pdf = pdf_path_for(markdown, pdf_dir);

        match self.run_engine(markdown, &pdf, &self.engine) {
            Ok(()) => {}
            Err(err) => {
                let Some(fallback) = self.fallback_engine.as_deref() else {
                    return Err(err);
                };
                warn!(
                    "{} failed with {}: {err}; retrying with {fallback}",
                    markdown.display(),
                    self.engine
                );
                self.run_engine(markdown, &pdf, fallback)?;
            }
        }

        info!("rendered {}", pdf.display());
        Ok(pdf)
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, RenderError> {
    let started = Instant::now();
    loop {
        let polled = child.try_wait().map_err(|source| RenderError::Io {
            path: PathBuf::from("<pandoc>"),
            source,
        })?;
        if let Some(status) = polled {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RenderError::TimedOut {
                seconds: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
