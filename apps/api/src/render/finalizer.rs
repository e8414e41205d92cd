//! Output Finalizer — turns rendered HTML into the artifact the caller asked for.
//!
//! HTML / PREVIEW → external inliner, combined stdout+stderr captured as `resume_inline.html`.
//! PDF            → external render-to-pdf tool writing `output.pdf`.
//!
//! Both run inside the workspace root. A run only counts as successful when the process
//! exits zero within the timeout AND the expected file is there afterwards.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};
use url::Url;

use crate::models::request::{OutputKind, RenderedArtifact, TerminalArtifact};
use crate::render::error::PipelineError;
use crate::render::workspace::Workspace;

pub const INLINE_HTML_FILE: &str = "resume_inline.html";
pub const PDF_FILE: &str = "output.pdf";

/// A program plus any fixed leading arguments, e.g. `npx inliner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ExternalCommand {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a configured command line on whitespace. Returns `None` when blank.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let program = parts.next()?;
        Some(Self::new(program, parts))
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }
}

#[async_trait]
pub trait ArtifactFinalizer: Send + Sync {
    async fn finalize(
        &self,
        workspace: &Workspace,
        rendered: &RenderedArtifact,
    ) -> Result<TerminalArtifact, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct SubprocessFinalizer {
    inliner: ExternalCommand,
    pdf_renderer: ExternalCommand,
    timeout: Duration,
}

impl SubprocessFinalizer {
    pub fn new(inliner: ExternalCommand, pdf_renderer: ExternalCommand, timeout: Duration) -> Self {
        Self {
            inliner,
            pdf_renderer,
            timeout,
        }
    }

    async fn inline_html(
        &self,
        workspace: &Workspace,
        rendered: &RenderedArtifact,
    ) -> Result<PathBuf, PipelineError> {
        let html_path = fs::canonicalize(&rendered.html_path)
            .map_err(|e| PipelineError::io_at("resolve", &rendered.html_path, e))?;
        let output_path = workspace.output_file(INLINE_HTML_FILE);
        let stdout = File::create(&output_path)
            .map_err(|e| PipelineError::io_at("create", &output_path, e))?;
        let stderr = stdout
            .try_clone()
            .map_err(|e| PipelineError::io_at("share handle for", &output_path, e))?;

        let mut command = self.inliner.command();
        command
            .arg(&html_path)
            .current_dir(&workspace.root_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        self.run(&self.inliner, command).await?;
        // The redirect target exists before the child starts, so an empty file means
        // the inliner produced nothing.
        expect_output(&self.inliner, &output_path, true)?;
        Ok(output_path)
    }

    async fn render_pdf(
        &self,
        workspace: &Workspace,
        rendered: &RenderedArtifact,
    ) -> Result<PathBuf, PipelineError> {
        let html_path = fs::canonicalize(&rendered.html_path)
            .map_err(|e| PipelineError::io_at("resolve", &rendered.html_path, e))?;
        let url = Url::from_file_path(&html_path).map_err(|()| {
            PipelineError::io_at(
                "build file URL for",
                &html_path,
                io::Error::new(io::ErrorKind::InvalidInput, "not an absolute path"),
            )
        })?;
        let output_path = workspace.output_file(PDF_FILE);

        let mut command = self.pdf_renderer.command();
        command
            .arg("--url")
            .arg(url.as_str())
            .arg("--pdf")
            .arg(PDF_FILE)
            .current_dir(&workspace.root_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        self.run(&self.pdf_renderer, command).await?;
        expect_output(&self.pdf_renderer, &output_path, false)?;
        Ok(output_path)
    }

    /// Spawns `command` and waits for it, killing the child if the timeout expires.
    async fn run(&self, external: &ExternalCommand, mut command: Command) -> Result<(), PipelineError> {
        let program = external.program.as_path();
        let started_at = Instant::now();

        let child = command.kill_on_drop(true).spawn().map_err(|e| {
            warn!(program = %program.display(), error = %e, "Failed to spawn renderer");
            PipelineError::subprocess(program, format!("failed to spawn: {e}"))
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result
                .map_err(|e| PipelineError::subprocess(program, format!("failed to wait: {e}")))?,
            Err(_) => {
                warn!(
                    program = %program.display(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Renderer timed out; killed"
                );
                return Err(PipelineError::subprocess(
                    program,
                    format!("timed out after {} ms", self.timeout.as_millis()),
                ));
            }
        };

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                program = %program.display(),
                exit_code = output.status.code().unwrap_or(-1),
                elapsed_ms,
                stderr = %stderr,
                "Renderer exited abnormally"
            );
            let mut reason = format!("exited with {}", output.status);
            if !stderr.is_empty() {
                reason.push_str(": ");
                reason.push_str(&stderr);
            }
            return Err(PipelineError::subprocess(program, reason));
        }

        info!(program = %program.display(), elapsed_ms, "Renderer finished");
        Ok(())
    }
}

fn expect_output(
    external: &ExternalCommand,
    path: &Path,
    require_content: bool,
) -> Result<(), PipelineError> {
    let missing = || {
        PipelineError::subprocess(
            &external.program,
            format!("expected output {} was not produced", path.display()),
        )
    };
    let metadata = fs::metadata(path).map_err(|_| missing())?;
    if !metadata.is_file() || (require_content && metadata.len() == 0) {
        return Err(missing());
    }
    Ok(())
}

#[async_trait]
impl ArtifactFinalizer for SubprocessFinalizer {
    async fn finalize(
        &self,
        workspace: &Workspace,
        rendered: &RenderedArtifact,
    ) -> Result<TerminalArtifact, PipelineError> {
        let path = match rendered.output_kind {
            OutputKind::Html | OutputKind::Preview => self.inline_html(workspace, rendered).await?,
            OutputKind::Pdf => self.render_pdf(workspace, rendered).await?,
        };
        info!(
            request_id = workspace.request_id,
            kind = %rendered.output_kind,
            path = %path.display(),
            resources = %rendered.resource_directory.display(),
            "Artifact finalized"
        );
        Ok(TerminalArtifact {
            path,
            mime_type: rendered.output_kind.mime_type(),
        })
    }
}
