//! Document Pipeline — resume JSON in, HTML file in the workspace out.
//!
//! Flow: resolve input → validate JSON → decode → normalize → resolve theme →
//!       render → persist → consolidate resources.
//!
//! Every step is blocking and runs to completion before the next one starts. Any
//! failure aborts the request; the returned path is only produced once all steps pass.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use walkdir::WalkDir;

use crate::models::resume::ResumeDocument;
use crate::render::engine::{RenderContext, ThemeOptions, ThemeRenderer};
use crate::render::error::PipelineError;
use crate::render::workspace::Workspace;

const THEME_EXTENSION: &str = "html";

#[derive(Clone)]
pub struct DocumentPipeline {
    themes_directory: PathBuf,
    /// Fallback input used only when a call supplies no JSON (local mode).
    input_file: Option<PathBuf>,
    renderer: Arc<dyn ThemeRenderer>,
}

impl DocumentPipeline {
    pub fn new(
        themes_directory: impl Into<PathBuf>,
        input_file: Option<PathBuf>,
        renderer: Arc<dyn ThemeRenderer>,
    ) -> Self {
        Self {
            themes_directory: themes_directory.into(),
            input_file,
            renderer,
        }
    }

    /// Renders `json` (or the configured input file) with `theme` into `workspace`.
    ///
    /// The workspace must already be staged. Returns the path of the written HTML file.
    pub fn render(
        &self,
        workspace: &Workspace,
        json: Option<&str>,
        theme: &str,
        options: &ThemeOptions,
    ) -> Result<PathBuf, PipelineError> {
        let owned;
        let json = match json {
            Some(text) => text,
            None => {
                owned = self.read_input_file()?;
                owned.as_str()
            }
        };

        let mut resume = parse_resume(json)?;
        resume.normalize();

        let template = self.resolve_theme(theme)?;
        let html = self.renderer.render(
            theme,
            &template,
            &RenderContext {
                resume: &resume,
                config: options,
            },
        )?;

        let location = workspace.output_html_file();
        write_html(&location, &html)?;
        info!(
            request_id = workspace.request_id,
            theme,
            path = %location.display(),
            bytes = html.len(),
            "Resume HTML written"
        );

        let local_resources = workspace.local_resource_directory();
        if workspace.resource_directory != local_resources {
            copy_tree(&workspace.resource_directory, &local_resources)?;
        }

        Ok(location)
    }

    /// Maps a theme name to `<themes>/<name>.html`, rejecting names that escape the
    /// themes directory.
    pub fn resolve_theme(&self, theme: &str) -> Result<PathBuf, PipelineError> {
        let path = self
            .themes_directory
            .join(format!("{theme}.{THEME_EXTENSION}"));

        let plain_name = !theme.is_empty()
            && Path::new(theme)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            && !theme.contains(['/', '\\']);

        if plain_name && path.is_file() {
            Ok(path)
        } else {
            Err(PipelineError::TemplateNotFound {
                theme: theme.to_string(),
                path,
            })
        }
    }

    /// Reads the input file line by line, terminating every line with `\n`.
    fn read_input_file(&self) -> Result<String, PipelineError> {
        let path = self.input_file.as_deref().ok_or_else(|| {
            PipelineError::InvalidInput("no resume JSON supplied and no input file configured".to_string())
        })?;

        let file = File::open(path).map_err(|e| PipelineError::io_at("open input file", path, e))?;
        let mut json = String::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| PipelineError::io_at("read input file", path, e))?;
            json.push_str(&line);
            json.push('\n');
        }
        Ok(json)
    }
}

/// Structural check (must be a JSON object) followed by a tolerant decode.
pub fn parse_resume(json: &str) -> Result<ResumeDocument, PipelineError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
    if !value.is_object() {
        return Err(PipelineError::InvalidInput(
            "resume document must be a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| PipelineError::InvalidInput(e.to_string()))
}

fn write_html(location: &Path, html: &str) -> Result<(), PipelineError> {
    if let Some(parent) = location.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PipelineError::io_at("create output directory", parent, e))?;
    }
    fs::write(location, html).map_err(|e| PipelineError::io_at("write", location, e))
}

/// Recursively copies the contents of `from` into `to`, overwriting files that exist.
fn copy_tree(from: &Path, to: &Path) -> Result<(), PipelineError> {
    for entry in WalkDir::new(from) {
        let entry = entry.map_err(|e| PipelineError::io_at("walk", from, e.into()))?;
        let Ok(relative) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| PipelineError::io_at("create", &target, e))?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|e| PipelineError::io_at("copy resource to", &target, e))?;
        }
    }
    Ok(())
}
