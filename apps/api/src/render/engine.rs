//! Render Engine seam: (theme template, document) → HTML string.
//!
//! `DocumentPipeline` holds an `Arc<dyn ThemeRenderer>`; `TeraRenderer` is the only
//! backend today.

use std::path::Path;

use serde::Serialize;
use tera::{Context, Tera};

use crate::models::resume::ResumeDocument;
use crate::render::error::PipelineError;

/// Options themes may consult, exposed to templates as `config`.
#[derive(Debug, Clone, Serialize)]
pub struct ThemeOptions {
    pub show_branding: bool,
}

impl Default for ThemeOptions {
    fn default() -> Self {
        Self {
            show_branding: true,
        }
    }
}

/// Everything a template sees. Resume fields sit at the top level.
#[derive(Debug, Serialize)]
pub struct RenderContext<'a> {
    #[serde(flatten)]
    pub resume: &'a ResumeDocument,
    pub config: &'a ThemeOptions,
}

pub trait ThemeRenderer: Send + Sync {
    /// Renders the template file at `template` registered under `theme`.
    fn render(
        &self,
        theme: &str,
        template: &Path,
        context: &RenderContext<'_>,
    ) -> Result<String, PipelineError>;
}

/// Tera-backed renderer. Templates are loaded per call so theme edits apply immediately.
#[derive(Debug, Default, Clone, Copy)]
pub struct TeraRenderer;

impl ThemeRenderer for TeraRenderer {
    fn render(
        &self,
        theme: &str,
        template: &Path,
        context: &RenderContext<'_>,
    ) -> Result<String, PipelineError> {
        let to_render_error = |source: tera::Error| PipelineError::Render {
            theme: theme.to_string(),
            source,
        };

        // The ".html" suffix keeps Tera's autoescaping on for theme output.
        let name = format!("{theme}.html");
        let mut tera = Tera::default();
        tera.add_template_file(template, Some(name.as_str()))
            .map_err(to_render_error)?;

        let context = Context::from_serialize(context).map_err(to_render_error)?;
        tera.render(&name, &context).map_err(to_render_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn render_source(source: &str, resume: &ResumeDocument) -> Result<String, PipelineError> {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("t.html");
        fs::write(&template, source).unwrap();
        let options = ThemeOptions::default();
        TeraRenderer.render(
            "t",
            &template,
            &RenderContext {
                resume,
                config: &options,
            },
        )
    }

    #[test]
    fn test_flattened_context_exposes_top_level_fields() {
        let resume: ResumeDocument =
            serde_json::from_str(r#"{"name":"Ada","basics":{"label":"Analyst"}}"#).unwrap();
        let html = render_source(
            "{{ name }}|{{ basics.label }}|{{ config.show_branding }}",
            &resume,
        )
        .unwrap();
        assert_eq!(html, "Ada|Analyst|true");
    }

    #[test]
    fn test_output_is_autoescaped() {
        let resume: ResumeDocument = serde_json::from_str(r#"{"name":"<b>Ada</b>"}"#).unwrap();
        let html = render_source("{{ name }}", &resume).unwrap();
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_engine_failure_is_render_error() {
        let html = render_source("{{ missing.field }}", &ResumeDocument::default());
        assert!(matches!(html, Err(PipelineError::Render { .. })));
    }

    #[test]
    fn test_syntax_error_is_render_error() {
        let html = render_source("{% if %}", &ResumeDocument::default());
        assert!(matches!(html, Err(PipelineError::Render { .. })));
    }
}
