//! Failure taxonomy for a single generation request.
//!
//! Every variant is fatal to the request that raised it. Nothing here is retried.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The request body (or input file) is not a JSON object.
    #[error("invalid resume JSON: {0}")]
    InvalidInput(String),

    #[error("theme '{theme}' not found (looked for {})", .path.display())]
    TemplateNotFound { theme: String, path: PathBuf },

    /// Template engine failure; the engine's own error is kept as the source.
    #[error("failed to render theme '{theme}'")]
    Render {
        theme: String,
        #[source]
        source: tera::Error,
    },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("resource archive {} is unreadable: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{program} failed: {reason}")]
    Subprocess { program: String, reason: String },
}

impl PipelineError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        PipelineError::Io {
            context: context.into(),
            source,
        }
    }

    /// Shorthand for the common "<verb> <path>" I/O context.
    pub(crate) fn io_at(action: &str, path: &Path, source: io::Error) -> Self {
        PipelineError::io(format!("failed to {action} {}", path.display()), source)
    }

    pub(crate) fn subprocess(program: &Path, reason: impl Into<String>) -> Self {
        PipelineError::Subprocess {
            program: program.display().to_string(),
            reason: reason.into(),
        }
    }
}
