use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The terminal format a caller asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Html,
    Pdf,
    Preview,
}

impl OutputKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputKind::Html | OutputKind::Preview => "text/html; charset=utf-8",
            OutputKind::Pdf => "application/pdf",
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputKind::Html => "html",
            OutputKind::Pdf => "pdf",
            OutputKind::Preview => "preview",
        })
    }
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(OutputKind::Html),
            "pdf" => Ok(OutputKind::Pdf),
            "preview" => Ok(OutputKind::Preview),
            other => Err(format!("unknown output kind '{other}' (expected html, pdf or preview)")),
        }
    }
}

/// One inbound generation call. Immutable once built.
///
/// `raw_json` is `None` only in local mode, where the document is read from the
/// configured input file instead.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub raw_json: Option<String>,
    pub theme: String,
    pub output_kind: OutputKind,
}

/// HTML written by the document pipeline, plus the resources it references.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub html_path: PathBuf,
    pub resource_directory: PathBuf,
    pub output_kind: OutputKind,
}

/// The single file handed to delivery for a request.
#[derive(Debug, Clone)]
pub struct TerminalArtifact {
    pub path: PathBuf,
    pub mime_type: &'static str,
}
