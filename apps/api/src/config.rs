use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::models::request::OutputKind;
use crate::render::finalizer::ExternalCommand;

/// Application configuration loaded from environment variables.
/// Every setting has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Long-running HTTP service with shared resources, vs. a one-shot local render.
    pub server_mode: bool,
    pub output_directory: PathBuf,
    /// Per-workspace resource directory, relative to the workspace root.
    pub resource_directory: String,
    /// Local mode input document.
    pub input_file_name: Option<PathBuf>,
    /// The bundled resource archive shipped with the service.
    pub resource_zip: PathBuf,
    /// Server mode copy of the archive, extracted once into the shared resource directory.
    pub server_initial_resource_zip: PathBuf,
    pub themes_directory: PathBuf,
    pub theme: String,
    pub output_kind: OutputKind,
    pub inliner: ExternalCommand,
    pub pdf_renderer: ExternalCommand,
    pub subprocess_timeout: Duration,
    pub show_branding: bool,
    pub keep_workspaces: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup. `from_env` passes the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let output_directory = PathBuf::from(var("OUTPUT_DIRECTORY", "data"));
        let resource_zip = PathBuf::from(var("RESOURCE_ZIP", "resources.zip"));
        let server_initial_resource_zip = lookup("SERVER_INITIAL_RESOURCE_ZIP")
            .map(PathBuf::from)
            .unwrap_or_else(|| output_directory.join("server-resources.zip"));
        let input_file_name = Some(var("INPUT_FILE", "resume.json"))
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let resource_directory = var("RESOURCE_DIRECTORY", "resources");
        if PathBuf::from(&resource_directory).is_absolute() {
            return Err(anyhow!(
                "RESOURCE_DIRECTORY must be a relative path, got '{resource_directory}'"
            ));
        }

        Ok(Config {
            server_mode: parse_flag("SERVER_MODE", &var("SERVER_MODE", "false"))?,
            output_directory,
            resource_directory,
            input_file_name,
            resource_zip,
            server_initial_resource_zip,
            themes_directory: PathBuf::from(var("THEMES_DIRECTORY", "themes")),
            theme: var("THEME", "default"),
            output_kind: parse_value("OUTPUT_KIND", &var("OUTPUT_KIND", "html"))?,
            inliner: command("INLINER_BIN", &var("INLINER_BIN", "inliner"))?,
            pdf_renderer: command(
                "PDF_RENDERER_BIN",
                &var("PDF_RENDERER_BIN", "chrome-headless-render-pdf"),
            )?,
            subprocess_timeout: Duration::from_secs(parse_value(
                "SUBPROCESS_TIMEOUT_SECS",
                &var("SUBPROCESS_TIMEOUT_SECS", "60"),
            )?),
            show_branding: parse_flag("SHOW_BRANDING", &var("SHOW_BRANDING", "true"))?,
            keep_workspaces: parse_flag("KEEP_WORKSPACES", &var("KEEP_WORKSPACES", "false"))?,
            port: var("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: var("RUST_LOG", "info"),
        })
    }

    /// Where server mode extracts the resources every request shares.
    pub fn shared_resource_directory(&self) -> PathBuf {
        self.output_directory.join("resources")
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{key} must be a boolean, got '{other}'")),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{key} is invalid: {e}"))
}

fn command(key: &str, value: &str) -> Result<ExternalCommand> {
    ExternalCommand::parse(value).with_context(|| format!("{key} must name an executable"))
}
