//! One-shot local generation: render the configured input file and leave the artifact
//! in its workspace.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::Config;
use crate::models::request::GenerationRequest;
use crate::render::generator::Generator;

pub async fn run_local(config: &Config) -> Result<PathBuf> {
    let generator = Generator::from_config(config);

    let generation = generator
        .generate(GenerationRequest {
            raw_json: None,
            theme: config.theme.clone(),
            output_kind: config.output_kind,
        })
        .await
        .with_context(|| format!("Failed to generate resume with theme '{}'", config.theme))?;

    let location = std::path::absolute(&generation.artifact.path)
        .unwrap_or_else(|_| generation.artifact.path.clone());
    info!("Success! You can find your resume at {}", location.display());
    Ok(location)
}
