//! Resume generation — orchestrates one request end to end.
//!
//! Flow: allocate workspace → stage resources → document pipeline → finalizer.
//!
//! The first three steps are blocking filesystem/template work and run together on
//! `spawn_blocking`; finalization awaits the external renderer processes. Each stage
//! starts only after the previous one succeeded.

use std::io;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::models::request::{GenerationRequest, RenderedArtifact, TerminalArtifact};
use crate::render::engine::{TeraRenderer, ThemeOptions};
use crate::render::error::PipelineError;
use crate::render::finalizer::{ArtifactFinalizer, SubprocessFinalizer};
use crate::render::pipeline::DocumentPipeline;
use crate::render::staging::ResourceStager;
use crate::render::workspace::{Workspace, WorkspaceAllocator};

/// A finished request: its workspace and the artifact inside it.
#[derive(Debug, Clone)]
pub struct Generation {
    pub workspace: Workspace,
    pub artifact: TerminalArtifact,
}

#[derive(Clone)]
pub struct Generator {
    allocator: WorkspaceAllocator,
    stager: Arc<ResourceStager>,
    pipeline: DocumentPipeline,
    finalizer: Arc<dyn ArtifactFinalizer>,
    theme_options: ThemeOptions,
    /// Remove the workspace of a request that failed.
    discard_failed: bool,
}

impl Generator {
    pub fn new(
        allocator: WorkspaceAllocator,
        stager: ResourceStager,
        pipeline: DocumentPipeline,
        finalizer: Arc<dyn ArtifactFinalizer>,
        theme_options: ThemeOptions,
    ) -> Self {
        Self {
            allocator,
            stager: Arc::new(stager),
            pipeline,
            finalizer,
            theme_options,
            discard_failed: false,
        }
    }

    pub fn discard_failed(mut self, discard: bool) -> Self {
        self.discard_failed = discard;
        self
    }

    /// Wires the production components described by `config`.
    pub fn from_config(config: &Config) -> Self {
        let stager = if config.server_mode {
            ResourceStager::server(
                &config.resource_zip,
                &config.server_initial_resource_zip,
                config.shared_resource_directory(),
            )
        } else {
            ResourceStager::local(&config.resource_zip)
        };

        let pipeline = DocumentPipeline::new(
            &config.themes_directory,
            // Request bodies are the only input a server accepts.
            (!config.server_mode)
                .then(|| config.input_file_name.clone())
                .flatten(),
            Arc::new(TeraRenderer),
        );

        let finalizer = SubprocessFinalizer::new(
            config.inliner.clone(),
            config.pdf_renderer.clone(),
            config.subprocess_timeout,
        );

        Generator::new(
            WorkspaceAllocator::new(&config.output_directory, config.resource_directory.clone()),
            stager,
            pipeline,
            Arc::new(finalizer),
            ThemeOptions {
                show_branding: config.show_branding,
            },
        )
        .discard_failed(config.server_mode && !config.keep_workspaces)
    }

    /// Server mode: extract the shared resources now instead of on the first request.
    pub async fn prepare(&self) -> Result<(), PipelineError> {
        let stager = Arc::clone(&self.stager);
        run_blocking(move || stager.stage_shared().map(|_| ())).await
    }

    pub async fn generate(&self, request: GenerationRequest) -> Result<Generation, PipelineError> {
        let this = self.clone();
        let theme = request.theme.clone();
        let raw_json = request.raw_json;
        let output_kind = request.output_kind;

        let (workspace, rendered) = run_blocking(move || {
            let mut workspace = this.allocator.allocate()?;
            let rendered = this
                .stager
                .stage(&mut workspace)
                .and_then(|()| {
                    this.pipeline.render(
                        &workspace,
                        raw_json.as_deref(),
                        &theme,
                        &this.theme_options,
                    )
                })
                .map(|html_path| RenderedArtifact {
                    html_path,
                    resource_directory: workspace.resource_directory.clone(),
                    output_kind,
                });
            match rendered {
                Ok(rendered) => Ok((workspace, rendered)),
                Err(e) => {
                    this.discard(&workspace);
                    Err(e)
                }
            }
        })
        .await?;

        match self.finalizer.finalize(&workspace, &rendered).await {
            Ok(artifact) => {
                info!(
                    request_id = workspace.request_id,
                    theme = %request.theme,
                    path = %artifact.path.display(),
                    "Resume generated"
                );
                Ok(Generation {
                    workspace,
                    artifact,
                })
            }
            Err(e) => {
                let failed = workspace.clone();
                let this = self.clone();
                let request_id = failed.request_id;
                // Best effort; the request has already failed.
                if let Err(join_error) = run_blocking(move || {
                    this.discard(&failed);
                    Ok(())
                })
                .await
                {
                    warn!(request_id, error = %join_error, "Workspace cleanup did not run");
                }
                Err(e)
            }
        }
    }

    fn discard(&self, workspace: &Workspace) {
        if !self.discard_failed {
            return;
        }
        if let Err(e) = workspace.remove() {
            warn!(request_id = workspace.request_id, error = %e, "Failed to remove workspace");
        }
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        PipelineError::io("generation worker failed", io::Error::new(io::ErrorKind::Other, e))
    })?
}
