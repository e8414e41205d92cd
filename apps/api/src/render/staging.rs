//! Resource Stager — materializes the bundled resource archive for a request.
//!
//! Local mode extracts a fresh copy into every workspace. Server mode extracts once into
//! a shared directory the first time it is asked to and then only points workspaces at
//! it; requests never write there afterwards.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::render::error::PipelineError;
use crate::render::workspace::Workspace;

/// Name of the archive copy placed inside a local-mode workspace.
const LOCAL_ARCHIVE_NAME: &str = "bundled-resources.zip";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingMode {
    Local,
    Server,
}

#[derive(Debug)]
pub struct ResourceStager {
    mode: StagingMode,
    /// The archive shipped with the service.
    bundled_archive: PathBuf,
    /// Server mode only: where the archive is copied before extraction.
    server_archive: PathBuf,
    /// Server mode only: the shared extraction target.
    shared_directory: PathBuf,
    shared: OnceCell<PathBuf>,
}

impl ResourceStager {
    pub fn local(bundled_archive: impl Into<PathBuf>) -> Self {
        Self {
            mode: StagingMode::Local,
            bundled_archive: bundled_archive.into(),
            server_archive: PathBuf::new(),
            shared_directory: PathBuf::new(),
            shared: OnceCell::new(),
        }
    }

    pub fn server(
        bundled_archive: impl Into<PathBuf>,
        server_archive: impl Into<PathBuf>,
        shared_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            mode: StagingMode::Server,
            bundled_archive: bundled_archive.into(),
            server_archive: server_archive.into(),
            shared_directory: shared_directory.into(),
            shared: OnceCell::new(),
        }
    }

    /// True once server-mode resources have been extracted.
    #[cfg(test)]
    pub fn is_shared_ready(&self) -> bool {
        self.shared.get().is_some()
    }

    /// Stages resources for `workspace` and records where they ended up.
    ///
    /// Must complete before the document pipeline writes anything into the workspace.
    pub fn stage(&self, workspace: &mut Workspace) -> Result<(), PipelineError> {
        match self.mode {
            StagingMode::Local => {
                let archive = workspace.root_directory.join(LOCAL_ARCHIVE_NAME);
                materialize(&self.bundled_archive, &archive, &workspace.resource_directory)?;
                info!(
                    request_id = workspace.request_id,
                    resources = %workspace.resource_directory.display(),
                    "Resources staged"
                );
            }
            StagingMode::Server => {
                let shared = self.stage_shared()?;
                workspace.resource_directory = shared.to_path_buf();
                debug!(
                    request_id = workspace.request_id,
                    resources = %shared.display(),
                    "Using shared resources"
                );
            }
        }
        Ok(())
    }

    /// Extracts the shared resource tree on first call; later calls return the cached path.
    pub fn stage_shared(&self) -> Result<&Path, PipelineError> {
        let path = self.shared.get_or_try_init(|| {
            materialize(
                &self.bundled_archive,
                &self.server_archive,
                &self.shared_directory,
            )?;
            info!(
                resources = %self.shared_directory.display(),
                "Shared resources staged"
            );
            Ok::<_, PipelineError>(self.shared_directory.clone())
        })?;
        Ok(path.as_path())
    }
}

/// Copies `source` to `archive` (replacing whatever was there) and fully extracts it
/// into `destination`.
fn materialize(source: &Path, archive: &Path, destination: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(destination)
        .map_err(|e| PipelineError::io_at("create resource directory", destination, e))?;

    if source != archive {
        match fs::remove_file(archive) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(PipelineError::io_at("delete stale archive", archive, e)),
        }
        if let Some(parent) = archive.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| PipelineError::io_at("create archive directory", parent, e))?;
        }
        fs::copy(source, archive).map_err(|e| {
            PipelineError::io(
                format!(
                    "failed to copy resource archive {} to {}",
                    source.display(),
                    archive.display()
                ),
                e,
            )
        })?;
    }

    let file = File::open(archive).map_err(|e| PipelineError::io_at("open", archive, e))?;
    let mut bundle = ZipArchive::new(file).map_err(|source| PipelineError::Archive {
        path: archive.to_path_buf(),
        source,
    })?;
    bundle
        .extract(destination)
        .map_err(|source| PipelineError::Archive {
            path: archive.to_path_buf(),
            source,
        })
}
