//! Workspace Allocator — one private directory tree per generation request.
//!
//! The request counter is the only state shared between concurrent requests.
//! Ids start at 1, only ever grow, and are never handed out twice per process.

use std::fs;
use std::io;
use std::path::{self, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::render::error::PipelineError;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

const WORKSPACE_PREFIX: &str = "folio";
const OUTPUT_HTML_FILE: &str = "resume.html";

/// Directory tree owned by exactly one generation request.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub request_id: u64,
    pub root_directory: PathBuf,
    /// Where staged resources live for this request. In server mode this points at the
    /// shared directory instead of somewhere under `root_directory`.
    pub resource_directory: PathBuf,
}

impl Workspace {
    /// The HTML file the document pipeline writes.
    pub fn output_html_file(&self) -> PathBuf {
        self.root_directory.join(OUTPUT_HTML_FILE)
    }

    /// A sibling of the HTML output inside the workspace root.
    pub fn output_file(&self, name: &str) -> PathBuf {
        self.root_directory.join(name)
    }

    /// The `resources` directory the rendered HTML resolves assets against.
    pub fn local_resource_directory(&self) -> PathBuf {
        self.root_directory.join("resources")
    }

    pub fn remove(&self) -> Result<(), PipelineError> {
        match fs::remove_dir_all(&self.root_directory) {
            Ok(()) => {
                debug!(request_id = self.request_id, "Workspace removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PipelineError::io_at("remove", &self.root_directory, e)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkspaceAllocator {
    base_directory: PathBuf,
    resource_directory: String,
}

impl WorkspaceAllocator {
    /// `resource_directory` is the per-workspace resource path, relative to the root.
    pub fn new(base_directory: impl Into<PathBuf>, resource_directory: impl Into<String>) -> Self {
        Self {
            base_directory: base_directory.into(),
            resource_directory: resource_directory.into(),
        }
    }

    /// Reserves the next request id and creates an empty directory for it.
    ///
    /// A directory with the same name left behind by an earlier process is cleared
    /// first so stale output can never be mistaken for this request's.
    pub fn allocate(&self) -> Result<Workspace, PipelineError> {
        let request_id = NEXT_REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let root_directory = self
            .base_directory
            .join(format!("{WORKSPACE_PREFIX}{request_id}.tmp"));

        if root_directory.exists() {
            fs::remove_dir_all(&root_directory)
                .map_err(|e| PipelineError::io_at("clear stale workspace", &root_directory, e))?;
        }
        fs::create_dir_all(&root_directory)
            .map_err(|e| PipelineError::io_at("create workspace", &root_directory, e))?;
        // External renderers run with the workspace as their working directory, so every
        // path handed to them must not depend on ours.
        let root_directory = path::absolute(&root_directory)
            .map_err(|e| PipelineError::io_at("resolve workspace", &root_directory, e))?;

        let resource_directory = root_directory.join(&self.resource_directory);
        info!(request_id, root = %root_directory.display(), "Workspace allocated");

        Ok(Workspace {
            request_id,
            root_directory,
            resource_directory,
        })
    }
}
