// Request-scoped generation pipeline: workspace → resources → HTML → terminal artifact.
// Nothing here shares mutable state across requests except the workspace id counter.

pub mod engine;
pub mod error;
pub mod finalizer;
pub mod generator;
pub mod handlers;
pub mod pipeline;
pub mod staging;
pub mod workspace;
