use crate::config::Config;
use crate::render::generator::Generator;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// Nothing in here is mutated per request; each request gets its own workspace.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub generator: Generator,
}
