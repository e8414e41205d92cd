//! Axum route handlers for the Render API.
//!
//! The raw request body is the resume JSON; the response body is the finalized artifact.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue},
    response::Response,
};
use bytes::Bytes;
use tracing::warn;

use crate::errors::AppError;
use crate::models::request::{GenerationRequest, OutputKind};
use crate::render::error::PipelineError;
use crate::state::AppState;

/// POST /api/v1/resumes/:theme/html
pub async fn handle_render_html(
    State(state): State<AppState>,
    Path(theme): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    render_and_deliver(state, theme, body, OutputKind::Html).await
}

/// POST /api/v1/resumes/:theme/pdf
pub async fn handle_render_pdf(
    State(state): State<AppState>,
    Path(theme): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    render_and_deliver(state, theme, body, OutputKind::Pdf).await
}

/// POST /api/v1/resumes/:theme/preview
pub async fn handle_render_preview(
    State(state): State<AppState>,
    Path(theme): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    render_and_deliver(state, theme, body, OutputKind::Preview).await
}

async fn render_and_deliver(
    state: AppState,
    theme: String,
    body: Bytes,
    output_kind: OutputKind,
) -> Result<Response, AppError> {
    let json = String::from_utf8(body.to_vec())
        .map_err(|_| PipelineError::InvalidInput("request body must be UTF-8 JSON".to_string()))?;
    if json.trim().is_empty() {
        return Err(PipelineError::InvalidInput("request body is empty".to_string()).into());
    }

    let generation = state
        .generator
        .generate(GenerationRequest {
            raw_json: Some(json),
            theme,
            output_kind,
        })
        .await?;

    let artifact = &generation.artifact;
    let read = tokio::fs::read(&artifact.path)
        .await
        .map_err(|e| PipelineError::io_at("read artifact", &artifact.path, e));

    // The workspace goes whether or not delivery worked.
    if !state.config.keep_workspaces {
        let workspace = generation.workspace.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = workspace.remove() {
                warn!(request_id = workspace.request_id, error = %e, "Failed to remove workspace");
            }
        });
    }

    let bytes = read?;
    let mut response = Response::new(Body::from(bytes));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(artifact.mime_type),
    );
    Ok(response)
}
