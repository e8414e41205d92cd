use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::render::error::PipelineError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Pipeline(e) => pipeline_status(e),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn pipeline_status(e: &PipelineError) -> (StatusCode, &'static str, String) {
    match e {
        PipelineError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", e.to_string()),
        PipelineError::TemplateNotFound { theme, .. } => (
            StatusCode::NOT_FOUND,
            "TEMPLATE_NOT_FOUND",
            format!("Theme '{theme}' does not exist"),
        ),
        PipelineError::Render { .. } => {
            tracing::error!("Render error: {e:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "RENDER_ERROR",
                e.to_string(),
            )
        }
        PipelineError::Io { .. } | PipelineError::Archive { .. } => {
            tracing::error!("I/O error: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                "A storage error occurred".to_string(),
            )
        }
        PipelineError::Subprocess { .. } => {
            tracing::error!("Renderer error: {e}");
            (
                StatusCode::BAD_GATEWAY,
                "SUBPROCESS_ERROR",
                "The document renderer failed".to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pipeline_error_statuses() {
        let cases = [
            (
                PipelineError::InvalidInput("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                PipelineError::TemplateNotFound {
                    theme: "nope".to_string(),
                    path: PathBuf::from("themes/nope.html"),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                PipelineError::Subprocess {
                    program: "inliner".to_string(),
                    reason: "exit 1".to_string(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                PipelineError::io("disk full", std::io::Error::other("no space")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            let response = AppError::from(error).into_response();
            assert_eq!(response.status(), expected);
        }
    }

    #[test]
    fn test_template_not_found_hides_filesystem_path() {
        let (_, code, message) = pipeline_status(&PipelineError::TemplateNotFound {
            theme: "nope".to_string(),
            path: PathBuf::from("/srv/themes/nope.html"),
        });
        assert_eq!(code, "TEMPLATE_NOT_FOUND");
        assert!(!message.contains("/srv"));
    }
}
