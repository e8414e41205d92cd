pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::render::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/resumes/:theme/html",
            post(handlers::handle_render_html),
        )
        .route(
            "/api/v1/resumes/:theme/pdf",
            post(handlers::handle_render_pdf),
        )
        .route(
            "/api/v1/resumes/:theme/preview",
            post(handlers::handle_render_preview),
        )
        .with_state(state)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::render::engine::{TeraRenderer, ThemeOptions};
    use crate::render::finalizer::tests::{copying_inliner, fake_pdf_renderer, shell};
    use crate::models::request::{RenderedArtifact, TerminalArtifact};
    use crate::render::error::PipelineError;
    use crate::render::finalizer::{ArtifactFinalizer, ExternalCommand, SubprocessFinalizer};
    use crate::render::generator::Generator;
    use crate::render::pipeline::tests::write_default_theme;
    use crate::render::pipeline::DocumentPipeline;
    use crate::render::staging::tests::write_resource_zip;
    use crate::render::staging::ResourceStager;
    use crate::render::workspace::{Workspace, WorkspaceAllocator};

    /// Reports an artifact that is not on disk.
    struct VanishedArtifact;

    #[async_trait::async_trait]
    impl ArtifactFinalizer for VanishedArtifact {
        async fn finalize(
            &self,
            workspace: &Workspace,
            rendered: &RenderedArtifact,
        ) -> Result<TerminalArtifact, PipelineError> {
            Ok(TerminalArtifact {
                path: workspace.output_file("vanished.html"),
                mime_type: rendered.output_kind.mime_type(),
            })
        }
    }

    fn workspace_count(out: &Path) -> usize {
        fs::read_dir(out)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count()
    }

    fn app(root: &Path, pdf: ExternalCommand, keep_workspaces: bool) -> Router {
        let finalizer =
            SubprocessFinalizer::new(copying_inliner(), pdf, Duration::from_secs(10));
        app_with(root, Arc::new(finalizer), keep_workspaces)
    }

    fn app_with(
        root: &Path,
        finalizer: Arc<dyn ArtifactFinalizer>,
        keep_workspaces: bool,
    ) -> Router {
        write_default_theme(&root.join("themes"));
        write_resource_zip(&root.join("resources.zip"));
        let out = root.join("out");
        let mut config = Config::from_lookup(|_| None).unwrap();
        config.server_mode = true;
        config.keep_workspaces = keep_workspaces;

        let generator = Generator::new(
            WorkspaceAllocator::new(&out, "resources"),
            ResourceStager::server(
                root.join("resources.zip"),
                out.join("server.zip"),
                out.join("resources"),
            ),
            DocumentPipeline::new(root.join("themes"), None, Arc::new(TeraRenderer)),
            finalizer,
            ThemeOptions::default(),
        );
        build_router(AppState { config, generator })
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn error_code(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        body["error"]["code"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), fake_pdf_renderer(), false)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_html_route_streams_inlined_html() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), fake_pdf_renderer(), true)
            .oneshot(post("/api/v1/resumes/default/html", r#"{"name":"Ada"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).contains("Ada"));
    }

    #[tokio::test]
    async fn test_pdf_route_sets_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), fake_pdf_renderer(), true)
            .oneshot(post("/api/v1/resumes/default/pdf", r#"{"name":"Ada"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), fake_pdf_renderer(), false)
            .oneshot(post("/api/v1/resumes/default/html", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_empty_body_is_bad_request() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), fake_pdf_renderer(), false)
            .oneshot(post("/api/v1/resumes/default/preview", "  "))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_theme_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), fake_pdf_renderer(), false)
            .oneshot(post("/api/v1/resumes/doesnotexist/html", r#"{"name":"Ada"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(error_code(response).await, "TEMPLATE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_silent_renderer_failure_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), shell("pdf", "exit 0"), false)
            .oneshot(post("/api/v1/resumes/default/pdf", r#"{"name":"Ada"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(error_code(response).await, "SUBPROCESS_ERROR");
    }

    #[tokio::test]
    async fn test_kept_workspace_survives_delivery() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path(), fake_pdf_renderer(), true)
            .oneshot(post("/api/v1/resumes/default/html", r#"{"name":"Ada"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(workspace_count(&dir.path().join("out")), 1);
    }

    #[tokio::test]
    async fn test_non_utf8_body_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/resumes/default/html")
            .body(Body::from(vec![b'{', 0xff, 0xfe, b'}']))
            .unwrap();
        let response = app(dir.path(), fake_pdf_renderer(), false)
            .oneshot(request)
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_workspace_removed_when_artifact_cannot_be_read() {
        let dir = tempfile::tempdir().unwrap();
        let response = app_with(dir.path(), Arc::new(VanishedArtifact), false)
            .oneshot(post("/api/v1/resumes/default/html", r#"{"name":"Ada"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_code(response).await, "IO_ERROR");

        // Removal runs on the blocking pool after the response is built.
        let out = dir.path().join("out");
        for _ in 0..100 {
            if workspace_count(&out) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(workspace_count(&out), 0);
    }
}
