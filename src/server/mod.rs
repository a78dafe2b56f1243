//! HTTP front end for demo processing.
//!
//! One endpoint does the work: `POST /demo` takes a multipart upload, runs
//! the analyzer inside a fresh workspace and streams back a zip. The
//! workspace outlives the handler and is removed once the body is done.

mod handlers;
mod routes;

pub use handlers::{receive_upload, CategoryInfo, StoredUpload, FILE_FIELD};
pub use routes::create_router;

use anyhow::Context;

use crate::config::Settings;
use crate::pipeline::DemoProcessor;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub processor: DemoProcessor,
    /// Largest accepted request body in bytes.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Build state around the configured external analyzer.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let processor =
            DemoProcessor::from_settings(settings).context("invalid analyzer categories")?;
        Ok(Self::with_processor(processor, settings.max_upload_bytes))
    }

    pub fn with_processor(processor: DemoProcessor, max_upload_bytes: usize) -> Self {
        Self {
            processor,
            max_upload_bytes,
        }
    }
}

/// Start the web server.
///
/// Wipes the scratch root first, so leftovers from a crashed run do not
/// accumulate.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    state
        .processor
        .workspaces()
        .reset()
        .context("failed to prepare scratch directory")?;
    tracing::info!(
        "Scratch root ready at {}",
        state.processor.workspaces().scratch_root().display()
    );

    let app = create_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("Starting server at http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::path::Path;
    use std::sync::Arc;
    use async_trait::async_trait;
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::analysis::{AnalysisError, AnalysisInvoker, Category, DemoData, DemoParser};
    use crate::workspace::WorkspaceManager;

    struct NoopParser;

    #[async_trait]
    impl DemoParser for NoopParser {
        fn name(&self) -> &str {
            "noop"
        }

        async fn parse(&self, _input: &Path, _categories: &[Category]) -> Result<DemoData, AnalysisError> {
            Ok(DemoData::new())
        }
    }

    fn setup_test_app(scratch: &Path) -> axum::Router {
        let processor = DemoProcessor::new(
            WorkspaceManager::new(scratch),
            AnalysisInvoker::new(Arc::new(NoopParser), vec![Category::Header, Category::Kills]),
        );
        create_router(AppState::with_processor(processor, 1024 * 1024))
    }

    #[tokio::test]
    async fn test_health() {
        let dir = tempdir().unwrap();
        let app = setup_test_app(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_categories_lists_configured_set() {
        let dir = tempdir().unwrap();
        let app = setup_test_app(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/categories")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["header", "kills"]);
    }

    #[tokio::test]
    async fn test_demo_requires_post() {
        let dir = tempdir().unwrap();
        let app = setup_test_app(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/demo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_non_multipart_body_is_rejected_without_residue() {
        let dir = tempdir().unwrap();
        let app = setup_test_app(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/demo")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.status().is_client_error());
        let leftovers = std::fs::read_dir(dir.path()).map(|d| d.count()).unwrap_or(0);
        assert_eq!(leftovers, 0);
    }
}
