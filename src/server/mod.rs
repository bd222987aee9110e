//! HTTP front end for the analysis pipeline

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::config::ServerConfig;
use crate::pipeline::{Orchestrator, Stage};
use crate::AnalyzerError;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeRequest {
    video_url: Option<String>,
}

/// Routes and middleware, without binding a socket
pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health_handler))
        .route("/analyze-video", post(analyze_handler))
        .with_state(AppState { orchestrator })
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Bind and serve until Ctrl-C
pub async fn serve(settings: &ServerConfig, orchestrator: Arc<Orchestrator>) -> Result<()> {
    let app = router(orchestrator);

    let address = format!("{}:{}", settings.host, settings.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Video analyzer listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "message": "Video analyzer is running",
    }))
}

async fn analyze_handler(State(state): State<AppState>, body: Bytes) -> Response {
    // Any body that does not yield a usable URL is treated as a missing field
    let request: AnalyzeRequest = serde_json::from_slice(&body).unwrap_or_default();
    let url = request.video_url.unwrap_or_default();

    let response = match state.orchestrator.analyze(&url).await {
        Ok(report) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "success": true,
                "transcript": report.transcript,
                "visual_analysis": report.visual_analysis,
                "final_analysis": report.final_analysis,
                "video_url": report.video_url,
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    };

    info!(stage = %Stage::Responded, status = response.status().as_u16(), "Pipeline stage reached");
    response
}

fn error_response(e: &AnalyzerError) -> Response {
    if e.is_client_error() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": e.to_string()})),
        )
            .into_response();
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({
            "error": e.to_string(),
            "details": e.code(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::MockVideoDownloader;
    use crate::test_support::{test_config, FakeDownloader, FakeFfmpeg, FakeInference};
    use crate::VideoDownloader;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Value;
    use std::path::Path;
    use tower::ServiceExt;

    fn app(root: &Path, downloader: impl VideoDownloader + 'static) -> Router {
        let orchestrator = Orchestrator::with_collaborators(
            &test_config(root),
            Arc::new(downloader),
            Arc::new(FakeFfmpeg::default()),
            Arc::new(FakeInference::default()),
        );
        router(Arc::new(orchestrator))
    }

    fn idle_downloader() -> MockVideoDownloader {
        let mut downloader = MockVideoDownloader::new();
        downloader.expect_download().never();
        downloader
    }

    async fn post_json(app: Router, body: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/analyze-video")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let root = tempfile::tempdir().unwrap();
        let response = app(root.path(), idle_downloader())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["message"], "Video analyzer is running");
    }

    #[tokio::test]
    async fn test_missing_url_is_rejected_without_downloading() {
        let root = tempfile::tempdir().unwrap();

        for body in ["{}", r#"{"video_url": "  "}"#, r#"{"video_url": null}"#, "not json"] {
            let (status, json) = post_json(app(root.path(), idle_downloader()), body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
            assert_eq!(json["error"], "video_url is required");
        }
    }

    #[tokio::test]
    async fn test_analyze_end_to_end() {
        let root = tempfile::tempdir().unwrap();

        let (status, json) = post_json(
            app(root.path(), FakeDownloader::clip(10.0)),
            r#"{"video_url": "https://example.com/video123"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["video_url"], "https://example.com/video123");
        for field in ["transcript", "visual_analysis", "final_analysis"] {
            assert!(!json[field].as_str().unwrap().is_empty(), "{} is empty", field);
        }
        assert_eq!(fs_err::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_download_failure_is_a_server_error() {
        let root = tempfile::tempdir().unwrap();

        let (status, json) = post_json(
            app(root.path(), FakeDownloader::failing("HTTP Error 403", "fallback boom")),
            r#"{"video_url": "https://example.com/video123"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(json["error"].as_str().unwrap().contains("fallback boom"));
        assert_eq!(json["details"], "fetch_failure");
        assert_eq!(fs_err::read_dir(root.path()).unwrap().count(), 0);
    }
}
