//! Axum router configuration

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{convert_video_to_audio, health_check, version_check};

/// Slack on top of the configured upload cap for multipart framing overhead
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::ORIGIN])
        .max_age(Duration::from_secs(3600));

    let body_limit = state.config.max_upload_bytes() + BODY_LIMIT_SLACK;

    Router::new()
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        .route(
            "/api/converter/video-audio-convert",
            post(convert_video_to_audio),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;

    #[test]
    fn test_create_router() {
        let state = Arc::new(AppState::new(ServerConfig::default()));
        let _router = create_router(state);
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        use tower::ServiceExt;

        let state = Arc::new(AppState::new(ServerConfig::default()));
        let app = create_router(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_convert_rejects_non_multipart() {
        use tower::ServiceExt;

        let state = Arc::new(AppState::new(ServerConfig::default()));
        let app = create_router(state);

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/api/converter/video-audio-convert")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
