//! HTTP API route definitions.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::DeploymentMode;
use crate::metrics::{track_metrics, METRICS_PATH};

use super::error::{expose_error_detail, panic_response};
use super::handlers::{calculate, health, metrics_handler, root, AppState};

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/calculate", post(calculate))
        .route(METRICS_PATH, get(metrics_handler));

    with_middleware(routes, state.mode).with_state(state)
}

/// Wrap routes in the service middleware stack.
///
/// Innermost first: panic recovery, metrics recording, request tracing, and
/// outside production the error-detail rewrite for 500 responses.
pub fn with_middleware(routes: Router<AppState>, mode: DeploymentMode) -> Router<AppState> {
    let router = routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http());

    if mode.is_production() {
        router
    } else {
        router.layer(middleware::from_fn(expose_error_detail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::api::error::{ApiError, GENERIC_ERROR, REDACTED_MESSAGE};
    use crate::config::Config;
    use crate::flags::FlagEvaluator;
    use crate::metrics::install_recorder;

    fn state(mode: DeploymentMode) -> AppState {
        let config = Config {
            app_env: mode,
            ..Config::default()
        };
        AppState::new(
            Arc::new(FlagEvaluator::disabled()),
            install_recorder().unwrap(),
            &config,
        )
    }

    async fn panics() -> &'static str {
        panic!("kaboom")
    }

    fn failing_app(mode: DeploymentMode) -> Router {
        let routes = Router::new()
            .route("/panic", get(panics))
            .route(
                "/fail",
                get(|| async { Err::<(), _>(ApiError::Internal("disk on fire".to_string())) }),
            );
        let state = state(mode);
        with_middleware(routes, mode).with_state(state)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_up() {
        let app = create_router(state(DeploymentMode::Test));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "UP");
        assert!(!body["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_exposition_format() {
        let app = create_router(state(DeploymentMode::Test));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn panics_become_500_with_detail_outside_production() {
        let app = failing_app(DeploymentMode::Development);

        let response = app
            .oneshot(Request::builder().uri("/panic").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], GENERIC_ERROR);
        assert_eq!(body["message"], "kaboom");
    }

    #[tokio::test]
    async fn internal_errors_are_redacted_in_production() {
        let app = failing_app(DeploymentMode::Production);

        let response = app
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"], GENERIC_ERROR);
        assert_eq!(body["message"], REDACTED_MESSAGE);
    }

    #[tokio::test]
    async fn internal_errors_carry_detail_in_development() {
        let app = failing_app(DeploymentMode::Development);

        let response = app
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["message"], "disk on fire");
    }
}
