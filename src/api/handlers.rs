//! HTTP API handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::IntoResponse,
    Json,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::debug;

use crate::calculator::{self, Operation};
use crate::config::{Config, DeploymentMode};
use crate::flags::{FlagEvaluator, UserContext};
use crate::metrics::{self, EXPOSITION_CONTENT_TYPE};

use super::error::ApiError;

/// Welcome message served at `/`.
pub const WELCOME_MESSAGE: &str = "Welcome to our CI/CD demo app!";

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// Feature flag evaluator.
    pub flags: Arc<FlagEvaluator>,
    /// Prometheus recorder handle.
    pub metrics: PrometheusHandle,
    /// Deployment mode.
    pub mode: DeploymentMode,
    /// Version reported by the health check.
    pub version: Arc<str>,
}

impl AppState {
    /// Create new app state.
    pub fn new(flags: Arc<FlagEvaluator>, metrics: PrometheusHandle, config: &Config) -> Self {
        Self {
            flags,
            metrics,
            mode: config.app_env,
            version: Arc::from(config.version()),
        }
    }
}

/// Welcome response.
#[derive(Debug, Serialize)]
pub struct WelcomeResponse {
    /// Greeting.
    pub message: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "UP".
    pub status: &'static str,
    /// Service version.
    pub version: String,
}

/// Calculate request body. Fields are loosely typed so that validation,
/// not deserialization, decides what is acceptable.
#[derive(Debug, Default, Deserialize)]
pub struct CalculateRequest {
    /// Operation name.
    pub operation: Option<Value>,
    /// First operand.
    pub a: Option<Value>,
    /// Second operand.
    pub b: Option<Value>,
}

/// Calculate response, shape selected by the `enhanced-response` flag.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CalculateResponse {
    /// Echoes the inputs alongside the result.
    Enhanced {
        /// Operation performed.
        operation: Operation,
        /// First operand.
        #[serde(serialize_with = "serialize_number")]
        a: f64,
        /// Second operand.
        #[serde(serialize_with = "serialize_number")]
        b: f64,
        /// Result.
        #[serde(serialize_with = "serialize_number")]
        result: f64,
        /// RFC 3339 time the response was built.
        timestamp: String,
    },
    /// Result only.
    Minimal {
        /// Result.
        #[serde(serialize_with = "serialize_number")]
        result: f64,
    },
}

/// Largest magnitude below which every whole `f64` is an exact integer.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Write whole numbers as JSON integers (`8`, not `8.0`).
fn serialize_number<S: Serializer>(n: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serializer.serialize_i64(*n as i64)
    } else {
        serializer.serialize_f64(*n)
    }
}

/// Coerce a JSON value to a finite number.
///
/// Numbers and numeric strings are accepted, zero included. Everything else,
/// including `null`, booleans and blank strings, is rejected.
pub fn coerce_number(value: Option<&Value>) -> Option<f64> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Root handler.
pub async fn root() -> impl IntoResponse {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE,
    })
}

/// Health check handler - liveness only, always returns 200.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "UP",
        version: state.version.to_string(),
    })
}

/// Metrics exposition handler.
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        metrics::render(&state.metrics),
    )
}

/// Calculate handler.
pub async fn calculate(
    State(state): State<AppState>,
    user: UserContext,
    payload: Result<Json<CalculateRequest>, JsonRejection>,
) -> Result<Json<CalculateResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;

    let (Some(a), Some(b)) = (
        coerce_number(request.a.as_ref()),
        coerce_number(request.b.as_ref()),
    ) else {
        return Err(ApiError::InvalidNumbers);
    };

    let operation = request
        .operation
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|op| op.parse::<Operation>().ok())
        .ok_or(ApiError::InvalidOperation)?;

    let result = match operation {
        Operation::Add => calculator::add(a, b),
        Operation::Subtract => calculator::subtract(a, b),
        Operation::Multiply => calculator::multiply(a, b),
        Operation::Divide => {
            if !state.flags.division_enabled(&user).await {
                return Err(ApiError::DivisionUnavailable);
            }
            if b == 0.0 {
                return Err(ApiError::DivisionByZero);
            }
            a / b
        }
    };

    debug!(%operation, a, b, result, user_id = %user.id, "Calculated");

    if state.flags.enhanced_response(&user).await {
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| ApiError::Internal(format!("failed to format timestamp: {}", e)))?;

        Ok(Json(CalculateResponse::Enhanced {
            operation,
            a,
            b,
            result,
            timestamp,
        }))
    } else {
        Ok(Json(CalculateResponse::Minimal { result }))
    }
}
