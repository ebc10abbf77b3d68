//! Flag provider trait and the remote flag service client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::Config;
use crate::error::FlagError;

use super::types::{UserContext, ANONYMOUS_USER};

/// Header carrying the SDK key.
pub const SDK_KEY_HEADER: &str = "X-SDK-Key";

/// Source of flag values.
#[async_trait]
pub trait FlagProvider: Send + Sync + std::fmt::Debug {
    /// Establish the connection. Called at most once per lifecycle by the evaluator.
    async fn initialize(&self) -> Result<(), FlagError>;

    /// Evaluate one flag. `Ok(None)` means the provider does not know the flag.
    async fn variation(&self, key: &str, user: &UserContext) -> Result<Option<bool>, FlagError>;

    /// Release the connection.
    async fn close(&self);
}

/// Evaluate request body.
#[derive(Debug, Serialize)]
struct EvaluateRequest<'a> {
    environment: &'a str,
    context: SdkContext<'a>,
}

/// User context in the flag service's shape.
#[derive(Debug, Serialize)]
struct SdkContext<'a> {
    user_id: &'a str,
    custom_attributes: HashMap<&'static str, &'a str>,
}

impl<'a> From<&'a UserContext> for SdkContext<'a> {
    fn from(user: &'a UserContext) -> Self {
        let mut custom_attributes = HashMap::new();
        custom_attributes.insert("country", user.country.as_str());
        if let Some(ip) = &user.ip {
            custom_attributes.insert("ip", ip.as_str());
        }
        Self {
            user_id: &user.id,
            custom_attributes,
        }
    }
}

/// Evaluate response body.
#[derive(Debug, Deserialize)]
struct EvaluateResponse {
    #[serde(default)]
    flags: HashMap<String, FlagState>,
}

/// Evaluated state of one flag.
#[derive(Debug, Deserialize)]
struct FlagState {
    enabled: bool,
    #[serde(default)]
    reason: String,
}

/// HTTP client for a remote flag evaluation service.
#[derive(Debug)]
pub struct RemoteFlagClient {
    http: reqwest::Client,
    evaluate_url: String,
    sdk_key: String,
    environment: String,
    closed: AtomicBool,
}

impl RemoteFlagClient {
    /// Create a client from config.
    pub fn new(config: &Config, sdk_key: impl Into<String>) -> Result<Self, FlagError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.flag_timeout_ms))
            .connect_timeout(Duration::from_millis(500))
            .tcp_nodelay(true)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            evaluate_url: format!(
                "{}/sdk/evaluate",
                config.flag_service_url.trim_end_matches('/')
            ),
            sdk_key: sdk_key.into(),
            environment: config.flag_environment.clone(),
            closed: AtomicBool::new(false),
        })
    }

    /// Evaluate all flags for a user.
    async fn fetch(&self, user: &UserContext) -> Result<EvaluateResponse, FlagError> {
        let body = EvaluateRequest {
            environment: &self.environment,
            context: SdkContext::from(user),
        };

        let response = self
            .http
            .post(&self.evaluate_url)
            .header(SDK_KEY_HEADER, &self.sdk_key)
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(FlagError::Unauthorized),
            status if !status.is_success() => {
                return Err(FlagError::Status {
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| FlagError::Decode(e.to_string()))
    }
}

#[async_trait]
impl FlagProvider for RemoteFlagClient {
    #[instrument(skip(self))]
    async fn initialize(&self) -> Result<(), FlagError> {
        self.closed.store(false, Ordering::SeqCst);
        let anonymous = UserContext::new(Some(ANONYMOUS_USER), None, None);
        let response = self.fetch(&anonymous).await?;
        debug!(flags = response.flags.len(), "Flag service reachable");
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn variation(&self, key: &str, user: &UserContext) -> Result<Option<bool>, FlagError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(FlagError::Closed);
        }

        let response = self.fetch(user).await?;
        Ok(response.flags.get(key).map(|state| {
            debug!(enabled = state.enabled, reason = %state.reason, "Flag evaluated");
            state.enabled
        }))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
