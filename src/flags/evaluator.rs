//! Process-scoped feature flag evaluator.
//!
//! Lifecycle:
//!
//! ```text
//! Uninitialized ──initialize──▶ Initializing ──ok──▶ Ready
//!       ▲                            │                  │
//!       └─────────── error ──────────┘                  │
//!       └──────────────────── close ────────────────────┘
//!
//! DegradedNoKey (no SDK key, terminal, never calls the provider)
//! ```
//!
//! `evaluate` never fails: any provider error resolves to the caller's default.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::FlagError;

use super::client::{FlagProvider, RemoteFlagClient};
use super::types::{FlagKey, UserContext};

/// Observable evaluator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluatorState {
    /// No connection yet, or closed.
    Uninitialized,
    /// A connection attempt is in flight.
    Initializing,
    /// Connected.
    Ready,
    /// No SDK key configured; every flag resolves to its default.
    DegradedNoKey,
}

/// Feature flag evaluator shared by all requests.
#[derive(Debug)]
pub struct FlagEvaluator {
    provider: Option<Arc<dyn FlagProvider>>,
    state: Mutex<EvaluatorState>,
    /// Serializes initialize and close so only one connection attempt runs.
    lifecycle: AsyncMutex<()>,
    /// Count of failed connection attempts. Callers that queued behind an
    /// attempt compare it to tell whether that attempt failed.
    failed_attempts: AtomicU64,
}

impl FlagEvaluator {
    /// Create an evaluator over a provider. Nothing connects until first use.
    pub fn new(provider: Arc<dyn FlagProvider>) -> Self {
        Self {
            provider: Some(provider),
            state: Mutex::new(EvaluatorState::Uninitialized),
            lifecycle: AsyncMutex::new(()),
            failed_attempts: AtomicU64::new(0),
        }
    }

    /// Create an evaluator that always returns defaults.
    pub fn disabled() -> Self {
        Self {
            provider: None,
            state: Mutex::new(EvaluatorState::DegradedNoKey),
            lifecycle: AsyncMutex::new(()),
            failed_attempts: AtomicU64::new(0),
        }
    }

    /// Create the evaluator described by config.
    ///
    /// Without an SDK key this warns once and returns a degraded evaluator.
    pub fn from_config(config: &Config) -> Result<Self, FlagError> {
        match config.sdk_key() {
            Some(key) => {
                let client = RemoteFlagClient::new(config, key)?;
                Ok(Self::new(Arc::new(client)))
            }
            None => {
                warn!("Flag SDK key not found. Feature flags will use their defaults.");
                Ok(Self::disabled())
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EvaluatorState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: EvaluatorState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    /// Connect to the provider if not already connected.
    ///
    /// Concurrent callers share the single in-flight attempt and its outcome:
    /// when it fails they all get `InitializationFailed` without retrying. The
    /// evaluator is left `Uninitialized`, so the next use after that retries.
    pub async fn initialize(&self) -> Result<(), FlagError> {
        let Some(provider) = &self.provider else {
            return Err(FlagError::NotConfigured);
        };

        let seen_failures = self.failed_attempts.load(Ordering::SeqCst);
        let _guard = self.lifecycle.lock().await;
        if self.state() == EvaluatorState::Ready {
            return Ok(());
        }
        if self.failed_attempts.load(Ordering::SeqCst) != seen_failures {
            return Err(FlagError::InitializationFailed);
        }

        self.set_state(EvaluatorState::Initializing);
        match provider.initialize().await {
            Ok(()) => {
                self.set_state(EvaluatorState::Ready);
                info!("Flag evaluator initialized");
                Ok(())
            }
            Err(e) => {
                self.failed_attempts.fetch_add(1, Ordering::SeqCst);
                self.set_state(EvaluatorState::Uninitialized);
                error!(error = %e, "Failed to initialize flag evaluator");
                Err(e)
            }
        }
    }

    /// Evaluate a flag by key, falling back to `default` on any failure.
    pub async fn evaluate(&self, key: &str, user: &UserContext, default: bool) -> bool {
        let Some(provider) = &self.provider else {
            return default;
        };

        if self.state() != EvaluatorState::Ready && self.initialize().await.is_err() {
            return default;
        }

        match provider.variation(key, user).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!(flag = key, "Flag unknown to provider, using default");
                default
            }
            Err(e) => {
                warn!(flag = key, error = %e, "Error evaluating flag");
                default
            }
        }
    }

    /// Evaluate a known flag with its built-in default.
    pub async fn flag(&self, flag: FlagKey, user: &UserContext) -> bool {
        self.evaluate(flag.key(), user, flag.default_value()).await
    }

    /// Whether the divide operation is available for this user.
    pub async fn division_enabled(&self, user: &UserContext) -> bool {
        self.flag(FlagKey::EnableDivision, user).await
    }

    /// Whether this user gets the enhanced response envelope.
    pub async fn enhanced_response(&self, user: &UserContext) -> bool {
        self.flag(FlagKey::EnhancedResponse, user).await
    }

    /// Close the provider connection. Only the first close after a successful
    /// initialization reaches the provider.
    pub async fn close(&self) {
        let Some(provider) = &self.provider else {
            return;
        };

        let _guard = self.lifecycle.lock().await;
        if self.state() == EvaluatorState::Ready {
            provider.close().await;
            info!("Flag evaluator closed");
        }
        self.set_state(EvaluatorState::Uninitialized);
    }
}
