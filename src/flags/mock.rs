//! In-memory flag provider for tests.
//!
//! Serves a fixed flag map without network access and counts lifecycle
//! calls so tests can assert on initialization and shutdown behavior.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FlagError;

use super::client::FlagProvider;
use super::types::{FlagKey, UserContext};

/// Flag provider backed by a map.
#[derive(Debug, Default)]
pub struct StaticFlagProvider {
    flags: Mutex<HashMap<String, bool>>,
    fail_init: AtomicBool,
    fail_variation: AtomicBool,
    init_latency_ms: AtomicU64,
    closed: AtomicBool,
    init_calls: AtomicUsize,
    variation_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl StaticFlagProvider {
    /// Create a provider that knows no flags.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style flag assignment.
    pub fn with_flag(self, flag: FlagKey, enabled: bool) -> Self {
        self.set_flag(flag.key(), enabled);
        self
    }

    /// Builder-style initialization delay.
    pub fn with_init_latency(self, latency: Duration) -> Self {
        self.init_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
        self
    }

    /// Set a flag value by key.
    pub fn set_flag(&self, key: &str, enabled: bool) {
        let mut flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        flags.insert(key.to_string(), enabled);
    }

    /// Make `initialize` fail.
    pub fn set_fail_init(&self, fail: bool) {
        self.fail_init.store(fail, Ordering::SeqCst);
    }

    /// Make `variation` fail.
    pub fn set_fail_variation(&self, fail: bool) {
        self.fail_variation.store(fail, Ordering::SeqCst);
    }

    /// Number of `initialize` calls.
    pub fn init_calls(&self) -> usize {
        self.init_calls.load(Ordering::SeqCst)
    }

    /// Number of `variation` calls.
    pub fn variation_calls(&self) -> usize {
        self.variation_calls.load(Ordering::SeqCst)
    }

    /// Number of `close` calls.
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlagProvider for StaticFlagProvider {
    async fn initialize(&self) -> Result<(), FlagError> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);

        let latency_ms = self.init_latency_ms.load(Ordering::SeqCst);
        if latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(latency_ms)).await;
        }

        if self.fail_init.load(Ordering::SeqCst) {
            return Err(FlagError::Status { status: 503 });
        }

        self.closed.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn variation(&self, key: &str, _user: &UserContext) -> Result<Option<bool>, FlagError> {
        self.variation_calls.fetch_add(1, Ordering::SeqCst);

        if self.closed.load(Ordering::SeqCst) {
            return Err(FlagError::Closed);
        }
        if self.fail_variation.load(Ordering::SeqCst) {
            return Err(FlagError::Decode("simulated failure".to_string()));
        }

        let flags = self.flags.lock().unwrap_or_else(|e| e.into_inner());
        Ok(flags.get(key).copied())
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_configured_flags() {
        let provider = StaticFlagProvider::new().with_flag(FlagKey::EnableDivision, true);
        let user = UserContext::anonymous();

        assert_eq!(provider.variation("enable-division", &user).await.unwrap(), Some(true));
        assert_eq!(provider.variation("enhanced-response", &user).await.unwrap(), None);
        assert_eq!(provider.variation_calls(), 2);
    }

    #[tokio::test]
    async fn failure_switches_surface_errors() {
        let provider = StaticFlagProvider::new();
        provider.set_fail_init(true);
        provider.set_fail_variation(true);

        assert!(provider.initialize().await.is_err());
        assert!(provider
            .variation("enable-division", &UserContext::anonymous())
            .await
            .is_err());
    }
}
