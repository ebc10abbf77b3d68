//! Feature flag evaluation.
//!
//! This module handles:
//! - Flag keys and the per-request user context
//! - The provider abstraction and the remote flag service client
//! - The process-scoped evaluator with lazy, single-flight initialization
//! - A static provider for testing

pub mod client;
pub mod evaluator;
pub mod mock;
pub mod types;

pub use client::{FlagProvider, RemoteFlagClient};
pub use evaluator::{EvaluatorState, FlagEvaluator};
pub use mock::StaticFlagProvider;
pub use types::{FlagKey, UserContext};
