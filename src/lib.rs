//! Demo calculation service gated by remote feature flags.
//!
//! Every request passes through the metrics middleware, then the route
//! handler, which may consult the flag evaluator and the calculation engine.
//!
//! ```text
//! request ─▶ metrics ─▶ handler ─┬─▶ flag evaluator (enable-division, enhanced-response)
//!                                └─▶ calculator (add, subtract, multiply)
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`calculator`]: Arithmetic operations
//! - [`flags`]: Feature flag evaluation
//! - [`metrics`]: Prometheus metrics and request instrumentation
//! - [`api`]: HTTP routes and handlers
//! - [`server`]: Server lifecycle and graceful shutdown
//! - [`utils`]: Utility functions

pub mod api;
pub mod calculator;
pub mod config;
pub mod error;
pub mod flags;
pub mod metrics;
pub mod server;
pub mod utils;

pub use config::Config;
pub use error::{AppError, Result};
