//! Server lifecycle: startup flag initialization, serving, graceful shutdown.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{create_router, AppState};
use crate::config::DeploymentMode;
use crate::error::AppError;
use crate::flags::{EvaluatorState, FlagEvaluator};

/// Start connecting the flag evaluator in the background.
///
/// Skipped in test mode, which connects lazily on first evaluation, and when
/// no SDK key is configured.
pub fn spawn_flag_initialization(
    flags: &Arc<FlagEvaluator>,
    mode: DeploymentMode,
) -> Option<JoinHandle<()>> {
    if mode == DeploymentMode::Test || flags.state() == EvaluatorState::DegradedNoKey {
        return None;
    }

    let flags = flags.clone();
    Some(tokio::spawn(async move {
        // Failures are logged by the evaluator and retried on next use
        let _ = flags.initialize().await;
    }))
}

/// Serve the API on `listener` until `shutdown` resolves.
///
/// Shutdown stops accepting connections, waits for in-flight requests to
/// finish, then closes the flag evaluator.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let flags = state.flags.clone();
    let router = create_router(state);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    info!("HTTP server closed");

    // In-flight requests have drained; nothing evaluates flags past this point
    flags.close().await;

    Ok(())
}
