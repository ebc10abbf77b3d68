//! Utility functions.

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Filter used when the configured directives do not parse.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Build the log filter from `RUST_LOG` directives. Verbose mode overrides them.
pub fn log_filter(directives: &str, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("cicd_demo=debug,info");
    }
    EnvFilter::try_new(directives).unwrap_or_else(|e| {
        eprintln!("Invalid RUST_LOG '{}': {}; using '{}'", directives, e, DEFAULT_LOG_FILTER);
        EnvFilter::new(DEFAULT_LOG_FILTER)
    })
}

/// Resolve when the process receives Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received: closing HTTP server"),
        _ = terminate => info!("SIGTERM signal received: closing HTTP server"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_directives_become_the_filter() {
        assert_eq!(log_filter("cicd_demo=trace", false).to_string(), "cicd_demo=trace");
    }

    #[test]
    fn verbose_overrides_configured_directives() {
        let filter = log_filter("warn", true).to_string();
        assert!(filter.contains("cicd_demo=debug"));
    }

    #[test]
    fn invalid_directives_fall_back_to_info() {
        assert_eq!(log_filter("cicd_demo=loud", false).to_string(), DEFAULT_LOG_FILTER);
    }
}
